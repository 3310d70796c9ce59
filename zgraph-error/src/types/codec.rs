use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки стороны записи: граф содержит то, что формат не умеет передать.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Значение вне поддерживаемого набора типов (Symbol, функция, WeakMap,
    /// незарегистрированное расширение и т.п.).
    UnsupportedType { what: String, reason: String },

    /// `Value::Ref` указывает на узел, которого нет в арене.
    DanglingReference { node: u32 },
}

/// Ошибки стороны чтения. Любая из них делает недействительным всё сообщение.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Поток нарушает формат: неизвестный тег, плохой varint, невалидный
    /// UTF-8, лишние байты, несовпадение версии и т.д.
    Malformed {
        reason: String,
        offset: Option<u64>,
    },

    /// Обратная ссылка на ещё не выданный идентификатор.
    UnresolvedReference { id: u64, assigned: u64 },

    /// Поток закончился, пока структура ещё была открыта.
    Truncated { open_structures: usize, offset: u64 },

    /// Превышен лимит `max_length`.
    LengthExceeded { max_length: u64, received: u64 },

    /// Идентификатор расширения не зарегистрирован в кодеке.
    UnknownExtension { extension: u64, offset: Option<u64> },
}

/// Ошибки конфигурации кодека.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    InvalidOptions { option: String, reason: String },
}

impl EncodeError {
    pub fn unsupported(
        what: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedType {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

impl DecodeError {
    pub fn malformed(
        reason: impl Into<String>,
        offset: Option<u64>,
    ) -> Self {
        Self::Malformed {
            reason: reason.into(),
            offset,
        }
    }

    /// Смещение в потоке, если оно известно.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Malformed { offset, .. } | Self::UnknownExtension { offset, .. } => *offset,
            Self::Truncated { offset, .. } => Some(*offset),
            Self::UnresolvedReference { .. } | Self::LengthExceeded { .. } => None,
        }
    }

    /// Добавляет смещение, если оно ещё не задано.
    pub fn with_offset(
        mut self,
        at: u64,
    ) -> Self {
        match &mut self {
            Self::Malformed { offset, .. } | Self::UnknownExtension { offset, .. } => {
                offset.get_or_insert(at);
            }
            _ => {}
        }
        self
    }
}

impl OptionsError {
    pub fn invalid(
        option: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidOptions {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for EncodeError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::UnsupportedType { what, reason } => {
                write!(f, "Unsupported type {what}: {reason}")
            }
            Self::DanglingReference { node } => {
                write!(f, "Reference to node #{node} which is not in the graph")
            }
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Malformed { reason, offset } => {
                write!(f, "Malformed stream: {reason}")?;
                write_offset(f, *offset)
            }
            Self::UnresolvedReference { id, assigned } => {
                write!(
                    f,
                    "Back-reference to id {id} but only {assigned} ids have been assigned"
                )
            }
            Self::Truncated {
                open_structures,
                offset,
            } => {
                write!(
                    f,
                    "Stream truncated with {open_structures} structure(s) still open"
                )?;
                write_offset(f, Some(*offset))
            }
            Self::LengthExceeded {
                max_length,
                received,
            } => {
                write!(
                    f,
                    "Stream length {received} exceeds the limit of {max_length} bytes"
                )
            }
            Self::UnknownExtension { extension, offset } => {
                write!(f, "No codec registered for extension {extension}")?;
                write_offset(f, *offset)
            }
        }
    }
}

impl std::fmt::Display for OptionsError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::InvalidOptions { option, reason } => {
                write!(f, "Invalid option `{option}`: {reason}")
            }
        }
    }
}

fn write_offset(
    f: &mut std::fmt::Formatter<'_>,
    offset: Option<u64>,
) -> std::fmt::Result {
    match offset {
        Some(o) => write!(f, " [offset: 0x{o:X}]"),
        None => Ok(()),
    }
}

impl std::error::Error for EncodeError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for OptionsError {}

impl ErrorExt for EncodeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedType { .. } => StatusCode::UnsupportedType,
            Self::DanglingReference { .. } => StatusCode::DanglingReference,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::UnsupportedType { what, .. } => format!("Cannot serialize {what}"),
            Self::DanglingReference { .. } => "Value graph is inconsistent".to_string(),
        }
    }
}

impl ErrorExt for DecodeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Malformed { .. } => StatusCode::MalformedStream,
            Self::UnresolvedReference { .. } => StatusCode::UnresolvedReference,
            Self::Truncated { .. } => StatusCode::TruncatedStream,
            Self::LengthExceeded { .. } => StatusCode::LengthExceeded,
            Self::UnknownExtension { .. } => StatusCode::UnknownExtension,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        self.to_string()
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Some(offset) = self.offset() {
            tags.push(("offset", offset.to_string()));
        }
        tags
    }
}

impl ErrorExt for OptionsError {
    fn status_code(&self) -> StatusCode {
        StatusCode::InvalidOptions
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
