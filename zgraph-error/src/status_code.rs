use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Кодирование (сторона записи)
/// - 3xxx: Декодирование (сторона чтения)
/// - 4xxx: Конфигурация
/// - 6xxx: IO
///
/// `num_enum::TryFromPrimitive` даёт `TryFrom<u32>`; опционально `strum`
/// (`AsRefStr`/`EnumIter`) и `serde_repr`.
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Кодирование ===
    UnsupportedType = 2000,
    DanglingReference = 2001,

    // === 3xxx: Декодирование ===
    MalformedStream = 3000,
    UnresolvedReference = 3001,
    TruncatedStream = 3002,
    LengthExceeded = 3003,
    UnknownExtension = 3004,
    InvalidUtf8 = 3005,

    // === 4xxx: Конфигурация ===
    InvalidOptions = 4000,
    ConfigError = 4001,

    // === 6xxx: IO ===
    Io = 6000,
    UnexpectedEof = 6001,
    NotFound = 6002,
    PermissionDenied = 6003,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Ошибка на стороне кодирования (диапазон 2xxx).
    pub fn is_encode_error(&self) -> bool {
        (2000..=2999).contains(&self.code())
    }

    /// Ошибка на стороне декодирования (диапазон 3xxx).
    ///
    /// Любая такая ошибка делает недействительным всё сообщение целиком.
    pub fn is_decode_error(&self) -> bool {
        (3000..=3999).contains(&self.code())
    }

    /// Ошибка во входных данных, а не в самом кодеке.
    pub fn is_input_error(&self) -> bool {
        let c = self.code();
        matches!(c, 2000..=4999) || matches!(self, Self::InvalidArgs)
    }

    /// Требуется ли логировать как критическую ошибку.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Internal | Self::Unexpected)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::TruncatedStream | Self::UnexpectedEof => LogLevel::Debug,
            Self::UnsupportedType
            | Self::DanglingReference
            | Self::InvalidOptions
            | Self::InvalidArgs => LogLevel::Info,
            Self::Internal | Self::Unexpected => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
