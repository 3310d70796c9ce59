pub mod codec;

pub use codec::*;

use crate::{ErrorExt, StatusCode};

/// Универсальная ошибка с кодом и сообщением.
#[derive(Debug, Clone)]
pub struct GenericError {
    code: StatusCode,
    message: String,
}

impl GenericError {
    pub fn new(
        code: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for GenericError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GenericError {}

impl ErrorExt for GenericError {
    fn status_code(&self) -> StatusCode {
        self.code
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Конвертация из std::io::Error
impl From<std::io::Error> for crate::StackError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => StatusCode::NotFound,
            std::io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
            std::io::ErrorKind::UnexpectedEof => StatusCode::UnexpectedEof,
            _ => StatusCode::Io,
        };

        crate::StackError::new(GenericError::new(code, err.to_string()))
    }
}

/// Конвертация из std::str::Utf8Error
impl From<std::str::Utf8Error> for crate::StackError {
    fn from(err: std::str::Utf8Error) -> Self {
        crate::StackError::new(GenericError::new(
            StatusCode::InvalidUtf8,
            format!("UTF-8 decoding failed: {err}"),
        ))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_generic_error() {
        let err = GenericError::new(StatusCode::InvalidArgs, "test message");
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);
        assert_eq!(err.to_string(), "test message");
    }

    /// Тест проверяет, что as_any() позволяет сделать downcast_ref к
    /// GenericError.
    #[test]
    fn test_generic_error_as_any_downcast() {
        let err = GenericError::new(StatusCode::ConfigError, "bad config");
        let down = err.as_any().downcast_ref::<GenericError>().unwrap();
        assert_eq!(down.status_code(), StatusCode::ConfigError);
    }

    /// Тест проверяет маппинг std::io::ErrorKind -> StatusCode.
    #[test]
    fn test_io_error_kind_mapping() {
        let cases = [
            (io::ErrorKind::NotFound, StatusCode::NotFound, "missing"),
            (
                io::ErrorKind::PermissionDenied,
                StatusCode::PermissionDenied,
                "perm",
            ),
            (io::ErrorKind::UnexpectedEof, StatusCode::UnexpectedEof, "eof"),
            (io::ErrorKind::BrokenPipe, StatusCode::Io, "pipe"),
        ];

        for (kind, expected, msg) in cases {
            let stack: crate::StackError = io::Error::new(kind, msg).into();
            assert_eq!(stack.status_code(), expected, "kind={kind:?}");
            assert!(stack.to_string().contains(msg));
        }
    }

    #[test]
    fn test_utf8_error_conversion() {
        let bytes = [0xff, 0xfe];
        let err = std::str::from_utf8(&bytes).unwrap_err();
        let stack: crate::StackError = err.into();
        assert_eq!(stack.status_code(), StatusCode::InvalidUtf8);
        assert!(stack.to_string().contains("UTF-8"));
    }
}
