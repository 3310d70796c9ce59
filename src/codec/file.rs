use zgraph_error::DecodeError;

/// Поддерживаемые версии формата.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    V1 = 1,
}

impl TryFrom<u8> for FormatVersion {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FormatVersion::V1),
            other => Err(DecodeError::malformed(
                format!(
                    "unsupported format version {other} (supported: {})",
                    FORMAT_VERSION
                ),
                Some(0),
            )),
        }
    }
}

/// Версия, которую пишет кодировщик (первый байт каждого сообщения).
pub const FORMAT_VERSION: u8 = FormatVersion::V1 as u8;
