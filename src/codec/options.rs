use serde::{Deserialize, Serialize};
use zgraph_error::OptionsError;

use crate::value::Endian;

/// Предел длины потока по умолчанию: 1 GiB.
pub const DEFAULT_MAX_LENGTH: u64 = 1 << 30;

/// Параметры записи.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializeOptions {
    /// Порядок байт для payload typed-массивов. По умолчанию — порядок
    /// хоста.
    #[serde(default)]
    pub endian: Endian,
}

impl SerializeOptions {
    pub fn with_endian(
        mut self,
        endian: Endian,
    ) -> Self {
        self.endian = endian;
        self
    }
}

/// Параметры чтения.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeserializeOptions {
    /// Максимальное кол-во байт, которое примет одна сессия.
    #[serde(default = "default_max_length")]
    pub max_length: u64,
}

impl DeserializeOptions {
    pub fn with_max_length(
        mut self,
        max_length: u64,
    ) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_length == 0 {
            return Err(OptionsError::invalid(
                "max_length",
                "must be a positive number of bytes",
            ));
        }
        Ok(())
    }
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

fn default_max_length() -> u64 {
    DEFAULT_MAX_LENGTH
}
