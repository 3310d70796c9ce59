use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    codec::{DeserializeOptions, SerializeOptions, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_LENGTH},
    logging::{FileConfig, LogFormat, LoggingConfig},
    value::Endian,
};

/// Имя файла конфигурации по умолчанию (расширение подбирается: `.toml`,
/// `.json`, `.yaml`).
pub const DEFAULT_CONFIG_FILE: &str = "zgraph";

/// Префикс переменных окружения: `ZGRAPH_MAX_LENGTH`, `ZGRAPH_ENDIAN`, ...
pub const ENV_PREFIX: &str = "ZGRAPH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Предел длины входного потока в байтах.
    pub max_length: u64,
    /// Порядок байт typed-массивов при записи; `None` — порядок хоста.
    #[serde(default)]
    pub endian: Option<Endian>,
    /// Размер чанка для потоковой записи и чтения.
    pub chunk_size: usize,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Каталог для файловых логов; `None` — только консоль.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Загружает настройки: значения по умолчанию, необязательный
    /// `zgraph.toml` в текущем каталоге, переменные окружения.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// Как [`load`](Self::load), но файл задан явно и обязателен.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::build(File::from(path).required(true))
    }

    fn build(file: File<config::FileSourceFile, config::FileFormat>) -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            // Adding default values
            .set_default("max_length", DEFAULT_MAX_LENGTH)?
            .set_default("chunk_size", DEFAULT_CHUNK_SIZE as u64)?
            .set_default("log_level", "warn")?
            .set_default("log_format", "compact")?
            .add_source(file)
            // Add environment variables with the ZGRAPH_ prefix
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_length == 0 {
            return Err(ConfigError::Message("max_length must be positive".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Message("chunk_size must be positive".into()));
        }
        Ok(())
    }

    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            endian: self.endian.unwrap_or_default(),
        }
    }

    pub fn deserialize_options(&self) -> DeserializeOptions {
        DeserializeOptions {
            max_length: self.max_length,
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format,
            file: self.log_dir.as_ref().map(|dir| FileConfig {
                dir: dir.clone(),
                prefix: "zgraph.log".into(),
            }),
            ..LoggingConfig::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            endian: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            log_level: "warn".into(),
            log_format: LogFormat::Compact,
            log_dir: None,
        }
    }
}
