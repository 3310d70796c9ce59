use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Формат консольного вывода.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Многострочный вывод для разработки.
    Pretty,
    /// Одна строка на событие.
    #[default]
    Compact,
    /// Одна JSON-запись на событие.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Настройки файлового приёмника.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileConfig {
    /// Каталог для логов (создаётся при инициализации).
    pub dir: PathBuf,
    /// Префикс имени файла; к нему добавляется дата.
    #[serde(default = "default_file_prefix")]
    pub prefix: String,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Уровень или директива фильтра (`info`, `zgraph=debug,warn`).
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_true")]
    pub console_enabled: bool,
    #[serde(default = "default_true")]
    pub with_ansi: bool,
    #[serde(default = "default_true")]
    pub with_target: bool,
    #[serde(default)]
    pub with_line_numbers: bool,
    /// Файловый приёмник; `None` — только консоль.
    #[serde(default)]
    pub file: Option<FileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            console_enabled: true,
            with_ansi: true,
            with_target: true,
            with_line_numbers: false,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Конфигурация для CLI: quiet важнее verbose.
    pub fn for_cli(
        verbose: bool,
        quiet: bool,
    ) -> Self {
        let level = if quiet {
            "off"
        } else if verbose {
            "debug"
        } else {
            "warn"
        };
        Self {
            level: level.to_string(),
            with_target: false,
            ..Self::default()
        }
    }

    /// Директива фильтра из конфигурации.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            default_level()
        } else {
            level.to_string()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.console_enabled && self.file.is_none() {
            return Err("logging has no sink: console is disabled and no file is set".into());
        }
        if let Some(file) = &self.file {
            if file.prefix.trim().is_empty() {
                return Err("log file prefix must not be empty".into());
            }
        }
        Ok(())
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "zgraph.log".to_string()
}

fn default_true() -> bool {
    true
}
