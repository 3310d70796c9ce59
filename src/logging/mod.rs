#[cfg(test)]
mod capture;
pub mod config;
mod filters;
mod formatter;
pub mod handle;
mod report;
pub mod sinks;

pub use config::{FileConfig, LogFormat, LoggingConfig};
pub use filters::LOG_ENV;
pub use handle::LoggingHandle;
pub use report::log_error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Инициализация логирования с конфигурацией.
///
/// Повторный вызов в том же процессе возвращает ошибку: глобальный
/// subscriber уже установлен.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingHandle, Box<dyn std::error::Error>> {
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers = Vec::new();

    // Console layer
    if config.console_enabled {
        layers.push(sinks::console::layer_with_config(&config));
    }

    // File layer
    let file_guard = match &config.file {
        Some(file) => {
            let (layer, guard) = sinks::file::layer_with_config(&config, file)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = ?config.format,
        console_enabled = config.console_enabled,
        file_enabled = file_guard.is_some(),
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
