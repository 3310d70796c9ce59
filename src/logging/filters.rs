use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// Переменная окружения с директивой фильтра; важнее `RUST_LOG`.
pub const LOG_ENV: &str = "ZGRAPH_LOG";

/// Собирает фильтр: `ZGRAPH_LOG`, затем `RUST_LOG`, затем конфигурация.
/// Некорректная директива в конфигурации заменяется на `info`.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let directive = config.build_filter_directive();
    match EnvFilter::try_new(&directive) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Invalid log filter directive '{directive}': {e}; falling back to 'info'");
            EnvFilter::new("info")
        }
    }
}
