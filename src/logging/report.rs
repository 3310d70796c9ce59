//! Запись [`StackError`] в лог на уровне, который задаёт код статуса.

use zgraph_error::{LogLevel, StackError};

macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            LogLevel::Trace => tracing::event!(tracing::Level::TRACE, $($arg)+),
            LogLevel::Debug => tracing::event!(tracing::Level::DEBUG, $($arg)+),
            LogLevel::Info => tracing::event!(tracing::Level::INFO, $($arg)+),
            LogLevel::Warn => tracing::event!(tracing::Level::WARN, $($arg)+),
            LogLevel::Error => tracing::event!(tracing::Level::ERROR, $($arg)+),
        }
    };
}

/// Пишет ошибку с тегами [`StackError::metrics_tags`]. Уровень берётся из
/// [`StackError::log_level`]: обрыв потока уходит в `debug`, порча потока
/// в `warn`, внутренние ошибки в `error`.
pub fn log_error(
    err: &StackError,
    message: &str,
) {
    let tags = err.metrics_tags();
    event_at!(
        err.log_level(),
        error = %err,
        critical = err.is_critical(),
        ?tags,
        "{message}"
    );
}
