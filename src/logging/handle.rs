use tracing_appender::non_blocking::WorkerGuard;

/// Handle для управления lifecycle логирования.
///
/// Держит guard файлового приёмника: пока handle жив, фоновый поток
/// записи работает; при drop буфер сбрасывается на диск.
#[derive(Default)]
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self { file_guard }
    }

    /// Включён ли файловый приёмник.
    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Сбрасывает буферы и останавливает фоновую запись.
    pub fn shutdown(mut self) {
        if let Some(guard) = self.file_guard.take() {
            tracing::debug!("flushing file log sink");
            drop(guard);
        }
    }
}

impl std::fmt::Debug for LoggingHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("file_sink", &self.has_file_sink())
            .finish()
    }
}
