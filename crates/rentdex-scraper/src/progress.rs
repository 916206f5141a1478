//! Job progress reporting passed down from the pipeline into adapters.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for human-readable progress lines emitted during a job.
///
/// Adapters receive a `&dyn JobLogger` so they can report progress without
/// knowing whether it goes to `tracing`, a test buffer or nowhere.
pub trait JobLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl JobLogger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Forwards progress lines to `tracing`, tagged with the job and source.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    job: &'static str,
    source: Option<String>,
}

impl TracingLogger {
    #[must_use]
    pub fn new(job: &'static str, source: Option<&str>) -> Self {
        Self {
            job,
            source: source.map(str::to_owned),
        }
    }
}

impl JobLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        let source = self.source.as_deref().unwrap_or("-");
        match level {
            LogLevel::Debug => tracing::debug!(job = self.job, source, "{message}"),
            LogLevel::Info => tracing::info!(job = self.job, source, "{message}"),
            LogLevel::Warn => tracing::warn!(job = self.job, source, "{message}"),
            LogLevel::Error => tracing::error!(job = self.job, source, "{message}"),
        }
    }
}
