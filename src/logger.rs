//! Sink for background-operation failures.
//!
//! Sweeps, dumps and restores run off the caller's thread, so their failures
//! cannot be returned. They are reported to the configured [`Logger`]; with no
//! logger configured they go to `tracing` at `WARN` level. Logging never fails
//! an operation.

use std::fmt;

/// printf-style log sink.
pub trait Logger: Send + Sync {
    fn log(&self, args: fmt::Arguments<'_>);
}

/// Forwards every message to `tracing` at `WARN` level under the `ttlkit` target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(target: "ttlkit", "{}", args);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Logger capturing messages for assertions.
    #[derive(Debug, Default)]
    pub(crate) struct CaptureLogger {
        pub(crate) lines: Mutex<Vec<String>>,
    }

    impl Logger for CaptureLogger {
        fn log(&self, args: fmt::Arguments<'_>) {
            self.lines.lock().push(args.to_string());
        }
    }

    #[test]
    fn capture_logger_formats_arguments() {
        let logger = CaptureLogger::default();
        logger.log(format_args!("bucket {}: {}", 3, "failed"));
        assert_eq!(logger.lines.lock().as_slice(), ["bucket 3: failed"]);
    }

    #[test]
    fn tracing_logger_without_subscriber_is_silent() {
        TracingLogger.log(format_args!("nobody is listening"));
    }
}
