//! Logger capability injected into the migrator
//!
//! The migrator reports applied migrations through this trait instead of a
//! global logger. `NoopLogger` is the default; `TracingLogger` forwards to
//! `tracing`.

use std::fmt;

/// Structured key/value context attached to a log message
pub type LogContext<'a> = &'a [(&'static str, &'a str)];

/// Leveled logging capability. Every method defaults to doing nothing.
pub trait Logger: Send + Sync {
    fn trace(&self, _context: LogContext<'_>, _message: &str) {}
    fn debug(&self, _context: LogContext<'_>, _message: &str) {}
    fn info(&self, _context: LogContext<'_>, _message: &str) {}
    fn warn(&self, _context: LogContext<'_>, _message: &str) {}
    fn error(&self, _context: LogContext<'_>, _message: &str) {}
}

/// Logger that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {}

/// Logger that emits `tracing` events under the `stratum` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn trace(&self, context: LogContext<'_>, message: &str) {
        tracing::trace!(target: "stratum", context = %DisplayContext(context), "{}", message);
    }

    fn debug(&self, context: LogContext<'_>, message: &str) {
        tracing::debug!(target: "stratum", context = %DisplayContext(context), "{}", message);
    }

    fn info(&self, context: LogContext<'_>, message: &str) {
        tracing::info!(target: "stratum", context = %DisplayContext(context), "{}", message);
    }

    fn warn(&self, context: LogContext<'_>, message: &str) {
        tracing::warn!(target: "stratum", context = %DisplayContext(context), "{}", message);
    }

    fn error(&self, context: LogContext<'_>, message: &str) {
        tracing::error!(target: "stratum", context = %DisplayContext(context), "{}", message);
    }
}

/// Renders context as `key=value` pairs separated by spaces
pub struct DisplayContext<'a>(pub LogContext<'a>);

impl fmt::Display for DisplayContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture {
        lines: Mutex<Vec<String>>,
    }

    impl Logger for Capture {
        fn info(&self, context: LogContext<'_>, message: &str) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("{} {}", message, DisplayContext(context)));
        }
    }

    #[test]
    fn test_display_context() {
        let context: LogContext<'_> = &[("filename", "001.sql"), ("table", "migrations")];
        assert_eq!(
            DisplayContext(context).to_string(),
            "filename=001.sql table=migrations"
        );
        assert_eq!(DisplayContext(&[]).to_string(), "");
    }

    #[test]
    fn test_default_methods_are_noops() {
        let capture = Capture::default();
        capture.debug(&[("filename", "a.sql")], "ignored");
        capture.warn(&[], "ignored");
        capture.info(&[("filename", "a.sql")], "applying migration");

        let lines = capture.lines.lock().unwrap();
        assert_eq!(lines.as_slice(), ["applying migration filename=a.sql"]);
    }

    #[test]
    fn test_noop_and_tracing_loggers_accept_calls() {
        let loggers: Vec<Box<dyn Logger>> = vec![Box::new(NoopLogger), Box::new(TracingLogger)];
        for logger in loggers {
            logger.trace(&[], "trace");
            logger.info(&[("filename", "001.sql")], "applying migration");
            logger.error(&[], "error");
        }
    }
}
