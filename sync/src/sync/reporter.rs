//! User-facing status output

use std::io::Write;
use std::sync::Mutex;

use colored::Colorize;

/// Sink for the status lines a user sees during a sync
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);

    /// An operation has begun and will be closed by [`Reporter::stop`]
    fn start(&self, message: &str);

    fn stop(&self, message: &str);

    fn success(&self, message: &str);

    /// `cause` is the error that ended the sync
    fn failure(&self, message: &str, cause: &str);
}

/// Writes coloured status lines to a terminal
pub struct TerminalReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl TerminalReporter<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> TerminalReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    fn line(&self, text: String) {
        // Status output is best effort
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", text);
            let _ = out.flush();
        }
    }
}

impl<W: Write + Send> Reporter for TerminalReporter<W> {
    fn info(&self, message: &str) {
        self.line(message.to_string());
    }

    fn start(&self, message: &str) {
        self.line(format!("{} {}", "*".cyan(), message));
    }

    fn stop(&self, message: &str) {
        self.line(format!("{} {}", "*".cyan(), message));
    }

    fn success(&self, message: &str) {
        self.line(message.green().bold().to_string());
    }

    fn failure(&self, message: &str, cause: &str) {
        self.line(message.red().bold().to_string());
        self.line(cause.red().to_string());
    }
}
