//! Colored terminal output utilities.

use console::{Style, Term};
use hubro_session::ConnectionStatus;

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    dim: Style,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            dim: Style::new().dim(),
        }
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print a connection status change, colored by state.
    pub(crate) fn status(&self, status: ConnectionStatus) {
        let label = format!("● {status}");
        let styled = match status {
            ConnectionStatus::Connected => self.green.apply_to(label),
            ConnectionStatus::Disconnected => self.yellow.apply_to(label),
            ConnectionStatus::Unknown => self.dim.apply_to(label),
        };
        let _ = self.term.write_line(&styled.to_string());
    }
}
