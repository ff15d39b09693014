//! Where user-facing status text goes.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub trait MessageSink: Send + Sync {
    /// A one-off status or error line.
    fn emit(&self, line: &str);

    /// A progress block that replaces the previous one. Sinks that cannot
    /// redraw in place just emit it.
    fn progress(&self, block: &str) {
        self.emit(block);
    }

    /// Called once when no more progress blocks will follow.
    fn finish(&self) {}
}

/// Quiet mode.
pub struct NullSink;

impl MessageSink for NullSink {
    fn emit(&self, _line: &str) {}
}

/// Terminal output on stderr. Status lines are printed above a single
/// `{msg}` bar that holds the latest progress block.
pub struct TerminalSink {
    bar: ProgressBar,
}

impl TerminalSink {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(5));
        if let Ok(style) = ProgressStyle::default_bar().template("{msg}") {
            bar.set_style(style);
        }
        Self { bar }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSink for TerminalSink {
    fn emit(&self, line: &str) {
        self.bar.println(line);
    }

    fn progress(&self, block: &str) {
        self.bar.set_message(block.to_string());
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
