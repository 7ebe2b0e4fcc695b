//! Progress reporting
//!
//! The extractor and the runner only see a [`ProgressSink`]; the binary
//! plugs in an indicatif bar, tests and library callers use [`NoProgress`].

use indicatif::{ProgressBar, ProgressStyle};

/// Receiver of progress signals. Shared by every page worker of a file.
pub trait ProgressSink: Send + Sync {
    /// A new file begins with `total` records
    fn start(&self, label: &str, total: u64);

    /// `n` more records handled
    fn advance(&self, n: u64);

    /// The current file is done
    fn finish(&self);
}

/// Discards every signal
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _label: &str, _total: u64) {}
    fn advance(&self, _n: u64) {}
    fn finish(&self) {}
}

/// Terminal progress bar, one bar per file
#[derive(Debug, Clone)]
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(bar_style());
        Self { bar }
    }

    /// A bar that draws nothing; used when stderr is not wanted
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn start(&self, label: &str, total: u64) {
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_message(label.to_string());
    }

    fn advance(&self, n: u64) {
        self.bar.inc(n);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .expect("valid template")
        .progress_chars("=>-")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_counts() {
        let progress = TerminalProgress::hidden();
        progress.start("Map001.json", 10);
        progress.advance(3);
        progress.advance(2);
        assert_eq!(progress.bar.position(), 5);
        assert_eq!(progress.bar.length(), Some(10));
        progress.finish();
    }
}
