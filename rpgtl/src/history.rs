//! Rolling translation history for one page.
//! Bounded FIFO of the most recent lines, oldest evicted first.

use std::collections::VecDeque;

/// Default number of lines kept as conversational context.
pub const MAX_HISTORY: usize = 10;

/// The last `capacity` lines translated (or seen) while walking a page.
///
/// Each page worker owns its own window; nothing is shared across pages.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    lines: VecDeque<String>,
    capacity: usize,
}

impl ContextWindow {
    /// Create an empty window holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one line, evicting the oldest if full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Append several lines in order.
    pub fn append<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.push(line);
        }
    }

    /// Replace the whole window with the tail of `lines`.
    pub fn replace_with<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.clear();
        self.append(lines);
    }

    /// The retained lines, oldest first.
    pub fn window(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// The most recent line, if any.
    pub fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_only_most_recent() {
        let mut window = ContextWindow::new(3);
        window.append(["a", "b", "c", "d", "e"]);
        assert_eq!(window.window(), vec!["c", "d", "e"]);
        assert_eq!(window.last(), Some("e"));
    }

    #[test]
    fn test_default_capacity() {
        let mut window = ContextWindow::default();
        window.append((0..25).map(|i| i.to_string()));
        assert_eq!(window.len(), MAX_HISTORY);
        assert_eq!(window.window().first().map(String::as_str), Some("15"));
    }

    #[test]
    fn test_replace_with_keeps_tail() {
        let mut window = ContextWindow::new(2);
        window.push("old");
        window.replace_with(["x", "y", "z"]);
        assert_eq!(window.window(), vec!["y", "z"]);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut window = ContextWindow::new(0);
        window.push("ignored");
        assert!(window.is_empty());
        assert_eq!(window.last(), None);
    }
}
