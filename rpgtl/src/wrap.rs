//! Greedy line wrapping for translated text.
//!
//! Message windows in RPG Maker have a fixed width, so translated text is
//! re-flowed to a configured number of characters per line. Words are
//! packed greedily; a single word longer than the width is split.

/// Wrap `text` to lines of at most `width` characters, joined by `\n`.
///
/// Existing whitespace (including newlines) is collapsed. A `width` of
/// zero returns the text unchanged.
///
/// # Example
///
/// ```
/// use rpgtl::wrap::fill;
///
/// assert_eq!(fill("the quick brown fox", 10), "the quick\nbrown fox");
/// ```
pub fn fill(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        loop {
            let needed = if current_len == 0 {
                word.len()
            } else {
                current_len + 1 + word.len()
            };
            if needed <= width {
                if current_len > 0 {
                    current.push(' ');
                    current_len += 1;
                }
                current.extend(word.iter());
                current_len += word.len();
                break;
            }
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            // the word alone is wider than a line
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines.join("\n")
}
