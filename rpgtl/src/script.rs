//! Source-script detection
//!
//! The translation pipeline only spends a remote call on text that still
//! contains characters of the source script (Japanese kanji, hiragana and
//! katakana). Everything else is either already translated, or pure
//! symbols and control codes, and is passed through unchanged.

/// Returns true for kanji in the `一..=龠` block.
fn is_kanji(c: char) -> bool {
    ('一'..='龠').contains(&c)
}

/// Returns true for hiragana `ぁ..=ゔ`.
fn is_hiragana(c: char) -> bool {
    ('ぁ'..='ゔ').contains(&c)
}

/// Returns true for katakana `ァ..=ヴ` and the prolonged sound mark `ー`.
fn is_katakana(c: char) -> bool {
    ('ァ'..='ヴ').contains(&c) || c == 'ー'
}

/// Returns true for full-width latin letters and digits.
fn is_fullwidth_alnum(c: char) -> bool {
    ('ａ'..='ｚ').contains(&c) || ('Ａ'..='Ｚ').contains(&c) || ('０'..='９').contains(&c)
}

/// Check whether a character belongs to the source script
pub fn is_source_char(c: char) -> bool {
    is_kanji(c) || is_hiragana(c) || is_katakana(c)
}

/// Check whether `text` contains any source-script character
///
/// This is the probe used by the extractor to decide whether a dialogue
/// group needs translating at all.
///
/// # Example
///
/// ```
/// use rpgtl::script::has_source_text;
///
/// assert!(has_source_text("こんにちは"));
/// assert!(has_source_text("Level 5 ボス"));
/// assert!(!has_source_text("Hello \\C[2]world"));
/// ```
pub fn has_source_text(text: &str) -> bool {
    text.chars().any(is_source_char)
}

/// Check whether a request payload is worth sending to the remote model
///
/// Slightly wider than [`has_source_text`]: full-width latin letters and
/// digits also count, since the model normalizes them to half-width.
pub fn needs_translation(payload: &str) -> bool {
    payload
        .chars()
        .any(|c| is_source_char(c) || is_fullwidth_alnum(c))
}
