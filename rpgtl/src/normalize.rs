//! Text clean-up on both sides of the model call.
//! Source side: punctuation variants that degrade translation quality.
//! Response side: boilerplate prefixes and stray full-width punctuation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentinel sent in place of an empty batch item.
pub const EMPTY_ITEM_SENTINEL: &str = "Placeholder Text";

static ELLIPSIS_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.{3}\.+").expect("ellipsis regex"));

fn is_kana(c: char) -> bool {
    ('ぁ'..='ゖ').contains(&c) || ('ァ'..='ヺ').contains(&c)
}

/// Normalize a dialogue string before it is sent for translation.
///
/// Half-width voicing marks and ideographic spaces are dropped, middle
/// dots become periods, long dashes become hyphens and any ellipsis run
/// longer than three dots is collapsed. The prolonged sound mark `ー` is
/// only treated as a dash when it does not extend a kana.
pub fn normalize_dialogue(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for c in text.chars() {
        match c {
            'ﾞ' | '‶' | '”' | '\u{3000}' => {}
            '・' => out.push('.'),
            '―' => out.push('-'),
            'ー' if !prev.is_some_and(is_kana) && prev != Some('ー') => out.push('-'),
            'ー' if prev == Some('ー') && !out.ends_with('ー') => out.push('-'),
            '…' => out.push_str("..."),
            '？' => out.push('?'),
            _ => out.push(c),
        }
        prev = Some(c);
    }
    ELLIPSIS_RUN_RE.replace_all(&out, "...").into_owned()
}

/// Undo manual line breaks so the model sees one continuous sentence.
pub fn unwrap_lines(text: &str) -> String {
    text.replace('\n', " ").replace("<br>", " ")
}

/// Clean a raw model response.
///
/// Removes the `Translation:` prefixes the output format asks for, the
/// empty-item sentinel, and source-script punctuation the model
/// sometimes leaves behind.
pub fn clean_response(text: &str, language: &str) -> String {
    let language_prefix = format!("{language} Translation: ");
    let mut cleaned = text
        .replace(&language_prefix, "")
        .replace("Translation: ", "")
        .replace(EMPTY_ITEM_SENTINEL, "");
    for (from, to) in [
        ("っ", ""),
        ("ッ", ""),
        ("〜", "~"),
        ("ー", "-"),
        ("。", "."),
        ("、", ","),
        ("！", "!"),
        ("？", "?"),
    ] {
        cleaned = cleaned.replace(from, to);
    }
    cleaned
}

/// Remove every occurrence of each pattern in `patterns`.
///
/// Used on payloads whose surrounding syntax would break on quotes,
/// periods or literal `\n` sequences.
pub fn strip_all(text: &str, patterns: &[&str]) -> String {
    patterns
        .iter()
        .fold(text.to_string(), |acc, p| acc.replace(p, ""))
}

/// Uppercase the first character, leaving the rest untouched.
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation() {
        assert_eq!(normalize_dialogue("えっ……本当？"), "えっ...本当?");
        assert_eq!(normalize_dialogue("A・B"), "A.B");
        assert_eq!(normalize_dialogue("待って―"), "待って-");
        assert_eq!(normalize_dialogue("全角\u{3000}空白"), "全角空白");
        assert_eq!(normalize_dialogue("そう........"), "そう...");
    }

    #[test]
    fn test_prolonged_mark_inside_words_is_kept() {
        assert_eq!(normalize_dialogue("ボーナス"), "ボーナス");
        assert_eq!(normalize_dialogue("えーと"), "えーと");
        assert_eq!(normalize_dialogue("「ー」"), "「-」");
    }

    #[test]
    fn test_unwrap_lines() {
        assert_eq!(unwrap_lines("一行目\n二行目<br>三行目"), "一行目 二行目 三行目");
    }

    #[test]
    fn test_clean_response() {
        assert_eq!(
            clean_response("English Translation: Hello。", "English"),
            "Hello."
        );
        assert_eq!(clean_response("Translation: Wait〜！", "English"), "Wait~!");
        assert_eq!(
            clean_response("<Line0>Placeholder Text</Line0>", "English"),
            "<Line0></Line0>"
        );
    }

    #[test]
    fn test_strip_and_capitalize() {
        assert_eq!(strip_all("\"Yes.\"\\n", &[".", "\"", "\\n"]), "Yes");
        assert_eq!(capitalize_first("yes, I will"), "Yes, I will");
        assert_eq!(capitalize_first(""), "");
    }
}
