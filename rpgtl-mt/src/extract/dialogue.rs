//! 401 / 405 dialogue groups
//!
//! Consecutive records of the same text code form one group. The group's
//! lines are joined, speaker markup and directives are peeled off, and the
//! remaining body becomes one batch item. After the batch returns, the
//! translation is re-wrapped and the markup is put back around it.

use once_cell::sync::Lazy;
use regex::Regex;
use rpgtl::normalize::{normalize_dialogue, unwrap_lines};
use rpgtl::{LineBreak, Record, TranslationConfig, has_source_text, wrap::fill};

use super::{PageExtractor, PageState, Step};
use crate::error::MtResult;

/// `text\nw<Name>`: the tag and anything after it follow the body
static TRAILING_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.*?)([\\]+[nN][wWcC]?<(.*?)>.*)").expect("trailing tag regex"));

/// `\nw<Name>text`: the tag and anything before it lead the body
static LEADING_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.*[\\]+[nN][wWcC]?<(.*?)>)(.*)").expect("leading tag regex"));

/// `\C[n]【Name】\C[n]` or `【Name】` at the very start
static BRACKET_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\\]+[cC]\[[0-9]+\]【?(.+?)】?[\\]+[cC]\[[0-9]+\])|^(【(.+?)】)")
        .expect("bracket name regex")
});

static SOUND_EFFECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\\]+SE\[[^\]]*\]").expect("sound effect regex"));

static FACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\\]+[fFaA]+\[.+?\]").expect("face code regex"));

/// `\rb[漢字,かんじ]` ruby text
static FURIGANA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\\]+rb?\[.+?,(.+?)\]").expect("furigana regex"));

/// Message-window pacing codes: `\!`, `\.`, `\|`, `\>`, `\<`, `\^`, `\{`, `\}`, `\#`
static FORMAT_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\\]+[!><.|#^{}]").expect("format code regex"));

/// `Speaker: ` or `Speaker | ` at the start of a translated item
static SPEAKER_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s?[|:]\s?").expect("speaker prefix regex"));

const CENTER_CODE: &str = "\\CL";

/// Where the speaker nametag goes back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TagPlacement {
    #[default]
    Prefix,
    Suffix,
}

/// A `\n<Name>` speaker tag found in the joined text
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameTag {
    /// The full run of text removed from the body
    tag: String,
    speaker: String,
    placement: TagPlacement,
}

/// Find the speaker tag. Text starting with a control code is read as
/// tag-then-text; anything else as text-then-tag.
fn find_name_tag(text: &str) -> Option<NameTag> {
    if text.starts_with('\\') {
        let caps = LEADING_TAG_RE.captures(text)?;
        Some(NameTag {
            tag: caps[1].to_string(),
            speaker: caps[2].to_string(),
            placement: TagPlacement::Prefix,
        })
    } else {
        let caps = TRAILING_TAG_RE.captures(text)?;
        Some(NameTag {
            tag: caps[2].to_string(),
            speaker: caps[3].to_string(),
            placement: TagPlacement::Suffix,
        })
    }
}

/// `(full bracket run, name)` of a leading bracket speaker
fn find_bracket_speaker(text: &str) -> Option<(String, String)> {
    let caps = BRACKET_NAME_RE.captures(text)?;
    match (caps.get(1), caps.get(2)) {
        (Some(full), Some(name)) => Some((full.as_str().to_string(), name.as_str().to_string())),
        _ => Some((caps.get(3)?.as_str().to_string(), caps.get(4)?.as_str().to_string())),
    }
}

/// Markup removed from a group before translation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Affixes {
    /// Translated speaker tag plus any face code
    nametag: String,
    placement: TagPlacement,
    /// Sound-effect directives, restored in front
    sound_effect: String,
    centered: bool,
    /// Translated bracket speaker, e.g. `【Rena】`
    bracket_speaker: Option<String>,
    /// The batch item carries a `Speaker: ` prefix
    speaker_prefixed: bool,
}

/// A dialogue group waiting for its batch item
pub(super) struct DialogueSpan {
    records: Vec<Record>,
    pub(super) slot: usize,
    affixes: Affixes,
}

impl DialogueSpan {
    pub(super) fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Write `translated` back: the group collapses to its first record,
    /// or to two records when a bracket speaker gets its own line.
    pub(super) fn reinsert(self, translated: &str, config: &TranslationConfig, out: &mut Vec<Record>) {
        let affixes = self.affixes;
        let mut text = if affixes.speaker_prefixed {
            SPEAKER_PREFIX_RE.replace(translated, "").into_owned()
        } else {
            translated.to_string()
        };

        if config.fix_text_wrap {
            text = fill(&text, config.width);
        }
        if config.line_break == LineBreak::Br {
            text = text.replace('\n', LineBreak::Br.as_str());
        }
        if affixes.centered {
            text = format!("{CENTER_CODE}{text}");
        }
        text = match affixes.placement {
            TagPlacement::Prefix => format!("{}{}", affixes.nametag, text),
            TagPlacement::Suffix => format!("{}{}", text, affixes.nametag),
        };
        text = format!("{}{}", affixes.sound_effect, text);

        let mut records = self.records.into_iter();
        let Some(first) = records.next() else {
            return;
        };
        match (affixes.bracket_speaker, records.next()) {
            (Some(speaker), Some(second)) => {
                out.push(first.with_single_text(speaker));
                out.push(second.with_single_text(text));
            }
            (Some(speaker), None) => out.push(first.with_single_text(format!("{speaker}{text}"))),
            (None, _) => out.push(first.with_single_text(text)),
        }
    }
}

impl PageExtractor {
    /// Collect the group starting at `at` into a batch item
    pub(super) async fn dialogue(
        &self,
        records: &[Record],
        at: usize,
        state: &mut PageState,
    ) -> MtResult<usize> {
        let code = records[at].code;
        let len = records[at..].iter().take_while(|r| r.code == code).count();
        let group = &records[at..at + len];

        // records without a line add nothing but are still merged away
        let joined: String = group
            .iter()
            .map(|record| record.str_param(0).unwrap_or_default())
            .collect();

        match self.prepare_dialogue(joined, state).await? {
            Some((doc, affixes)) => {
                let slot = state.docs.len();
                state.docs.push(doc);
                state.steps.push(Step::Dialogue(DialogueSpan {
                    records: group.to_vec(),
                    slot,
                    affixes,
                }));
            }
            None => state.steps.extend(group.iter().cloned().map(Step::Keep)),
        }
        Ok(len)
    }

    /// Peel markup off `joined`. `None` when there is nothing to translate.
    async fn prepare_dialogue(
        &self,
        joined: String,
        state: &mut PageState,
    ) -> MtResult<Option<(String, Affixes)>> {
        let config = self.config();
        let mut body = joined.replace('？', "?");
        if body.is_empty() {
            return Ok(None);
        }

        let mut affixes = Affixes::default();
        let mut speaker_label = String::new();

        if let Some(tag) = find_name_tag(&body) {
            body = body.replacen(&tag.tag, "", 1);
            affixes.nametag = if tag.speaker.is_empty() {
                tag.tag
            } else {
                let translated = self.speaker_name(&tag.speaker, state).await?;
                tag.tag.replace(&tag.speaker, &translated)
            };
            affixes.placement = tag.placement;
            speaker_label = tag.speaker;
        }

        if config.bracket_names {
            if let Some((full, name)) = find_bracket_speaker(&body) {
                let translated = self.speaker_name(&name, state).await?;
                body = body.replacen(&full, "", 1);
                affixes.bracket_speaker = Some(full.replace(&name, &translated));
                speaker_label = translated;
            }
        }

        let effects: Vec<String> = SOUND_EFFECT_RE
            .find_iter(&body)
            .map(|m| m.as_str().to_string())
            .collect();
        if !effects.is_empty() {
            body = SOUND_EFFECT_RE.replace_all(&body, "").into_owned();
            affixes.sound_effect = effects.concat();
        }

        if config.fix_text_wrap {
            body = unwrap_lines(&body);
        }
        body = normalize_dialogue(&body);

        if let Some(face) = FACE_RE.find(&body).map(|m| m.as_str().to_string()) {
            body = body.replacen(&face, "", 1);
            affixes.nametag.push_str(&face);
        }
        body = FURIGANA_RE.replace_all(&body, "$1").into_owned();
        body = FORMAT_CODE_RE.replace_all(&body, "").into_owned();
        if body.contains(CENTER_CODE) {
            body = body.replace(CENTER_CODE, "");
            affixes.centered = true;
        }

        if config.ignore_translated_text && !has_source_text(&body) {
            state.history.push(body);
            return Ok(None);
        }

        let doc = match (speaker_label.is_empty(), body.is_empty()) {
            (true, _) => body.clone(),
            (false, true) => speaker_label.clone(),
            (false, false) => format!("{speaker_label}: {body}"),
        };
        affixes.speaker_prefixed = !speaker_label.is_empty();
        state
            .history
            .push(if body.is_empty() { speaker_label } else { body });

        Ok(Some((doc, affixes)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::extractor;
    use super::*;
    use crate::mock::{MockMode, MockModel};
    use crate::progress::NoProgress;
    use rpgtl::Page;
    use rpgtl::event::codes;

    fn texts(page: &Page) -> Vec<&str> {
        page.records
            .iter()
            .map(|r| r.str_param(0).unwrap_or_default())
            .collect()
    }

    async fn run(model: Arc<MockModel>, config: TranslationConfig, lines: &[&str]) -> Page {
        let page = Page::new(
            lines
                .iter()
                .map(|l| Record::text(codes::SHOW_TEXT, l))
                .collect(),
        );
        extractor(model, config)
            .translate_page(page, &NoProgress)
            .await
            .unwrap()
            .0
    }

    // ========== Markup Detection Tests ==========

    #[test]
    fn test_find_name_tag_leading() {
        let tag = find_name_tag("\\nw<レナ>元気だよ").unwrap();
        assert_eq!(tag.tag, "\\nw<レナ>");
        assert_eq!(tag.speaker, "レナ");
        assert_eq!(tag.placement, TagPlacement::Prefix);
    }

    #[test]
    fn test_find_name_tag_trailing() {
        let tag = find_name_tag("元気だよ\\n<セレナ>").unwrap();
        assert_eq!(tag.tag, "\\n<セレナ>");
        assert_eq!(tag.speaker, "セレナ");
        assert_eq!(tag.placement, TagPlacement::Suffix);
        assert!(find_name_tag("元気だよ").is_none());
    }

    #[test]
    fn test_find_bracket_speaker() {
        assert_eq!(
            find_bracket_speaker("【レナ】こんにちは"),
            Some(("【レナ】".to_string(), "レナ".to_string()))
        );
        assert_eq!(
            find_bracket_speaker("\\C[6]【レナ】\\C[0]こんにちは"),
            Some(("\\C[6]【レナ】\\C[0]".to_string(), "レナ".to_string()))
        );
        assert_eq!(find_bracket_speaker("こんにちは【レナ】"), None);
    }

    // ========== Group Translation Tests ==========

    #[tokio::test]
    async fn test_group_merges_into_first_record() {
        let model = Arc::new(MockModel::with_mappings([(
            "こんにちは元気?",
            "Hello, how are you?",
        )]));
        let page = run(
            model.clone(),
            TranslationConfig::default(),
            &["こんにちは", "元気？"],
        )
        .await;
        assert_eq!(texts(&page), vec!["Hello, how are you?"]);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_record_is_merged_away() {
        let model = Arc::new(MockModel::with_mappings([(
            "こんにちは元気?",
            "Hello, how are you?",
        )]));
        let page = Page::new(vec![
            Record::text(codes::SHOW_TEXT, "こんにちは"),
            Record::new(codes::SHOW_TEXT, vec![]),
            Record::text(codes::SHOW_TEXT, "元気？"),
        ]);
        let (out, outcome) = extractor(model.clone(), TranslationConfig::default())
            .translate_page(page, &NoProgress)
            .await
            .unwrap();
        assert_eq!(texts(&out), vec!["Hello, how are you?"]);
        assert!(outcome.mismatch.is_none());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_leading_speaker_tag_uses_speaker_table() {
        let model = Arc::new(MockModel::with_mappings([("レナ: 元気だよ", "Rena: I'm fine")]));
        let page = run(model.clone(), TranslationConfig::default(), &["\\nw<レナ>元気だよ"]).await;
        assert_eq!(texts(&page), vec!["\\nw<Rena>I'm fine"]);
        // only the batch call; the name came from the table
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_trailing_speaker_tag_goes_after_body() {
        let model = Arc::new(MockModel::with_mappings([("レナ: 元気だよ", "Rena: I'm fine")]));
        let page = run(model, TranslationConfig::default(), &["元気だよ\\n<レナ>"]).await;
        assert_eq!(texts(&page), vec!["I'm fine\\n<Rena>"]);
    }

    #[tokio::test]
    async fn test_unknown_speaker_is_translated_separately() {
        let model = Arc::new(MockModel::with_mappings([
            ("ミナ", "Mina"),
            ("ミナ: 行こう", "Mina: Let's go"),
        ]));
        let page = run(model.clone(), TranslationConfig::default(), &["\\n<ミナ>行こう"]).await;
        assert_eq!(texts(&page), vec!["\\n<Mina>Let's go"]);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_bracket_speaker_gets_own_record() {
        let model = Arc::new(MockModel::with_mappings([("Rena: こんにちは", "Rena: Hello")]));
        let config = TranslationConfig {
            bracket_names: true,
            ..TranslationConfig::default()
        };
        let page = run(model, config, &["【レナ】", "こんにちは"]).await;
        assert_eq!(texts(&page), vec!["【Rena】", "Hello"]);
    }

    #[tokio::test]
    async fn test_bracket_speaker_single_record_is_prefixed() {
        let model = Arc::new(MockModel::with_mappings([("Rena: こんにちは", "Rena: Hello")]));
        let config = TranslationConfig {
            bracket_names: true,
            ..TranslationConfig::default()
        };
        let page = run(model, config, &["【レナ】こんにちは"]).await;
        assert_eq!(texts(&page), vec!["【Rena】Hello"]);
    }

    #[tokio::test]
    async fn test_directives_are_restored() {
        let model = Arc::new(MockModel::with_mappings([("ようこそ", "Welcome")]));
        let page = run(
            model,
            TranslationConfig::default(),
            &["\\SE[1]\\CLよう\\!こそ"],
        )
        .await;
        assert_eq!(texts(&page), vec!["\\SE[1]\\CLWelcome"]);
    }

    #[tokio::test]
    async fn test_furigana_reduced_to_reading() {
        let model = Arc::new(MockModel::new(MockMode::Echo));
        let page = run(model.clone(), TranslationConfig::default(), &["\\rb[漢字,かんじ]です"]).await;
        assert_eq!(texts(&page), vec!["かんじです"]);
    }

    #[tokio::test]
    async fn test_rewrap_with_br() {
        let model = Arc::new(MockModel::with_mappings([(
            "長い文",
            "one two three four five six",
        )]));
        let config = TranslationConfig {
            width: 10,
            line_break: LineBreak::Br,
            ..TranslationConfig::default()
        };
        let page = run(model, config, &["長い文"]).await;
        assert_eq!(texts(&page), vec!["one two<br>three four<br>five six"]);
    }

    #[tokio::test]
    async fn test_translated_group_is_skipped() {
        let model = Arc::new(MockModel::new(MockMode::Echo));
        let page = run(
            model.clone(),
            TranslationConfig::default(),
            &["Already", "translated"],
        )
        .await;
        assert_eq!(texts(&page), vec!["Already", "translated"]);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_groups_batch_together() {
        let model = Arc::new(MockModel::new(MockMode::Suffix("(en)".into())));
        let page = Page::new(vec![
            Record::text(codes::SHOW_TEXT, "一"),
            Record::new(codes::END, vec![]),
            Record::text(codes::SHOW_TEXT, "二"),
        ]);
        let (out, outcome) = extractor(model.clone(), TranslationConfig::default())
            .translate_page(page, &NoProgress)
            .await
            .unwrap();
        assert_eq!(texts(&out), vec!["一 (en)", "", "二 (en)"]);
        assert!(outcome.mismatch.is_none());
        assert_eq!(model.calls(), 1);
    }
}
