//! 102 choice lists

use once_cell::sync::Lazy;
use regex::Regex;
use rpgtl::normalize::{capitalize_first, strip_all};
use rpgtl::{Record, has_source_text};
use serde_json::Value;

use super::{PageExtractor, PageState};
use crate::error::MtResult;
use crate::prompt::{History, notes};

/// Choice-condition plugins: `en(v[1]>0) はい` / `はい if(s[2])`
static CONDITION_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:en|if)\(.*?\)(?:\s+|$)").expect("condition prefix regex"));

static CONDITION_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:en|if)\(.*\)$").expect("condition suffix regex"));

impl PageExtractor {
    pub(super) async fn choices(
        &self,
        record: &Record,
        choices: Vec<String>,
        state: &mut PageState,
    ) -> MtResult<Record> {
        let mut out = record.clone();
        if let Some(Value::Array(items)) = out.parameters.get_mut(0) {
            for (item, choice) in items.iter_mut().zip(choices) {
                if item.is_string() {
                    *item = Value::String(self.choice(&choice, state).await?);
                }
            }
        }
        Ok(out)
    }

    /// Translate one choice, keeping its condition markup
    async fn choice(&self, text: &str, state: &mut PageState) -> MtResult<String> {
        let text = text.replace(" 。", ".");

        let prefix = CONDITION_PREFIX_RE
            .find(&text)
            .map_or("", |m| m.as_str())
            .to_string();
        let rest = &text[prefix.len()..];
        let suffix = CONDITION_SUFFIX_RE
            .find(rest)
            .map_or("", |m| m.as_str())
            .to_string();
        let body = &rest[..rest.len() - suffix.len()];
        if !has_source_text(body) {
            return Ok(text);
        }

        // the last dialogue line tells the model what the choice answers
        let note = notes::choice(state.history.last());
        let translated = self.translate(state, body, History::note(note), false).await?;
        let translated = capitalize_first(&strip_all(&translated, &[".", "\"", "\\n"]));
        Ok(format!("{prefix}{translated}{suffix}"))
    }
}
