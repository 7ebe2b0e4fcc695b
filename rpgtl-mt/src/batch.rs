//! Batch translator
//!
//! Sends text to a [`LanguageModel`] either as one string or as a list of
//! items. A list is cut into chunks of `batch_size`; each chunk becomes one
//! request whose payload has one tagged line per item:
//!
//! ```text
//! `<Line0>レナ: こんにちは</Line0>`
//! `<Line1>元気？</Line1>`
//! ```
//!
//! Control codes are masked before sending and restored afterwards, and
//! the reply is split back into items by their tags. A reply that loses
//! a tag yields fewer items than were sent; the caller compares lengths
//! to detect the mismatch.
//!
//! A chunk whose masked payload holds no source-script characters is
//! never sent: its items come back unchanged at zero cost. In estimate
//! mode nothing is sent either, and the items come back unchanged with
//! locally estimated token counts.
//!
//! The whole operation is retried by the configured [`RetryPolicy`].

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use rpgtl::normalize::{EMPTY_ITEM_SENTINEL, clean_response};
use rpgtl::{ContextWindow, TranslationConfig, mask, needs_translation, unmask};
use tracing::debug;

use crate::error::MtResult;
use crate::model::LanguageModel;
use crate::prompt::{History, PromptBuilder};
use crate::retry::RetryPolicy;
use crate::tokens::{TokenUsage, estimate_request};

static TAGGED_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"`?<Line(\d+)>(.*?)</?Line\d+>`?").expect("tagged item regex")
});

/// Translated items of a list, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTranslation {
    pub lines: Vec<String>,
    pub usage: TokenUsage,
}

/// A translated single string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextTranslation {
    pub text: String,
    pub usage: TokenUsage,
}

/// Wrap items in positional tags, one per line
pub fn wrap_items(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let text = if item.trim().is_empty() {
                EMPTY_ITEM_SENTINEL
            } else {
                item.as_str()
            };
            format!("`<Line{i}>{text}</Line{i}>`")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull the text out of every tagged line; untagged lines are dropped
pub fn extract_items<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    lines
        .into_iter()
        .filter_map(|line| TAGGED_ITEM_RE.captures(line).map(|caps| caps[2].to_string()))
        .collect()
}

/// The text of the first tagged line, or the whole text if nothing is tagged
pub fn extract_single(text: &str) -> String {
    TAGGED_ITEM_RE
        .captures(text)
        .map(|caps| caps[2].to_string())
        .unwrap_or_else(|| text.to_string())
}

/// Clean a raw reply and split it into non-empty lines.
///
/// Placeholders are still masked here; items are unmasked after they are
/// cut out of their tags.
fn reply_lines(raw: &str, language: &str) -> Vec<String> {
    clean_response(raw, language)
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Translates strings and lists of strings through a [`LanguageModel`]
pub struct BatchTranslator {
    model: Arc<dyn LanguageModel>,
    config: Arc<TranslationConfig>,
    prompts: PromptBuilder,
    retry: RetryPolicy,
}

impl BatchTranslator {
    pub fn new(model: Arc<dyn LanguageModel>, config: Arc<TranslationConfig>) -> MtResult<Self> {
        let prompts = PromptBuilder::new(&config)?;
        Ok(Self {
            model,
            config,
            prompts,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.model.provider_name()
    }

    /// Translate a list of items with the full prompt.
    ///
    /// `history` supplies the assistant turns for the first chunk and is
    /// replaced by the tail of each chunk's translations as chunks complete.
    /// The result may be shorter than `items` if the model dropped tags.
    pub async fn translate_list(
        &self,
        items: &[String],
        history: &mut ContextWindow,
    ) -> MtResult<ListTranslation> {
        let start = history.clone();
        let this = self;
        let (translation, window) = self
            .retry
            .run("batch translation", move || {
                let window = start.clone();
                async move { this.list_once(items, window).await }
            })
            .await?;
        *history = window;
        Ok(translation)
    }

    async fn list_once(
        &self,
        items: &[String],
        mut window: ContextWindow,
    ) -> MtResult<(ListTranslation, ContextWindow)> {
        let mut result = ListTranslation::default();

        for chunk in items.chunks(self.config.batch_size.max(1)) {
            let masked = mask(&wrap_items(chunk));
            if !needs_translation(&masked.text) {
                debug!(items = chunk.len(), "no source text in chunk, skipping request");
                result.lines.extend(chunk.iter().cloned());
                continue;
            }

            let request = self
                .prompts
                .build(&masked.text, &History::Turns(window.window()), true);

            if self.config.estimate {
                result.usage += estimate_request(&request);
                result.lines.extend(chunk.iter().cloned());
                continue;
            }

            let completion = self.model.complete(&request).await?;
            result.usage += completion.usage;

            let lines = reply_lines(&completion.text, &self.config.language);
            let extracted: Vec<String> = extract_items(lines.iter().map(String::as_str))
                .iter()
                .map(|item| unmask(item, &masked.map))
                .collect();
            if extracted.len() != chunk.len() {
                debug!(
                    sent = chunk.len(),
                    received = extracted.len(),
                    "chunk came back with a different number of lines"
                );
            }
            window.replace_with(extracted.iter().cloned());
            result.lines.extend(extracted);
        }

        Ok((result, window))
    }

    /// Translate a single string.
    ///
    /// `full_prompt` selects the full persona prompt instead of the short one.
    pub async fn translate_text(
        &self,
        text: &str,
        history: History,
        full_prompt: bool,
    ) -> MtResult<TextTranslation> {
        let this = self;
        let history = &history;
        self.retry
            .run("translation", move || async move {
                this.text_once(text, history, full_prompt).await
            })
            .await
    }

    async fn text_once(
        &self,
        text: &str,
        history: &History,
        full_prompt: bool,
    ) -> MtResult<TextTranslation> {
        let masked = mask(text);
        if !needs_translation(&masked.text) {
            return Ok(TextTranslation {
                text: text.to_string(),
                usage: TokenUsage::default(),
            });
        }

        let request = self.prompts.build(&masked.text, history, full_prompt);
        if self.config.estimate {
            return Ok(TextTranslation {
                text: text.to_string(),
                usage: estimate_request(&request),
            });
        }

        let completion = self.model.complete(&request).await?;
        let lines = reply_lines(&completion.text, &self.config.language);
        Ok(TextTranslation {
            text: unmask(&extract_single(&lines.join("\n")), &masked.map),
            usage: completion.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MtError;
    use crate::mock::{MockMode, MockModel};
    use crate::model::Role;
    use std::collections::HashMap;

    fn translator(model: Arc<MockModel>, config: TranslationConfig) -> BatchTranslator {
        BatchTranslator::new(model, Arc::new(config))
            .unwrap()
            .with_retry(RetryPolicy::immediate(5))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // ========== Tag Format Tests ==========

    #[test]
    fn test_wrap_items() {
        assert_eq!(
            wrap_items(&strings(&["あ", "", "い"])),
            "`<Line0>あ</Line0>`\n`<Line1>Placeholder Text</Line1>`\n`<Line2>い</Line2>`"
        );
    }

    #[test]
    fn test_extract_items_drops_untagged() {
        let lines = ["`<Line0>Hello</Line0>`", "stray commentary", "<Line1>Bye</Line1>"];
        assert_eq!(extract_items(lines), vec!["Hello", "Bye"]);
    }

    #[test]
    fn test_extract_items_keeps_leading_escapes() {
        let lines = ["`<Line0>\\Gが足りない</Line0>`", "`<Line1>\\$所持金</Line1>`"];
        assert_eq!(extract_items(lines), vec!["\\Gが足りない", "\\$所持金"]);
    }

    #[test]
    fn test_extract_single() {
        assert_eq!(extract_single("`<Line0>Hi</Line0>`"), "Hi");
        assert_eq!(extract_single("Hi there"), "Hi there");
    }

    // ========== List Translation Tests ==========

    #[tokio::test]
    async fn test_echo_preserves_count_and_order() {
        let model = Arc::new(MockModel::new(MockMode::Echo));
        let bt = translator(model.clone(), TranslationConfig::default());
        let items = strings(&["一つ", "二つ", "三つ", "四つ"]);
        let mut history = ContextWindow::new(10);

        let out = bt.translate_list(&items, &mut history).await.unwrap();
        assert_eq!(out.lines, items);
        assert_eq!(model.calls(), 1);
        assert_eq!(history.window(), items);
    }

    #[tokio::test]
    async fn test_echo_keeps_bare_escape_codes() {
        let model = Arc::new(MockModel::new(MockMode::Echo));
        let bt = translator(model, TranslationConfig::default());
        let items = strings(&["\\Gが足りない", "\\$所持金"]);
        let mut history = ContextWindow::new(10);

        let out = bt.translate_list(&items, &mut history).await.unwrap();
        assert_eq!(out.lines, items);
    }

    #[tokio::test]
    async fn test_chunks_by_batch_size() {
        let model = Arc::new(MockModel::new(MockMode::Suffix("!".into())));
        let config = TranslationConfig {
            batch_size: 2,
            ..TranslationConfig::default()
        };
        let bt = translator(model.clone(), config);
        let items = strings(&["あ", "い", "う", "え", "お"]);
        let mut history = ContextWindow::new(10);

        let out = bt.translate_list(&items, &mut history).await.unwrap();
        assert_eq!(out.lines, strings(&["あ !", "い !", "う !", "え !", "お !"]));
        assert_eq!(model.calls(), 3);

        // the second request carries the first chunk's lines as history
        let second = &model.requests()[1];
        let turns: Vec<&str> = second
            .messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(turns, vec!["あ !", "い !"]);
    }

    #[tokio::test]
    async fn test_control_codes_survive() {
        let model = Arc::new(MockModel::with_mappings([(
            "{Color_0}勇者{Color_1}が来た",
            "{Color_0}The hero{Color_1} arrived",
        )]));
        let bt = translator(model.clone(), TranslationConfig::default());
        let items = strings(&["\\C[2]勇者\\C[0]が来た"]);

        let out = bt
            .translate_list(&items, &mut ContextWindow::new(10))
            .await
            .unwrap();
        assert_eq!(out.lines, strings(&["\\C[2]The hero\\C[0] arrived"]));
        assert!(!model.requests()[0].user_payload().contains("\\C[2]"));
    }

    #[tokio::test]
    async fn test_dropped_tag_shortens_result() {
        let model = Arc::new(MockModel::new(MockMode::DropLastLine(HashMap::new())));
        let bt = translator(model, TranslationConfig::default());
        let items = strings(&["あ", "い", "う"]);

        let out = bt
            .translate_list(&items, &mut ContextWindow::new(10))
            .await
            .unwrap();
        assert_eq!(out.lines.len(), 2);
    }

    #[tokio::test]
    async fn test_chunk_without_source_text_is_not_sent() {
        let model = Arc::new(MockModel::new(MockMode::Echo));
        let bt = translator(model.clone(), TranslationConfig::default());
        let items = strings(&["Already English", "\\C[2]...!"]);

        let out = bt
            .translate_list(&items, &mut ContextWindow::new(10))
            .await
            .unwrap();
        assert_eq!(out.lines, items);
        assert!(out.usage.is_zero());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_estimate_mode_makes_no_calls() {
        let model = Arc::new(MockModel::new(MockMode::Echo));
        let config = TranslationConfig {
            estimate: true,
            ..TranslationConfig::default()
        };
        let bt = translator(model.clone(), config);
        let items = strings(&["こんにちは"]);

        let out = bt
            .translate_list(&items, &mut ContextWindow::new(10))
            .await
            .unwrap();
        assert_eq!(out.lines, items);
        assert!(out.usage.input > 0);
        assert!(out.usage.output > 0);
        assert_eq!(model.calls(), 0);
    }

    // ========== Retry Tests ==========

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let model = Arc::new(MockModel::new(MockMode::FailTimes(2)));
        let bt = translator(model.clone(), TranslationConfig::default());
        let out = bt
            .translate_text("こんにちは", History::none(), false)
            .await
            .unwrap();
        assert_eq!(out.text, "こんにちは");
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let model = Arc::new(MockModel::new(MockMode::Error(503)));
        let bt = translator(model.clone(), TranslationConfig::default());
        let err = bt
            .translate_text("こんにちは", History::none(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, MtError::Api { status: 503, .. }));
        assert_eq!(model.calls(), 5);
    }

    // ========== Single Text Tests ==========

    #[tokio::test]
    async fn test_translate_text_cleans_reply() {
        let model = Arc::new(MockModel::with_mappings([("レナ", "Translation: Rena")]));
        let bt = translator(model.clone(), TranslationConfig::default());
        let out = bt
            .translate_text("レナ", History::note("Reply with the name."), false)
            .await
            .unwrap();
        assert_eq!(out.text, "Rena");
        assert_eq!(model.requests()[0].messages[2].content, "Reply with the name.");
    }

    #[tokio::test]
    async fn test_translate_text_skips_target_language() {
        let model = Arc::new(MockModel::new(MockMode::Echo));
        let bt = translator(model.clone(), TranslationConfig::default());
        let out = bt
            .translate_text("Hello \\V[1]", History::none(), false)
            .await
            .unwrap();
        assert_eq!(out.text, "Hello \\V[1]");
        assert!(out.usage.is_zero());
        assert_eq!(model.calls(), 0);
    }
}
