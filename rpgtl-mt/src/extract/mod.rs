//! Span Extractor / Reinserter
//!
//! Walks one [`Page`] record by record. Every enabled command kind has a
//! handler in one of the submodules:
//!
//! | Module     | Codes               | Strategy                        |
//! |------------|---------------------|---------------------------------|
//! | `dialogue` | 401, 405            | grouped, batched at page end    |
//! | `choice`   | 102                 | inline, one call per choice     |
//! | `variable` | 111, 122            | inline, quoted literals         |
//! | `name`     | 101, 320            | inline, speaker table first     |
//! | `script`   | 108, 355, 655, 408  | inline                          |
//! | `plugin`   | 356, 357, 657       | inline, 356 merges continuations|
//!
//! Dialogue groups are not translated where they are found. Their text is
//! collected into one list and sent as a single batch after the walk, so
//! the model sees neighbouring lines together. If the batch comes back
//! with a different number of items, every dialogue group of the page
//! keeps its source text and the outcome reports the mismatch; the inline
//! translations of the page are still kept.
//!
//! Any error raised while handling a record is wrapped with that record's
//! code and text and aborts the page.

mod choice;
mod dialogue;
mod name;
mod plugin;
mod script;
mod variable;

use std::sync::Arc;

use regex::Regex;
use rpgtl::event::codes;
use rpgtl::{Command, ContextWindow, Page, Record, TranslationConfig};
use serde_json::Value;
use tracing::{debug, warn};

use crate::batch::BatchTranslator;
use crate::error::MtResult;
use crate::progress::ProgressSink;
use crate::prompt::History;
use crate::tokens::TokenUsage;

use dialogue::DialogueSpan;

/// Dialogue batch came back with the wrong number of items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: usize,
    pub received: usize,
}

/// Everything a page walk produces besides the page itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOutcome {
    pub usage: TokenUsage,
    pub mismatch: Option<Mismatch>,
}

/// One output slot of the walk
enum Step {
    /// Final record, already translated or left alone
    Keep(Record),
    /// Records waiting for their batch item
    Dialogue(DialogueSpan),
}

/// State owned by one page walk
struct PageState {
    history: ContextWindow,
    usage: TokenUsage,
    steps: Vec<Step>,
    /// Batch items, indexed by `DialogueSpan::slot`
    docs: Vec<String>,
}

impl PageState {
    fn new(max_history: usize) -> Self {
        Self {
            history: ContextWindow::new(max_history),
            usage: TokenUsage::default(),
            steps: Vec::new(),
            docs: Vec::new(),
        }
    }

    fn keep(&mut self, record: Record) {
        self.steps.push(Step::Keep(record));
    }
}

/// Translates pages through a shared [`BatchTranslator`]
#[derive(Clone)]
pub struct PageExtractor {
    translator: Arc<BatchTranslator>,
}

impl PageExtractor {
    pub fn new(translator: Arc<BatchTranslator>) -> Self {
        Self { translator }
    }

    pub fn translator(&self) -> &BatchTranslator {
        &self.translator
    }

    fn config(&self) -> &TranslationConfig {
        self.translator.config()
    }

    fn language(&self) -> &str {
        &self.config().language
    }

    /// Translate every enabled record of `page`.
    ///
    /// `progress` is advanced once per source record consumed.
    pub async fn translate_page(
        &self,
        page: Page,
        progress: &dyn ProgressSink,
    ) -> MtResult<(Page, PageOutcome)> {
        let records = page.records;
        let mut state = PageState::new(self.config().max_history);

        let mut at = 0;
        while at < records.len() {
            let record = &records[at];
            let consumed = self
                .visit(&records, at, &mut state)
                .await
                .map_err(|err| err.in_record(record.code, record_text(record)))?;
            progress.advance(consumed as u64);
            at += consumed;
        }

        let PageState {
            mut history,
            mut usage,
            steps,
            docs,
        } = state;

        let mut mismatch = None;
        let translations = if docs.is_empty() {
            Vec::new()
        } else {
            let batch = self.translator.translate_list(&docs, &mut history).await?;
            usage += batch.usage;
            if batch.lines.len() != docs.len() {
                warn!(
                    expected = docs.len(),
                    received = batch.lines.len(),
                    "dialogue batch length mismatch, keeping source text"
                );
                mismatch = Some(Mismatch {
                    expected: docs.len(),
                    received: batch.lines.len(),
                });
            }
            batch.lines
        };

        let config = self.config();
        let mut out = Vec::with_capacity(records.len());
        for step in steps {
            match step {
                Step::Keep(record) => out.push(record),
                Step::Dialogue(span) => match translations.get(span.slot) {
                    Some(text) if mismatch.is_none() => span.reinsert(text, config, &mut out),
                    _ => out.extend(span.into_records()),
                },
            }
        }

        Ok((Page::new(out), PageOutcome { usage, mismatch }))
    }

    fn enabled(&self, code: i64) -> bool {
        let flags = &self.config().codes;
        match code {
            codes::SHOW_TEXT => flags.show_text,
            codes::SCROLL_TEXT => flags.scroll_text,
            codes::SHOW_CHOICES => flags.choices,
            codes::CONTROL_VARIABLES => flags.variables,
            codes::TEXT_HEADER => flags.name_box,
            codes::SCRIPT | codes::SCRIPT_MORE => flags.script,
            codes::PLUGIN_COMMAND => flags.plugin_command,
            codes::PLUGIN_COMMAND_MZ => flags.picture_text,
            codes::PLUGIN_COMMAND_MZ_MORE => flags.picture_text_mz,
            codes::CHANGE_NAME => flags.change_name,
            codes::CONDITIONAL_BRANCH => flags.conditional_script,
            codes::COMMENT => flags.comment,
            codes::COMMENT_MORE => flags.comment_more,
            _ => false,
        }
    }

    /// Handle the record at `at`; returns how many records it consumed
    async fn visit(&self, records: &[Record], at: usize, state: &mut PageState) -> MtResult<usize> {
        let record = &records[at];
        if !self.enabled(record.code) {
            state.keep(record.clone());
            return Ok(1);
        }

        let translated = match record.command()? {
            Command::ShowText { .. } | Command::ScrollText { .. } => {
                return self.dialogue(records, at, state).await;
            }
            Command::PluginCommand { line } => {
                return self.plugin_command(records, at, &line, state).await;
            }
            Command::TextHeader { name } => self.name_box(record, name, state).await?,
            Command::ShowChoices { choices } => self.choices(record, choices, state).await?,
            Command::Comment { line } => self.name_pop_comment(record, &line, state).await?,
            Command::CommentMore { line } => self.comment_more(record, &line, state).await?,
            Command::ConditionalBranch { strings } => {
                self.conditional_script(record, strings, state).await?
            }
            Command::ControlVariables { variable, operand } => {
                self.control_variable(record, variable, operand, state)
                    .await?
            }
            Command::ChangeName { name } => self.change_name(record, name, state).await?,
            Command::Script { line } => self.log_window(record, &line, state).await?,
            Command::PluginCommandMz { message } => {
                self.picture_text(record, message, state).await?
            }
            Command::PluginCommandMzMore { line } => {
                self.picture_text_more(record, &line, state).await?
            }
            Command::Other => record.clone(),
        };
        state.keep(translated);
        Ok(1)
    }

    /// Translate one string and account for its usage
    async fn translate(
        &self,
        state: &mut PageState,
        text: &str,
        history: History,
        full_prompt: bool,
    ) -> MtResult<String> {
        let translation = self
            .translator
            .translate_text(text, history, full_prompt)
            .await?;
        debug!(source = text, target = %translation.text, "translated");
        state.usage += translation.usage;
        Ok(translation.text)
    }
}

/// Text shown in error context for a record
fn record_text(record: &Record) -> String {
    record
        .parameters
        .iter()
        .find_map(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Value::Array(record.parameters.clone()).to_string())
}

/// Split `text` into a leading run matched by `lead`, the core, and a
/// trailing run matched by `trail`
fn split_affixes<'a>(text: &'a str, lead: &Regex, trail: &Regex) -> (&'a str, &'a str, &'a str) {
    let start = lead.find(text).map_or(0, |m| m.end());
    let rest = &text[start..];
    let end = trail.find(rest).map_or(rest.len(), |m| m.start());
    (&text[..start], &rest[..end], &rest[end..])
}

/// Replace the byte range `start..end` of `line` with `with`
fn splice(line: &str, start: usize, end: usize, with: &str) -> String {
    format!("{}{}{}", &line[..start], with, &line[end..])
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use rpgtl::TranslationConfig;

    use super::PageExtractor;
    use crate::batch::BatchTranslator;
    use crate::mock::MockModel;
    use crate::retry::RetryPolicy;

    pub(crate) fn extractor(model: Arc<MockModel>, config: TranslationConfig) -> PageExtractor {
        let translator = BatchTranslator::new(model, Arc::new(config))
            .unwrap()
            .with_retry(RetryPolicy::immediate(1));
        PageExtractor::new(Arc::new(translator))
    }
}
