//! Mock language model for testing
//!
//! This module provides a deterministic, network-free [`LanguageModel`]
//! for exercising the pipeline: batching, placeholder round-trips,
//! mismatch handling and retries.
//!
//! Modes that "translate" work line by line on the user payload. A line
//! wrapped in a `<LineN>` tag keeps its tag and only the text inside is
//! rewritten, which mirrors what a well-behaved model returns.
//!
//! # Example
//!
//! ```ignore
//! use rpgtl_mt::{MockMode, MockModel};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockModel::new(MockMode::Mappings(
//!         [("こんにちは".to_string(), "Hello".to_string())].into(),
//!     ));
//!     // ...
//! }
//! ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{MtError, MtResult};
use crate::model::{ChatRequest, Completion, LanguageModel};
use crate::tokens::{TokenUsage, estimate_tokens};

static TAGGED_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^`?<Line(\d+)>(.*?)</Line\d+>`?$").expect("tagged line regex"));

/// Mock behaviours for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Return the payload unchanged
    Echo,

    /// Replace known texts, echo unknown ones
    Mappings(HashMap<String, String>),

    /// Like `Mappings`, but the last tagged line is missing from the reply
    DropLastLine(HashMap<String, String>),

    /// Append a suffix to every line's text: "こんにちは" -> "こんにちは [en]"
    Suffix(String),

    /// Always fail with an API error of this status
    Error(u16),

    /// Fail with a network error `n` times, then echo
    FailTimes(usize),
}

/// Mock model recording every request it receives
#[derive(Debug)]
pub struct MockModel {
    mode: MockMode,
    /// Optional simulated latency
    delay_ms: u64,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockModel {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay_ms: 0,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Mock with a fixed lookup table
    pub fn with_mappings<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(MockMode::Mappings(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new(mode)
        }
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every request received, oldest first
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn reply(&self, payload: &str, call: usize) -> MtResult<String> {
        match &self.mode {
            MockMode::Echo => Ok(payload.to_string()),
            MockMode::Mappings(map) => Ok(map_lines(payload, |text| lookup(map, text))),
            MockMode::DropLastLine(map) => {
                let mut lines: Vec<String> = map_lines(payload, |text| lookup(map, text))
                    .lines()
                    .map(str::to_string)
                    .collect();
                if let Some(pos) = lines.iter().rposition(|l| TAGGED_LINE_RE.is_match(l)) {
                    lines.remove(pos);
                }
                Ok(lines.join("\n"))
            }
            MockMode::Suffix(suffix) => Ok(map_lines(payload, |text| format!("{text} {suffix}"))),
            MockMode::Error(status) => Err(MtError::Api {
                status: *status,
                body: "mock failure".to_string(),
            }),
            MockMode::FailTimes(n) if call < *n => {
                Err(MtError::Network("mock connection reset".to_string()))
            }
            MockMode::FailTimes(_) => Ok(payload.to_string()),
        }
    }
}

fn lookup(map: &HashMap<String, String>, text: &str) -> String {
    map.get(text).cloned().unwrap_or_else(|| text.to_string())
}

/// Rewrite the text of every line, keeping `<LineN>` wrappers in place
fn map_lines(payload: &str, mut f: impl FnMut(&str) -> String) -> String {
    payload
        .lines()
        .map(|line| {
            if TAGGED_LINE_RE.is_match(line) {
                TAGGED_LINE_RE
                    .replace(line, |caps: &Captures<'_>| {
                        format!("`<Line{0}>{1}</Line{0}>`", &caps[1], f(&caps[2]))
                    })
                    .into_owned()
            } else {
                f(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, request: &ChatRequest) -> MtResult<Completion> {
        self.apply_delay().await;

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let text = self.reply(request.user_payload(), call)?;
        let input = request
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum();
        let usage = TokenUsage::new(input, estimate_tokens(&text));
        Ok(Completion { text, usage })
    }

    fn provider_name(&self) -> &str {
        "Mock Model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatMessage;

    fn request(payload: &str) -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::system("s"), ChatMessage::user(payload)])
    }

    // ========== Echo / Mapping Tests ==========

    #[tokio::test]
    async fn test_echo() {
        let mock = MockModel::new(MockMode::Echo);
        let completion = mock.complete(&request("`<Line0>あ</Line0>`")).await.unwrap();
        assert_eq!(completion.text, "`<Line0>あ</Line0>`");
        assert_eq!(mock.calls(), 1);
        assert!(completion.usage.input > 0);
    }

    #[tokio::test]
    async fn test_mappings_keep_tags() {
        let mock = MockModel::with_mappings([("こんにちは", "Hello"), ("元気？", "How are you?")]);
        let completion = mock
            .complete(&request("`<Line0>こんにちは</Line0>`\n`<Line1>元気？</Line1>`"))
            .await
            .unwrap();
        assert_eq!(
            completion.text,
            "`<Line0>Hello</Line0>`\n`<Line1>How are you?</Line1>`"
        );

        let single = mock.complete(&request("こんにちは")).await.unwrap();
        assert_eq!(single.text, "Hello");
    }

    #[tokio::test]
    async fn test_drop_last_line() {
        let mock = MockModel::new(MockMode::DropLastLine(HashMap::new()));
        let completion = mock
            .complete(&request("`<Line0>a</Line0>`\n`<Line1>b</Line1>`"))
            .await
            .unwrap();
        assert_eq!(completion.text, "`<Line0>a</Line0>`");
    }

    #[tokio::test]
    async fn test_suffix() {
        let mock = MockModel::new(MockMode::Suffix("[en]".into()));
        let completion = mock.complete(&request("`<Line3>はい</Line3>`")).await.unwrap();
        assert_eq!(completion.text, "`<Line3>はい [en]</Line3>`");
    }

    // ========== Failure Tests ==========

    #[tokio::test]
    async fn test_error_mode() {
        let mock = MockModel::new(MockMode::Error(500));
        let err = mock.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, MtError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_fail_times_then_echo() {
        let mock = MockModel::new(MockMode::FailTimes(2));
        assert!(mock.complete(&request("x")).await.is_err());
        assert!(mock.complete(&request("x")).await.is_err());
        assert_eq!(mock.complete(&request("x")).await.unwrap().text, "x");
        assert_eq!(mock.requests().len(), 3);
    }
}
