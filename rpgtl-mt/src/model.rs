//! Language model provider trait and chat types
//!
//! Translation goes through one call shape: a chat-style completion that
//! takes an ordered list of role-tagged messages and returns a single
//! completion string plus token usage. Anything that offers that shape
//! can back the pipeline by implementing [`LanguageModel`]; the crate
//! ships an HTTP provider for OpenAI-compatible endpoints and a
//! deterministic mock for tests.
//!
//! # Example
//!
//! ```ignore
//! use rpgtl_mt::{ChatMessage, ChatRequest, LanguageModel, OpenAiProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OpenAiProvider::from_env()?;
//!     let request = ChatRequest::new(vec![
//!         ChatMessage::system("Translate to English."),
//!         ChatMessage::user("こんにちは"),
//!     ]);
//!     let completion = provider.complete(&request).await?;
//!     println!("{} ({} tokens in)", completion.text, completion.usage.input);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MtResult;
use crate::tokens::TokenUsage;

/// Sampling temperature used for every request
pub const TEMPERATURE: f32 = 0.1;
/// Frequency and presence penalty used for every request
pub const PENALTY: f32 = 0.1;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Assistant,
    User,
}

/// One message in a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A full chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl ChatRequest {
    /// Request with the pipeline's low-drift sampling settings
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: TEMPERATURE,
            frequency_penalty: PENALTY,
            presence_penalty: PENALTY,
        }
    }

    /// Content of the last user message, the text being translated
    pub fn user_payload(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// A model's answer to a [`ChatRequest`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Trait for chat completion providers
///
/// Implementations are shared across page workers, so they must be
/// `Send + Sync` and must not keep per-request state.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one chat request and return the first completion
    ///
    /// Transport problems map to `MtError::Network`, non-success statuses
    /// to `MtError::Api` and unusable bodies to `MtError::MalformedResponse`.
    /// Retrying is the caller's job.
    async fn complete(&self, request: &ChatRequest) -> MtResult<Completion>;

    /// Name used in logs
    fn provider_name(&self) -> &str;
}
