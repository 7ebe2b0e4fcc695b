//! Chat-completions provider for OpenAI-compatible endpoints
//!
//! Talks to any server implementing `POST {base_url}/chat/completions`
//! (OpenAI itself, Azure-style proxies, local inference servers).
//!
//! # Authentication
//!
//! The API key is read from the `OPENAI_API_KEY` environment variable.
//! `OPENAI_BASE_URL`, `OPENAI_MODEL` and `OPENAI_ORGANIZATION` override
//! the endpoint, the model and the organization header.
//!
//! # Example
//!
//! ```ignore
//! use rpgtl_mt::{ChatMessage, ChatRequest, LanguageModel, OpenAiProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OpenAiProvider::from_env()?;
//!     let completion = provider
//!         .complete(&ChatRequest::new(vec![ChatMessage::user("元気？")]))
//!         .await?;
//!     println!("{}", completion.text);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{MtError, MtResult};
use crate::model::{ChatRequest, Completion, LanguageModel};
use crate::tokens::TokenUsage;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Endpoint settings for [`OpenAiProvider`]
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub organization: Option<String>,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            organization: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Build from `OPENAI_*` environment variables
    pub fn from_env() -> MtResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            MtError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        let mut config = Self::new(api_key);
        if let Some(base_url) = non_empty_var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(model) = non_empty_var("OPENAI_MODEL") {
            config.model = model;
        }
        config.organization = non_empty_var("OPENAI_ORGANIZATION");
        Ok(config)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("organization", &self.organization)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Chat-completions provider over HTTP
#[derive(Clone)]
pub struct OpenAiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> MtResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(MtError::Config("API key cannot be empty".to_string()));
        }
        if config.timeout_secs == 0 {
            return Err(MtError::Config("timeout must be greater than zero".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MtError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn from_env() -> MtResult<Self> {
        Self::new(ProviderConfig::from_env()?)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "frequency_penalty": request.frequency_penalty,
            "presence_penalty": request.presence_penalty,
        })
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("config", &self.config)
            .finish()
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Turn a parsed response body into a [`Completion`]
fn into_completion(response: ChatResponse) -> MtResult<Completion> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| MtError::MalformedResponse("response has no completion text".to_string()))?;
    let usage = response
        .usage
        .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();
    Ok(Completion { text, usage })
}

#[async_trait]
impl LanguageModel for OpenAiProvider {
    async fn complete(&self, request: &ChatRequest) -> MtResult<Completion> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(request));
        if let Some(org) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MtError::Api {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let text = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| MtError::MalformedResponse(format!("Failed to parse API response: {}", e)))?;
        into_completion(parsed)
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatMessage;

    // ========== Initialization Tests ==========

    #[test]
    fn test_new_with_valid_key() {
        let provider = OpenAiProvider::new(ProviderConfig::new("sk-test")).unwrap();
        assert_eq!(provider.provider_name(), "OpenAI");
        assert_eq!(provider.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_new_with_empty_key() {
        match OpenAiProvider::new(ProviderConfig::new("  ")) {
            Err(MtError::Config(msg)) => assert!(msg.contains("empty")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_masks_key() {
        let provider = OpenAiProvider::new(ProviderConfig::new("sk-secret")).unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    // ========== Request / Response Tests ==========

    #[test]
    fn test_endpoint_and_body() {
        let mut config = ProviderConfig::new("sk-test");
        config.base_url = "http://localhost:8080/v1/".to_string();
        config.model = "local-model".to_string();
        let provider = OpenAiProvider::new(config).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");

        let request = ChatRequest::new(vec![
            ChatMessage::system("persona"),
            ChatMessage::user("こんにちは"),
        ]);
        let body = provider.request_body(&request);
        assert_eq!(body["model"], "local-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "こんにちは");
        assert!(body["temperature"].as_f64().unwrap() < 0.2);
    }

    #[test]
    fn test_parse_completion() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}],
                "usage":{"prompt_tokens":12,"completion_tokens":3,"total_tokens":15}}"#,
        )
        .unwrap();
        let completion = into_completion(parsed).unwrap();
        assert_eq!(completion.text, "Hello");
        assert_eq!(completion.usage, TokenUsage::new(12, 3));
    }

    #[test]
    fn test_parse_empty_choices_is_malformed() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            into_completion(parsed),
            Err(MtError::MalformedResponse(_))
        ));
    }

    // ========== Live API Tests ==========

    #[tokio::test]
    #[ignore]
    async fn test_live_completion() {
        let provider = OpenAiProvider::from_env().unwrap();
        let request = ChatRequest::new(vec![ChatMessage::user(
            "Reply with only the English translation: こんにちは",
        )]);
        let completion = provider.complete(&request).await.unwrap();
        assert!(!completion.text.is_empty());
        assert!(completion.usage.input > 0);
    }
}
