//! Language-model translation for RPG Maker game data
//!
//! This crate walks RPG Maker JSON files, pulls out the natural-language
//! text, sends it to a chat-completions model in numbered batches with a
//! rolling history of earlier lines, and writes the translations back
//! without disturbing control codes.
//!
//! # Workflow Example
//!
//! ```ignore
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use rpgtl::TranslationConfig;
//! use rpgtl_mt::{BatchTranslator, OpenAiProvider, Runner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. Settings and provider
//!     let config = Arc::new(TranslationConfig::load(Path::new("rpgtl.toml"))?);
//!     let provider = Arc::new(OpenAiProvider::from_env()?);
//!
//!     // 2. One translator shared by every page worker
//!     let translator = Arc::new(BatchTranslator::new(provider, config)?);
//!
//!     // 3. Translate a file into the output directory
//!     let outcome = Runner::new(translator)
//!         .translate_file(Path::new("data/Map001.json"), Path::new("translated"))
//!         .await;
//!     println!("{} tokens in", outcome.usage.input);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod error;
pub mod extract;
pub mod files;
pub mod io;
pub mod mock;
pub mod model;
pub mod openai;
pub mod progress;
pub mod prompt;
pub mod report;
pub mod retry;
pub mod runner;
pub mod tokens;


// Re-export main types for convenient access
pub use batch::{BatchTranslator, ListTranslation, TextTranslation};
pub use error::{MtError, MtResult};
pub use extract::{Mismatch, PageExtractor, PageOutcome};
pub use files::FileKind;
pub use files::database::DatabaseTranslator;
pub use mock::{MockMode, MockModel};
pub use model::{ChatMessage, ChatRequest, Completion, LanguageModel, Role};
pub use openai::{OpenAiProvider, ProviderConfig};
pub use progress::{NoProgress, ProgressSink, TerminalProgress};
pub use prompt::{History, PromptBuilder};
pub use report::{RunSummary, file_line};
pub use retry::RetryPolicy;
pub use runner::{FileOutcome, Runner, TreeOutcome};
pub use tokens::TokenUsage;
