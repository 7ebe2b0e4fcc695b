//! Core text handling for translating RPG Maker event data.
//!
//! This crate holds everything that does not need a network: the
//! control-code [`placeholder`] codec, the rolling [`history`] window,
//! source-script detection, punctuation clean-up, line wrapping, the
//! [`event`] record model and the shared [`config`]. The batching,
//! extraction and I/O machinery lives in `rpgtl-mt`.

pub mod config;
pub mod error;
pub mod event;
pub mod history;
pub mod normalize;
pub mod placeholder;
pub mod script;
pub mod wrap;

pub use config::{CodeFlags, LineBreak, Pricing, TranslationConfig, VariableRules};
pub use error::{ConfigError, EventError};
pub use event::{Command, Page, Record, RecordSchema};
pub use history::{ContextWindow, MAX_HISTORY};
pub use placeholder::{Masked, PlaceholderCategory, PlaceholderMap, mask, unmask};
pub use script::{has_source_text, needs_translation};
