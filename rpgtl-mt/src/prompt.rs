//! Request assembly
//!
//! Every request has the same layout:
//!
//! 1. a system message: persona prompt followed by the character block
//! 2. a second system message holding only the character block
//! 3. history, either one assistant turn per recent line or a single
//!    assistant note describing what kind of text this is
//! 4. the user payload
//!
//! Two persona prompts exist. The short one is generated from the
//! configured language and glossary and asks for a `Translation:` reply.
//! The full one is used for tagged dialogue batches; it is read from
//! `prompt_file` when configured, otherwise a built-in template is used.

use std::fs;

use rpgtl::TranslationConfig;

use crate::error::{MtError, MtResult};
use crate::model::{ChatMessage, ChatRequest};

/// Built-in full prompt. `{language}` is replaced with the target language.
const DEFAULT_FULL_PROMPT: &str = "\
You are an expert game translator who translates Japanese text to {language}.
You will be given lines of dialogue from a videogame, each wrapped in a numbered tag such as `<Line0>text</Line0>`.
Translate every line to {language} and keep each translation inside the same tag it came in.
Return exactly one tagged line for every tagged line you received, in the same order.
Keep placeholders such as {Color_0} or {Name_1} exactly as they are.
If a line starts with a speaker name followed by a colon, keep the speaker name and colon in front of the translation.
Output ONLY the tagged {language} translations.
";

/// Conversation context sent before the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum History {
    /// Recent lines, one assistant turn each
    Turns(Vec<String>),
    /// One assistant note, e.g. "Reply with only the English translation of the NPC name."
    Note(String),
}

impl History {
    pub fn note(text: impl Into<String>) -> Self {
        History::Note(text.into())
    }

    /// No context at all
    pub fn none() -> Self {
        History::Note(String::new())
    }
}

/// Builds [`ChatRequest`]s from a payload and its history
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    short_system: String,
    full_system: String,
    characters: String,
}

impl PromptBuilder {
    pub fn new(config: &TranslationConfig) -> MtResult<Self> {
        let template = match &config.prompt_file {
            Some(path) => fs::read_to_string(path).map_err(|source| MtError::Io {
                path: path.clone(),
                source,
            })?,
            None => DEFAULT_FULL_PROMPT.to_string(),
        };
        Ok(Self::from_parts(
            short_prompt(config),
            template.replace("{language}", &config.language),
            config.characters.clone(),
        ))
    }

    pub fn from_parts(
        short_system: impl Into<String>,
        full_system: impl Into<String>,
        characters: impl Into<String>,
    ) -> Self {
        Self {
            short_system: short_system.into(),
            full_system: full_system.into(),
            characters: characters.into(),
        }
    }

    /// Assemble a request for `payload`
    pub fn build(&self, payload: &str, history: &History, full_prompt: bool) -> ChatRequest {
        let system = if full_prompt {
            &self.full_system
        } else {
            &self.short_system
        };

        let mut messages = vec![
            ChatMessage::system(format!("{}{}", system, self.characters)),
            ChatMessage::system(self.characters.clone()),
        ];
        match history {
            History::Turns(lines) => {
                messages.extend(lines.iter().map(ChatMessage::assistant));
            }
            History::Note(note) if !note.is_empty() => {
                messages.push(ChatMessage::assistant(note.clone()));
            }
            History::Note(_) => {}
        }
        messages.push(ChatMessage::user(payload));

        ChatRequest::new(messages)
    }
}

/// Persona prompt built from the language and glossary
fn short_prompt(config: &TranslationConfig) -> String {
    let language = &config.language;
    let mut prompt = format!(
        "You are an expert game translator who translates Japanese text to {language}.\n\
         You are going to be translating text from a videogame.\n\
         I will give you lines of text, and you must translate each line to the best of your ability.\n"
    );
    for (source, target) in &config.glossary {
        prompt.push_str(&format!("- Translate '{source}' as '{target}'\n"));
    }
    prompt.push_str(&format!(
        "Output ONLY the {language} translation in the following format: `Translation: <{}_TRANSLATION>`",
        language.to_uppercase()
    ));
    prompt
}

/// Assistant notes describing the text being translated
pub mod notes {
    pub fn npc_name(language: &str) -> String {
        format!("Reply with only the {language} translation of the NPC name.")
    }

    pub fn plain(language: &str) -> String {
        format!("Reply with the {language} Translation.")
    }

    pub fn choice(previous: Option<&str>) -> String {
        match previous {
            Some(line) => format!(
                "Keep your translation as brief as possible. Previous text for context: {line}\n\nReply in the style of a dialogue option."
            ),
            None => "Keep your translation as brief as possible.\n\nStyle: dialogue option.".to_string(),
        }
    }

    pub fn location(language: &str) -> String {
        format!("Reply with the {language} translation of the Location Title")
    }

    pub fn stat_title(language: &str) -> String {
        format!("Reply with the {language} translation Stat Title. Keep it brief.")
    }

    pub fn achievement(language: &str) -> String {
        format!("Reply with the {language} translation of the achievement title.")
    }

    /// "Reply with only the English translation of the {what}"
    pub fn only(language: &str, what: &str) -> String {
        format!("Reply with only the {language} translation of the {what}")
    }

    pub fn action_log(language: &str) -> String {
        format!(
            "reply with only the gender neutral {language} translation of the action log. \
             Always start the sentence with Taro. For example, Translate 'Taroを倒した！' as 'Taro was defeated!'"
        )
    }

    pub fn gender_neutral(language: &str) -> String {
        format!("reply with only the gender neutral {language} translation")
    }

    pub fn ui_text(language: &str) -> String {
        format!(
            "UI Text Items:\n\
             \"逃げる\" == \"Escape\"\n\
             \"大事なもの\" == \"Key Items\"\n\
             \"最強装備\" == \"Optimize\"\n\
             \"攻撃力\" == \"Attack\"\n\
             \"最大ＨＰ\" == \"Max HP\"\n\
             \"経験値\" == \"EXP\"\n\
             \"購入する\" == \"Buy\"\n\
             Reply with only the {language} translation of the UI textbox."
        )
    }
}
