//! Database lists and System terms
//!
//! Entity files are arrays of objects (index 0 is `null`). Each kind has a
//! fixed set of fields worth translating:
//!
//! | Kind            | Fields                                           |
//! |-----------------|--------------------------------------------------|
//! | Actors          | name, nickname, profile, `<特徴1:...>`          |
//! | Armors, Weapons | name, description, `<hint:...>`, info text       |
//! | Classes         | name                                             |
//! | Enemies         | name, `<desc2:...>`, `<desc3:...>`, skill logs   |
//! | Items           | name, description, SG / ExtendDesc note tags     |
//! | MapInfos        | name                                             |
//! | Skills, States  | name, description, message1..4, `<help:...>`     |
//!
//! Every field is translated on its own with a note telling the model
//! what kind of text it is looking at.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use rpgtl::normalize::{strip_all, unwrap_lines};
use rpgtl::wrap::fill;
use rpgtl::has_source_text;
use serde_json::Value;

use super::{FileKind, first_key};
use crate::batch::BatchTranslator;
use crate::error::MtResult;
use crate::progress::ProgressSink;
use crate::prompt::{History, notes};
use crate::tokens::TokenUsage;

static SG_DESCRIPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<SG説明:([\s\S]*?)>").expect("sg description regex"));
static SG_CATEGORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<SGカテゴリ:([\s\S]*?)>").expect("sg category regex"));
static EXTEND_DESC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<ExtendDesc:([\s\S]*?)>").expect("extend desc regex"));
static HINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<hint:([\s\S]*?)>").expect("hint regex"));
static INFO_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<Info Text Bottom>\n([\s\S]*?)\n</Info Text Bottom>").expect("info text regex")
});
static DESC2_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<desc2:([^>]*)>").expect("desc2 regex"));
static DESC3_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<desc3:([^>]*)>").expect("desc3 regex"));
static SKILL_LOG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"111:(.+?)\n").expect("skill log regex"));
static TRAIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<特徴1:([^>]*)>").expect("trait regex"));
static HELP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<help:([^>]*)>").expect("help regex"));

/// Enemy notes only carry skill logs when this plugin tag is present
const SKILL_LOG_MARKER: &str = "variable_update_skill";

/// Battle messages follow the subject's name, so a message starting with
/// one of these particles is translated with a stand-in subject
const SUBJECT_PARTICLES: [char; 5] = ['は', 'を', 'の', 'に', 'が'];
const STAND_IN_SUBJECT: &str = "Taro";

/// What to translate in one entity kind
struct Rules {
    /// What the `name` field is, e.g. "RPG weapon name"
    name: &'static str,
    /// Short fields and what they are
    labels: &'static [(&'static str, &'static str)],
    /// Long fields re-wrapped to `list_width`
    descriptions: &'static [&'static str],
    note_tags: Vec<&'static Regex>,
    messages: bool,
}

fn rules(kind: FileKind) -> Option<Rules> {
    let plain = |name| Rules {
        name,
        labels: &[],
        descriptions: &[],
        note_tags: Vec::new(),
        messages: false,
    };
    Some(match kind {
        FileKind::Actors => Rules {
            labels: &[("nickname", "NPC nickname")],
            descriptions: &["profile", "description"],
            note_tags: vec![&*TRAIT_RE],
            ..plain("NPC name")
        },
        FileKind::Armors => Rules {
            descriptions: &["description"],
            note_tags: vec![&*HINT_RE, &*INFO_TEXT_RE],
            ..plain("RPG equipment name")
        },
        FileKind::Weapons => Rules {
            descriptions: &["description"],
            note_tags: vec![&*HINT_RE, &*INFO_TEXT_RE],
            ..plain("RPG weapon name")
        },
        FileKind::Classes => plain("RPG class name"),
        FileKind::Enemies => Rules {
            note_tags: vec![&*DESC2_RE, &*DESC3_RE],
            ..plain("enemy NPC name")
        },
        FileKind::Items => Rules {
            descriptions: &["description"],
            note_tags: vec![&*SG_DESCRIPTION_RE, &*SG_CATEGORY_RE, &*EXTEND_DESC_RE],
            ..plain("RPG item name")
        },
        FileKind::MapInfos => plain("location name"),
        FileKind::Skills => Rules {
            descriptions: &["description"],
            note_tags: vec![&*HELP_RE],
            messages: true,
            ..plain("RPG skill name")
        },
        FileKind::States => Rules {
            descriptions: &["description"],
            note_tags: vec![&*HELP_RE],
            messages: true,
            ..plain("RPG status effect name")
        },
        _ => return None,
    })
}

/// Translates database lists, System terms and map display names
#[derive(Clone)]
pub struct DatabaseTranslator {
    translator: Arc<BatchTranslator>,
}

/// Usage accumulator for one file
struct Fields<'a> {
    translator: &'a BatchTranslator,
    usage: TokenUsage,
}

impl Fields<'_> {
    fn language(&self) -> &str {
        &self.translator.config().language
    }

    async fn text(&mut self, text: &str, note: String) -> MtResult<String> {
        let translation = self
            .translator
            .translate_text(text, History::note(note), false)
            .await?;
        self.usage += translation.usage;
        Ok(translation.text)
    }

    /// Translate the string at `object[key]` in place with `f` applied to
    /// the result. Missing, non-string and source-free values are skipped.
    async fn field(
        &mut self,
        object: &mut Value,
        key: &str,
        note: String,
        f: impl FnOnce(String) -> String,
    ) -> MtResult<()> {
        let Some(source) = object.get(key).and_then(Value::as_str) else {
            return Ok(());
        };
        if !has_source_text(source) {
            return Ok(());
        }
        let source = unwrap_lines(source);
        let translated = f(self.text(&source, note).await?);
        object[key] = Value::String(translated);
        Ok(())
    }
}

impl DatabaseTranslator {
    pub fn new(translator: Arc<BatchTranslator>) -> Self {
        Self { translator }
    }

    /// Number of entities a file holds, for progress totals
    pub fn entity_count(root: &Value) -> u64 {
        match root {
            Value::Array(items) => items.iter().filter(|v| v.is_object()).count() as u64,
            _ => 1,
        }
    }

    /// Translate every entity of a database file in place
    pub async fn translate(
        &self,
        kind: FileKind,
        root: &mut Value,
        progress: &dyn ProgressSink,
    ) -> MtResult<TokenUsage> {
        let mut fields = Fields {
            translator: &self.translator,
            usage: TokenUsage::default(),
        };

        if kind == FileKind::System {
            self.system(root, &mut fields).await?;
            progress.advance(1);
            return Ok(fields.usage);
        }
        let Some(rules) = rules(kind) else {
            return Ok(fields.usage);
        };

        if let Value::Array(entities) = root {
            for entity in entities.iter_mut().filter(|v| v.is_object()) {
                self.entity(kind, &rules, entity, &mut fields).await?;
                progress.advance(1);
            }
        }
        Ok(fields.usage)
    }

    /// The `displayName` of a map
    pub async fn translate_map_name(&self, root: &mut Value) -> MtResult<TokenUsage> {
        let mut fields = Fields {
            translator: &self.translator,
            usage: TokenUsage::default(),
        };
        if let Some(key) = first_key(root, &["displayName", "display_name"]) {
            let note = notes::only(fields.language(), "RPG location name");
            fields
                .field(root, key, note, |t| strip_all(&t, &["\""]))
                .await?;
        }
        Ok(fields.usage)
    }

    async fn entity(
        &self,
        kind: FileKind,
        rules: &Rules,
        entity: &mut Value,
        fields: &mut Fields<'_>,
    ) -> MtResult<()> {
        let config = self.translator.config();
        let language = config.language.clone();

        let note = notes::only(&language, rules.name);
        fields
            .field(entity, "name", note, |t| {
                strip_all(&t, &["\""]).trim_end_matches('.').to_string()
            })
            .await?;

        for (key, what) in rules.labels {
            let note = notes::only(&language, what);
            fields
                .field(entity, key, note, |t| strip_all(&t, &["\""]))
                .await?;
        }

        for key in rules.descriptions {
            let note = notes::only(&language, "description");
            let width = config.list_width;
            fields
                .field(entity, key, note, |t| fill(&strip_all(&t, &["\""]), width))
                .await?;
        }

        if rules.messages {
            self.battle_messages(entity, fields).await?;
        }

        let mut tags = rules.note_tags.clone();
        if kind == FileKind::Enemies
            && entity
                .get("note")
                .and_then(Value::as_str)
                .is_some_and(|n| n.contains(SKILL_LOG_MARKER))
        {
            tags.insert(0, &*SKILL_LOG_RE);
        }
        self.note_tags(entity, &tags, fields).await
    }

    /// `message1..4` of skills and states
    async fn battle_messages(&self, entity: &mut Value, fields: &mut Fields<'_>) -> MtResult<()> {
        let language = fields.language().to_string();
        for key in ["message1", "message2", "message3", "message4"] {
            let Some(message) = entity.get(key).and_then(Value::as_str) else {
                continue;
            };
            if !has_source_text(message) {
                continue;
            }
            let (text, note) = if message.starts_with(SUBJECT_PARTICLES) {
                (
                    format!("{STAND_IN_SUBJECT}{message}"),
                    notes::action_log(&language),
                )
            } else {
                (message.to_string(), notes::gender_neutral(&language))
            };
            let translated = fields.text(&text, note).await?;
            entity[key] = Value::String(strip_all(&translated, &[STAND_IN_SUBJECT, "\""]));
        }
        Ok(())
    }

    /// Translate the first capture of every tag pattern found in `note`
    async fn note_tags(
        &self,
        entity: &mut Value,
        patterns: &[&Regex],
        fields: &mut Fields<'_>,
    ) -> MtResult<()> {
        let Some(note) = entity.get("note").and_then(Value::as_str).map(str::to_string) else {
            return Ok(());
        };
        let width = self.translator.config().note_width;
        let description = notes::only(fields.language(), "description");

        let mut rewritten = note.clone();
        for pattern in patterns {
            let found: Vec<String> = pattern
                .captures_iter(&note)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .filter(|text| has_source_text(text))
                .collect();
            for text in found {
                let translated = fields
                    .text(&text.replace('\n', " "), description.clone())
                    .await?;
                let translated = strip_all(&fill(&translated, width), &["\""]);
                rewritten = rewritten.replace(&text, &translated);
            }
        }
        if rewritten != note {
            entity["note"] = Value::String(rewritten);
        }
        Ok(())
    }

    /// System.json: terms, type lists and the game title
    async fn system(&self, root: &mut Value, fields: &mut Fields<'_>) -> MtResult<()> {
        let language = fields.language().to_string();

        if let Some(terms) = root.get_mut("terms").and_then(Value::as_object_mut) {
            for (key, value) in terms.iter_mut() {
                if key == "messages" {
                    continue;
                }
                if let Value::Array(items) = value {
                    for item in items.iter_mut() {
                        let Some(text) = item.as_str().filter(|t| has_source_text(t)) else {
                            continue;
                        };
                        let translated = fields.text(text, notes::ui_text(&language)).await?;
                        *item = Value::String(strip_all(&translated, &["\""]));
                    }
                }
            }
        }

        let type_lists = [
            ["armorTypes", "armor_types"],
            ["skillTypes", "skill_types"],
            ["weaponTypes", "weapon_types"],
        ];
        for keys in type_lists {
            let Some(key) = first_key(root, &keys) else {
                continue;
            };
            if let Some(Value::Array(items)) = root.get_mut(key) {
                for item in items.iter_mut() {
                    let Some(text) = item.as_str().filter(|t| has_source_text(t)) else {
                        continue;
                    };
                    let translated = fields.text(text, notes::ui_text(&language)).await?;
                    *item = Value::String(strip_all(&translated, &["\""]).trim().to_string());
                }
            }
        }

        if let Some(key) = first_key(root, &["gameTitle", "game_title"]) {
            let note = notes::only(&language, "game title");
            fields
                .field(root, key, note, |t| strip_all(&t, &["\""]))
                .await?;
        }
        Ok(())
    }
}
