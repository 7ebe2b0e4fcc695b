//! Event records and pages
//!
//! An RPG Maker event page is a list of commands, each an object holding
//! a numeric `code` and a positional `parameters` array. Exports made by
//! some tools use the short keys `c` / `p` instead; both spellings are
//! accepted and written back the way they were read.
//!
//! [`Command`] is the typed view of a record: one variant per command
//! kind the translator understands, each carrying the payload that kind
//! needs. Everything else is [`Command::Other`] and passes through
//! untouched.

use serde_json::{Map, Value};

use crate::error::EventError;

/// Which key spelling a page uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordSchema {
    /// `{"code": 401, "indent": 0, "parameters": [...]}`
    #[default]
    Full,
    /// `{"c": 401, "p": [...]}`
    Short,
}

impl RecordSchema {
    pub fn code_key(self) -> &'static str {
        match self {
            RecordSchema::Full => "code",
            RecordSchema::Short => "c",
        }
    }

    pub fn parameters_key(self) -> &'static str {
        match self {
            RecordSchema::Full => "parameters",
            RecordSchema::Short => "p",
        }
    }

    fn detect(object: &Map<String, Value>) -> Option<Self> {
        if object.contains_key("code") {
            Some(RecordSchema::Full)
        } else if object.contains_key("c") {
            Some(RecordSchema::Short)
        } else {
            None
        }
    }
}

/// Numeric command codes handled by the translator
pub mod codes {
    pub const END: i64 = 0;
    pub const TEXT_HEADER: i64 = 101;
    pub const SHOW_CHOICES: i64 = 102;
    pub const COMMENT: i64 = 108;
    pub const CONDITIONAL_BRANCH: i64 = 111;
    pub const CONTROL_VARIABLES: i64 = 122;
    pub const CHANGE_NAME: i64 = 320;
    pub const SCRIPT: i64 = 355;
    pub const PLUGIN_COMMAND: i64 = 356;
    pub const PLUGIN_COMMAND_MZ: i64 = 357;
    pub const SHOW_TEXT: i64 = 401;
    pub const SCROLL_TEXT: i64 = 405;
    pub const COMMENT_MORE: i64 = 408;
    pub const SCRIPT_MORE: i64 = 655;
    pub const PLUGIN_COMMAND_MZ_MORE: i64 = 657;
}

/// One command in a page
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub code: i64,
    pub parameters: Vec<Value>,
    /// The full original object, so unknown keys and key order survive
    fields: Map<String, Value>,
    schema: RecordSchema,
}

impl Record {
    /// Build a record from scratch (mostly useful in tests)
    pub fn new(code: i64, parameters: Vec<Value>) -> Self {
        let schema = RecordSchema::Full;
        let mut fields = Map::new();
        fields.insert(schema.code_key().to_string(), Value::from(code));
        fields.insert("indent".to_string(), Value::from(0));
        fields.insert(
            schema.parameters_key().to_string(),
            Value::Array(parameters.clone()),
        );
        Self {
            code,
            parameters,
            fields,
            schema,
        }
    }

    /// A text line record (401) with a single string parameter
    pub fn text(code: i64, line: &str) -> Self {
        Self::new(code, vec![Value::from(line)])
    }

    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let Value::Object(fields) = value else {
            return Err(EventError::NotAnObject);
        };
        let schema = RecordSchema::detect(&fields).ok_or(EventError::UnknownSchema)?;
        let code = fields
            .get(schema.code_key())
            .and_then(Value::as_i64)
            .ok_or(EventError::UnknownSchema)?;
        let parameters = match fields.get(schema.parameters_key()) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(EventError::WrongType {
                    code,
                    index: 0,
                    expected: "parameter list",
                });
            }
        };
        Ok(Self {
            code,
            parameters,
            fields,
            schema,
        })
    }

    pub fn into_value(self) -> Value {
        let mut fields = self.fields;
        fields.insert(self.schema.code_key().to_string(), Value::from(self.code));
        fields.insert(
            self.schema.parameters_key().to_string(),
            Value::Array(self.parameters),
        );
        Value::Object(fields)
    }

    pub fn schema(&self) -> RecordSchema {
        self.schema
    }

    /// Parameter `index` as a string, if it is one
    pub fn str_param(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).and_then(Value::as_str)
    }

    /// Parameter `index` as a string, or a structural error
    pub fn require_str(&self, index: usize) -> Result<&str, EventError> {
        match self.parameters.get(index) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(EventError::WrongType {
                code: self.code,
                index,
                expected: "string",
            }),
            None => Err(EventError::MissingParameter {
                code: self.code,
                index,
            }),
        }
    }

    /// Overwrite parameter `index` with a string
    pub fn set_str(&mut self, index: usize, text: impl Into<String>) -> Result<(), EventError> {
        let code = self.code;
        let slot = self
            .parameters
            .get_mut(index)
            .ok_or(EventError::MissingParameter { code, index })?;
        *slot = Value::String(text.into());
        Ok(())
    }

    /// Copy of this record with its parameters replaced by one string
    pub fn with_single_text(&self, text: impl Into<String>) -> Self {
        let mut record = self.clone();
        record.parameters = vec![Value::String(text.into())];
        record
    }

    /// The typed view of this record
    pub fn command(&self) -> Result<Command, EventError> {
        Command::parse(self)
    }
}

/// Typed payload of a record, one variant per handled command kind
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// 401 message line; `None` when the record has no parameters
    ShowText { line: Option<String> },
    /// 405 scrolling text line
    ScrollText { line: Option<String> },
    /// 101 message header; MZ stores the speaker name at index 4
    TextHeader { name: Option<String> },
    /// 102 choice list
    ShowChoices { choices: Vec<String> },
    /// 108 comment
    Comment { line: String },
    /// 408 comment continuation
    CommentMore { line: String },
    /// 111 conditional branch; every string parameter with its index
    ConditionalBranch { strings: Vec<(usize, String)> },
    /// 122 control variables: target variable and a script operand
    ControlVariables { variable: i64, operand: Option<String> },
    /// 320 change actor name
    ChangeName { name: Option<String> },
    /// 355 / 655 script line
    Script { line: String },
    /// 356 plugin command line
    PluginCommand { line: String },
    /// 357 MZ plugin command; `message` argument when present
    PluginCommandMz { message: Option<String> },
    /// 657 MZ plugin command argument line
    PluginCommandMzMore { line: String },
    /// Any other command
    Other,
}

impl Command {
    pub fn parse(record: &Record) -> Result<Self, EventError> {
        let owned = |s: &str| s.to_string();
        Ok(match record.code {
            codes::SHOW_TEXT => Command::ShowText {
                line: record.str_param(0).map(owned),
            },
            codes::SCROLL_TEXT => Command::ScrollText {
                line: record.str_param(0).map(owned),
            },
            codes::TEXT_HEADER => Command::TextHeader {
                name: record.str_param(4).map(owned),
            },
            codes::SHOW_CHOICES => {
                let list = match record.parameters.first() {
                    Some(Value::Array(items)) => items,
                    _ => {
                        return Err(EventError::WrongType {
                            code: record.code,
                            index: 0,
                            expected: "choice list",
                        });
                    }
                };
                Command::ShowChoices {
                    choices: list
                        .iter()
                        .map(|v| v.as_str().unwrap_or_default().to_string())
                        .collect(),
                }
            }
            codes::COMMENT => Command::Comment {
                line: record.require_str(0)?.to_string(),
            },
            codes::COMMENT_MORE => Command::CommentMore {
                line: record.require_str(0)?.to_string(),
            },
            codes::CONDITIONAL_BRANCH => Command::ConditionalBranch {
                strings: record
                    .parameters
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.as_str().map(|s| (i, s.to_string())))
                    .collect(),
            },
            codes::CONTROL_VARIABLES => {
                let variable = record
                    .parameters
                    .first()
                    .and_then(Value::as_i64)
                    .ok_or(EventError::WrongType {
                        code: record.code,
                        index: 0,
                        expected: "variable id",
                    })?;
                Command::ControlVariables {
                    variable,
                    operand: record.str_param(4).map(owned),
                }
            }
            codes::CHANGE_NAME => Command::ChangeName {
                name: record.str_param(1).map(owned),
            },
            codes::SCRIPT | codes::SCRIPT_MORE => Command::Script {
                line: record.require_str(0)?.to_string(),
            },
            codes::PLUGIN_COMMAND => Command::PluginCommand {
                line: record.require_str(0)?.to_string(),
            },
            codes::PLUGIN_COMMAND_MZ => Command::PluginCommandMz {
                message: record
                    .parameters
                    .get(3)
                    .and_then(|args| args.get("message"))
                    .and_then(Value::as_str)
                    .map(owned),
            },
            codes::PLUGIN_COMMAND_MZ_MORE => Command::PluginCommandMzMore {
                line: record.require_str(0)?.to_string(),
            },
            _ => Command::Other,
        })
    }
}

/// An ordered list of records: one event page, common event or troop page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub records: Vec<Record>,
}

impl Page {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Parse a JSON command list
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let Value::Array(items) = value else {
            return Err(EventError::NotAList);
        };
        let records = items
            .into_iter()
            .map(Record::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    pub fn into_value(self) -> Value {
        Value::Array(self.records.into_iter().map(Record::into_value).collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
