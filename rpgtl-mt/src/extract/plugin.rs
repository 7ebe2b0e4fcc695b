//! Plugin commands: 356 (MV), 357 and 657 (MZ)
//!
//! A 356 line is a verb followed by arguments separated by spaces, so the
//! translated argument must not contain spaces; they are written back as
//! underscores. Several verbs spread one message over consecutive
//! records; those are merged, translated once, and written into the
//! first record while the continuations are dropped.

use once_cell::sync::Lazy;
use regex::{Match, Regex};
use rpgtl::normalize::strip_all;
use rpgtl::wrap::fill;
use rpgtl::{Record, event::codes, has_source_text};
use serde_json::Value;

use super::{PageExtractor, PageState, splice, split_affixes};
use crate::error::MtResult;
use crate::prompt::{History, notes};

static TACHIE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tachie showName (.+)").expect("tachie regex"));
static D_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"D_TEXT\s(.+)\s|D_TEXT\s(.+)").expect("d_text regex"));
static SHOW_INFO_SE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_SE\[.+?\](.+)").expect("show info se regex"));
static SHOW_INFO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ShowInfo (.+)").expect("show info regex"));
static PUSH_GAB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PushGab [0-9]+ (.+)").expect("push gab regex"));
static ADD_LOG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"addLog (.+)").expect("add log regex"));
static NAME_POP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"namePop\s\d+\s(.+?)\s.+").expect("name pop regex"));

static PICTURE_LEAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^一-龠ぁ-ゔァ-ヴー【】（）「」a-zA-ZＡ-Ｚ０-９\\]+").expect("picture lead regex")
});
static PICTURE_MORE_LEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^一-龠ぁ-ゔァ-ヴー<>【】\\]+").expect("picture lead regex"));
static PICTURE_MORE_TRAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^一-龠ぁ-ゔァ-ヴー<>【】。！？\\]+$").expect("picture trail regex")
});

/// Recognized 356 verbs, in matching priority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    TachieName,
    DText,
    ShowInfo,
    PushGab,
    AddLog,
    NamePop,
}

impl Verb {
    /// Verbs whose message continues in following records
    fn merges(self) -> bool {
        matches!(self, Verb::DText | Verb::ShowInfo | Verb::PushGab | Verb::AddLog)
    }
}

/// First non-empty capture group
fn first_group<'a>(re: &Regex, line: &'a str) -> Option<Match<'a>> {
    re.captures(line)
        .and_then(|caps| caps.iter().skip(1).flatten().next())
}

/// The verb of a 356 line and the byte span of its translatable argument
fn parse_plugin_line(line: &str) -> Option<(Verb, usize, usize)> {
    let found = if let Some(m) = first_group(&TACHIE_NAME_RE, line) {
        (Verb::TachieName, m)
    } else if let Some(m) = first_group(&D_TEXT_RE, line) {
        (Verb::DText, m)
    } else if line.contains("ShowInfo") {
        let re = if line.contains("_SE") {
            &*SHOW_INFO_SE_RE
        } else {
            &*SHOW_INFO_RE
        };
        (Verb::ShowInfo, first_group(re, line)?)
    } else if let Some(m) = first_group(&PUSH_GAB_RE, line) {
        (Verb::PushGab, m)
    } else if let Some(m) = first_group(&ADD_LOG_RE, line) {
        (Verb::AddLog, m)
    } else {
        (Verb::NamePop, first_group(&NAME_POP_RE, line)?)
    };
    let (verb, m) = found;
    Some((verb, m.start(), m.end()))
}

/// Argument text as the model should see it
fn decode_argument(verb: Verb, argument: &str) -> String {
    match verb {
        Verb::ShowInfo | Verb::PushGab | Verb::AddLog => argument.replace('_', " "),
        _ => argument.to_string(),
    }
}

impl PageExtractor {
    /// 356: returns the number of records consumed, including merged
    /// continuations
    pub(super) async fn plugin_command(
        &self,
        records: &[Record],
        at: usize,
        line: &str,
        state: &mut PageState,
    ) -> MtResult<usize> {
        let record = &records[at];
        let line = line.replace('\n', "_");
        let Some((verb, start, end)) = parse_plugin_line(&line) else {
            state.keep(record.clone());
            return Ok(1);
        };

        let mut parts = vec![decode_argument(verb, &line[start..end])];
        if verb.merges() {
            for next in &records[at + 1..] {
                if next.code != codes::PLUGIN_COMMAND {
                    break;
                }
                let Some(next_line) = next.str_param(0).map(|l| l.replace('\n', "_")) else {
                    break;
                };
                match parse_plugin_line(&next_line) {
                    Some((next_verb, s, e)) if next_verb == verb => {
                        parts.push(decode_argument(verb, &next_line[s..e]));
                    }
                    _ => break,
                }
            }
        }
        let merged = parts.join(" ");
        if !has_source_text(&merged) {
            state.keep(record.clone());
            return Ok(1);
        }

        let language = self.language();
        let translated = match verb {
            Verb::TachieName => {
                let note = notes::npc_name(language);
                self.translate(state, &merged, History::note(note), false).await?
            }
            Verb::DText => {
                let note = notes::plain(language);
                let text = self.translate(state, &merged, History::note(note), false).await?;
                fill(&text, self.config().width)
            }
            Verb::ShowInfo => {
                let note = notes::plain(language);
                self.translate(state, &merged, History::note(note), true).await?
            }
            Verb::PushGab | Verb::AddLog | Verb::NamePop => {
                let note = notes::plain(language);
                self.translate(state, &merged, History::note(note), false).await?
            }
        };
        let encoded = strip_all(&translated, &[".", "\""])
            .replace(' ', "_")
            .replace("__\n", "__");

        let mut out = record.clone();
        out.set_str(0, splice(&line, start, end, &encoded))?;
        state.keep(out);
        Ok(parts.len())
    }

    /// 357: the `message` argument of an MZ plugin command
    pub(super) async fn picture_text(
        &self,
        record: &Record,
        message: Option<String>,
        state: &mut PageState,
    ) -> MtResult<Record> {
        let mut out = record.clone();
        let Some(message) = message else {
            return Ok(out);
        };
        if message.contains('_') || !has_source_text(&message) {
            return Ok(out);
        }

        let start = PICTURE_LEAD_RE.find(&message).map_or(0, |m| m.end());
        let (lead, body) = message.split_at(start);
        let translated = self
            .translate(state, &body.replace('\n', " "), History::none(), true)
            .await?;
        let text = format!("{lead}{}", fill(&translated, self.config().width));

        if let Some(args) = out.parameters.get_mut(3).and_then(Value::as_object_mut) {
            args.insert("message".to_string(), Value::String(text));
        }
        Ok(out)
    }

    /// 657: `text = ...` argument lines of an MZ plugin command
    pub(super) async fn picture_text_more(
        &self,
        record: &Record,
        line: &str,
        state: &mut PageState,
    ) -> MtResult<Record> {
        let mut out = record.clone();
        if !line.contains("text") || line.contains('_') || !has_source_text(line) {
            return Ok(out);
        }

        let (lead, body, trail) = split_affixes(line, &PICTURE_MORE_LEAD_RE, &PICTURE_MORE_TRAIL_RE);
        let translated = self
            .translate(state, &body.replace('\n', " "), History::none(), true)
            .await?;
        let translated = strip_all(&translated, &[".", "\"", "'"]);
        out.set_str(
            0,
            format!("{lead}{}{trail}", fill(&translated, self.config().width)),
        )?;
        Ok(out)
    }
}
