//! Per-file-format traversal
//!
//! RPG Maker keeps each database table in its own JSON file. The file
//! name decides how the tree is walked:
//!
//! - event files (`Map*.json`, `CommonEvents.json`, `Troops.json`,
//!   `Scenario.json`) hold pages of commands, located here as JSON
//!   pointers and handed to the page extractor;
//! - database lists (actors, items, skills, ...) hold named entities whose
//!   fields are translated one by one in [`database`].
//!
//! MV files use camelCase keys, converted VX Ace data uses snake_case;
//! both are accepted wherever they differ.

pub mod database;

use std::path::Path;

use serde_json::Value;

use crate::error::{MtError, MtResult};

/// Kind of game data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Map,
    CommonEvents,
    Troops,
    Scenario,
    Actors,
    Armors,
    Weapons,
    Classes,
    Enemies,
    Items,
    MapInfos,
    Skills,
    States,
    System,
}

impl FileKind {
    /// Detect the kind from a file name such as `Map012.json`
    pub fn detect(path: &Path) -> MtResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MtError::UnsupportedFile(path.display().to_string()))?;

        if name.contains("Map") && !name.contains("MapInfos") {
            return Ok(FileKind::Map);
        }
        let table = [
            ("CommonEvents", FileKind::CommonEvents),
            ("Actors", FileKind::Actors),
            ("Armors", FileKind::Armors),
            ("Weapons", FileKind::Weapons),
            ("Classes", FileKind::Classes),
            ("Enemies", FileKind::Enemies),
            ("Items", FileKind::Items),
            ("MapInfos", FileKind::MapInfos),
            ("Skills", FileKind::Skills),
            ("Troops", FileKind::Troops),
            ("States", FileKind::States),
            ("System", FileKind::System),
            ("Scenario", FileKind::Scenario),
        ];
        table
            .into_iter()
            .find(|(needle, _)| name.contains(needle))
            .map(|(_, kind)| kind)
            .ok_or_else(|| MtError::UnsupportedFile(name.to_string()))
    }

    /// Whether the file holds event pages
    pub fn has_pages(self) -> bool {
        matches!(
            self,
            FileKind::Map | FileKind::CommonEvents | FileKind::Troops | FileKind::Scenario
        )
    }
}

/// Escape one JSON pointer token
fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// `(index-or-key, element)` pairs of an array or object; nulls skipped
fn entries(value: &Value) -> Vec<(String, &Value)> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (escape_token(k), v))
            .collect(),
        _ => Vec::new(),
    }
}

/// Pointers to every `pages[k].list` below `base`
fn event_pages(base: &str, event: &Value, out: &mut Vec<String>) {
    if let Some(Value::Array(pages)) = event.get("pages") {
        for (k, page) in pages.iter().enumerate() {
            if page.get("list").is_some_and(Value::is_array) {
                out.push(format!("{base}/pages/{k}/list"));
            }
        }
    }
}

/// JSON pointers to every command list in an event file, in file order
pub fn page_pointers(kind: FileKind, root: &Value) -> Vec<String> {
    let mut out = Vec::new();
    match kind {
        FileKind::Map => {
            if let Some(events) = root.get("events") {
                for (key, event) in entries(events) {
                    event_pages(&format!("/events/{key}"), event, &mut out);
                }
            }
        }
        FileKind::Troops => {
            for (key, troop) in entries(root) {
                event_pages(&format!("/{key}"), troop, &mut out);
            }
        }
        FileKind::CommonEvents => {
            for (key, event) in entries(root) {
                if event.get("list").is_some_and(Value::is_array) {
                    out.push(format!("/{key}/list"));
                }
            }
        }
        FileKind::Scenario => {
            for (key, page) in entries(root) {
                if page.is_array() {
                    out.push(format!("/{key}"));
                }
            }
        }
        _ => {}
    }
    out
}

/// Number of commands behind `pointers`, for progress totals
pub fn record_count(root: &Value, pointers: &[String]) -> u64 {
    pointers
        .iter()
        .filter_map(|p| root.pointer(p))
        .filter_map(Value::as_array)
        .map(|list| list.len() as u64)
        .sum()
}

/// Look up the first present key among `keys` (camelCase / snake_case)
pub(crate) fn first_key<'a>(object: &Value, keys: &[&'a str]) -> Option<&'a str> {
    keys.iter().copied().find(|k| object.get(*k).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========== Detection Tests ==========

    #[test]
    fn test_detect() {
        let kind = |name: &str| FileKind::detect(Path::new(name));
        assert_eq!(kind("data/Map001.json").unwrap(), FileKind::Map);
        assert_eq!(kind("MapInfos.json").unwrap(), FileKind::MapInfos);
        assert_eq!(kind("CommonEvents.json").unwrap(), FileKind::CommonEvents);
        assert_eq!(kind("Troops.json").unwrap(), FileKind::Troops);
        assert_eq!(kind("System.json").unwrap(), FileKind::System);
        assert!(matches!(
            kind("Animations.json"),
            Err(MtError::UnsupportedFile(name)) if name == "Animations.json"
        ));
        assert!(FileKind::Map.has_pages());
        assert!(!FileKind::Items.has_pages());
    }

    // ========== Page Location Tests ==========

    #[test]
    fn test_map_pointers_array_and_object() {
        let map = json!({
            "displayName": "",
            "events": [null, {"pages": [{"list": []}, {"list": [{"code": 0}]}]}, null]
        });
        assert_eq!(
            page_pointers(FileKind::Map, &map),
            vec!["/events/1/pages/0/list", "/events/1/pages/1/list"]
        );

        let ace = json!({"events": {"3": {"pages": [{"list": []}]}}});
        assert_eq!(page_pointers(FileKind::Map, &ace), vec!["/events/3/pages/0/list"]);
        assert_eq!(record_count(&map, &page_pointers(FileKind::Map, &map)), 1);
    }

    #[test]
    fn test_common_event_and_troop_pointers() {
        let common = json!([null, {"id": 1, "list": []}, {"id": 2, "list": []}]);
        assert_eq!(
            page_pointers(FileKind::CommonEvents, &common),
            vec!["/1/list", "/2/list"]
        );

        let troops = json!([null, {"pages": [{"list": []}]}]);
        assert_eq!(page_pointers(FileKind::Troops, &troops), vec!["/1/pages/0/list"]);
    }

    #[test]
    fn test_scenario_pointers_escape_keys() {
        let scenario = json!({"intro/1": [], "meta": {"x": 1}});
        let pointers = page_pointers(FileKind::Scenario, &scenario);
        assert_eq!(pointers, vec!["/intro~11"]);
        assert!(scenario.pointer(&pointers[0]).is_some());
    }
}
