//! Speaker names: 101 name box, 320 change name, and the lookup shared
//! with dialogue speaker tags.

use once_cell::sync::Lazy;
use regex::Regex;
use rpgtl::normalize::strip_all;
use rpgtl::{Record, has_source_text};

use super::{PageExtractor, PageState, split_affixes};
use crate::error::MtResult;
use crate::prompt::{History, notes};

static NAME_LEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^一-龠ぁ-ゔァ-ヴー<>【】]+").expect("name lead regex"));

static NAME_TRAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^一-龠ぁ-ゔァ-ヴー<>【】。！？]+$").expect("name trail regex"));

impl PageExtractor {
    /// Translate a speaker name, using the speaker table when it has one
    pub(super) async fn speaker_name(&self, name: &str, state: &mut PageState) -> MtResult<String> {
        if let Some(known) = self.config().known_speaker(name) {
            return Ok(known.to_string());
        }
        let note = notes::npc_name(self.language());
        self.translate(state, name, History::note(note), false)
            .await
    }

    /// 101: the MZ name box at parameter 4
    pub(super) async fn name_box(
        &self,
        record: &Record,
        name: Option<String>,
        state: &mut PageState,
    ) -> MtResult<Record> {
        let mut out = record.clone();
        let Some(name) = name else {
            return Ok(out);
        };
        if let Some(known) = self.config().known_speaker(&name) {
            out.set_str(4, known)?;
            return Ok(out);
        }
        if name.contains('_') || !has_source_text(&name) {
            return Ok(out);
        }

        let (lead, core, trail) = split_affixes(&name, &NAME_LEAD_RE, &NAME_TRAIL_RE);
        let note = notes::npc_name(self.language());
        let translated = self.translate(state, core, History::note(note), false).await?;
        out.set_str(4, format!("{lead}{}{trail}", strip_all(&translated, &[".", "\""])))?;
        Ok(out)
    }

    /// 320: new actor name at parameter 1
    pub(super) async fn change_name(
        &self,
        record: &Record,
        name: Option<String>,
        state: &mut PageState,
    ) -> MtResult<Record> {
        let mut out = record.clone();
        let Some(name) = name else {
            return Ok(out);
        };
        if name.contains('■') || name.contains('_') || !has_source_text(&name) {
            return Ok(out);
        }

        let note = notes::npc_name(self.language());
        let translated = self.translate(state, &name, History::note(note), false).await?;
        out.set_str(1, strip_all(&translated, &[".", "\"", "'", "\\n"]))?;
        Ok(out)
    }
}
