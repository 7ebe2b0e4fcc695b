//! Script lines (355 / 655) and comments (108 / 408)

use once_cell::sync::Lazy;
use regex::Regex;
use rpgtl::normalize::strip_all;
use rpgtl::wrap::fill;
use rpgtl::{Record, has_source_text};

use super::{PageExtractor, PageState, splice};
use crate::error::MtResult;
use crate::prompt::{History, notes};

static LOG_WINDOW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"_logWindow\.push\(.addText', '(.+?)'\)").expect("log window regex")
});

static NAME_POP_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<namePop:(.+)>").expect("name pop comment regex"));

impl PageExtractor {
    /// 355 / 655: `BattleManager._logWindow.push('addText', '...')`
    pub(super) async fn log_window(
        &self,
        record: &Record,
        line: &str,
        state: &mut PageState,
    ) -> MtResult<Record> {
        let mut out = record.clone();
        if !has_source_text(line) || line.contains('<') || !line.contains("_logWindow.push") {
            return Ok(out);
        }
        let Some(text) = LOG_WINDOW_RE.captures(line).and_then(|caps| caps.get(1)) else {
            return Ok(out);
        };

        let note = notes::stat_title(self.language());
        let translated = self
            .translate(state, text.as_str(), History::note(note), true)
            .await?;
        // the literal sits inside single quotes
        let translated = strip_all(&translated, &[".", "\"", "'"]);
        out.set_str(0, splice(line, text.start(), text.end(), &translated))?;
        Ok(out)
    }

    /// 108: `<namePop:...>` map labels, spaces become underscores
    pub(super) async fn name_pop_comment(
        &self,
        record: &Record,
        line: &str,
        state: &mut PageState,
    ) -> MtResult<Record> {
        let mut out = record.clone();
        let Some(label) = NAME_POP_COMMENT_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
        else {
            return Ok(out);
        };
        if !has_source_text(label.as_str()) {
            return Ok(out);
        }

        let note = notes::location(self.language());
        let translated = self
            .translate(state, label.as_str(), History::note(note), false)
            .await?;
        let translated = strip_all(&translated, &[".", "\""]).replace(' ', "_");
        out.set_str(0, splice(line, label.start(), label.end(), &translated))?;
        Ok(out)
    }

    /// 408: comment continuation, used by achievement plugins for titles
    pub(super) async fn comment_more(
        &self,
        record: &Record,
        line: &str,
        state: &mut PageState,
    ) -> MtResult<Record> {
        let mut out = record.clone();
        if !has_source_text(line) {
            return Ok(out);
        }

        let note = notes::achievement(self.language());
        let translated = self.translate(state, line, History::note(note), false).await?;
        let translated = strip_all(&translated, &[".", "\"", "\\n"]);
        out.set_str(0, fill(&translated, self.config().list_width))?;
        Ok(out)
    }
}
