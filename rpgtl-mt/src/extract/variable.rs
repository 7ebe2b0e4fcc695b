//! String literals assigned to game variables: 122 control variables and
//! 111 conditional-branch scripts.

use once_cell::sync::Lazy;
use regex::Regex;
use rpgtl::normalize::strip_all;
use rpgtl::wrap::fill;
use rpgtl::{Record, has_source_text};

use super::{PageExtractor, PageState};
use crate::error::MtResult;
use crate::prompt::{History, notes};

static QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"`](.*)['"`]"#).expect("quoted literal regex"));

static SINGLE_QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'(.*?)'").expect("single quoted regex"));

impl PageExtractor {
    /// 122: a script operand such as `'ゴブリン'` assigned to a known variable
    pub(super) async fn control_variable(
        &self,
        record: &Record,
        variable: i64,
        operand: Option<String>,
        state: &mut PageState,
    ) -> MtResult<Record> {
        let config = self.config();
        let mut out = record.clone();
        let Some(operand) = operand else {
            return Ok(out);
        };
        if !config.variables.assign_ids.contains(&variable)
            || operand.contains('■')
            || operand.contains('_')
        {
            return Ok(out);
        }
        let Some(literal) = QUOTED_RE
            .captures(&operand)
            .map(|caps| caps[1].replace("\\n", " "))
        else {
            return Ok(out);
        };
        if !has_source_text(&literal) {
            return Ok(out);
        }

        let note = notes::npc_name(self.language());
        let translated = self.translate(state, &literal, History::note(note), false).await?;
        let translated = strip_all(&translated, &[".", "\"", "\\n"]);
        let wrapped = fill(&translated, config.list_width).replace('\n', "\\n");
        out.set_str(4, format!("\"{wrapped}\""))?;
        Ok(out)
    }

    /// 111: `$gameVariables.value(<id>) == '...'` comparisons
    pub(super) async fn conditional_script(
        &self,
        record: &Record,
        strings: Vec<(usize, String)>,
        state: &mut PageState,
    ) -> MtResult<Record> {
        let script_id = self.config().variables.script_id.as_str();
        let mut out = record.clone();

        for (index, script) in strings {
            if !script.contains("$gameVariables") || !script.contains(script_id) {
                continue;
            }
            let literals: Vec<String> = SINGLE_QUOTED_RE
                .captures_iter(&script)
                .map(|caps| caps[1].to_string())
                .filter(|literal| has_source_text(literal))
                .collect();
            if literals.is_empty() {
                continue;
            }

            let mut rewritten = script.clone();
            for literal in literals {
                let translated = self.translate(state, &literal, History::none(), false).await?;
                let translated = strip_all(&translated, &[".", "\"", "'", "\\n"]);
                rewritten = rewritten.replace(&literal, &translated);
            }
            out.set_str(index, rewritten)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::super::test_support::extractor;
    use crate::mock::{MockMode, MockModel};
    use crate::progress::NoProgress;
    use rpgtl::event::codes;
    use rpgtl::{Page, Record, TranslationConfig};

    fn config() -> TranslationConfig {
        let mut config = TranslationConfig::default();
        config.codes.variables = true;
        config.codes.conditional_script = true;
        config
    }

    async fn run_one(model: Arc<MockModel>, record: Record) -> Record {
        let (page, _) = extractor(model, config())
            .translate_page(Page::new(vec![record]), &NoProgress)
            .await
            .unwrap();
        page.records.into_iter().next().unwrap()
    }

    fn assignment(variable: i64, operand: &str) -> Record {
        Record::new(
            codes::CONTROL_VARIABLES,
            vec![json!(variable), json!(variable), json!(0), json!(4), json!(operand)],
        )
    }

    #[tokio::test]
    async fn test_assignment_literal_translated() {
        let model = Arc::new(MockModel::with_mappings([("ゴブリン", "Goblin.")]));
        let out = run_one(model, assignment(327, "'ゴブリン'")).await;
        assert_eq!(out.str_param(4), Some("\"Goblin\""));
    }

    #[tokio::test]
    async fn test_assignment_to_other_variable_untouched() {
        let model = Arc::new(MockModel::new(MockMode::Echo));
        let out = run_one(model.clone(), assignment(12, "'ゴブリン'")).await;
        assert_eq!(out.str_param(4), Some("'ゴブリン'"));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_conditional_script_literal() {
        let model = Arc::new(MockModel::with_mappings([("剣", "Sword")]));
        let record = Record::new(
            codes::CONDITIONAL_BRANCH,
            vec![json!(12), json!("$gameVariables.value(1045) == '剣'")],
        );
        let out = run_one(model, record).await;
        assert_eq!(
            out.str_param(1),
            Some("$gameVariables.value(1045) == 'Sword'")
        );
        assert_eq!(out.parameters[0], json!(12));
    }

    #[tokio::test]
    async fn test_conditional_script_other_variable() {
        let model = Arc::new(MockModel::new(MockMode::Echo));
        let record = Record::new(
            codes::CONDITIONAL_BRANCH,
            vec![json!(12), json!("$gameVariables.value(7) == '剣'")],
        );
        let out = run_one(model.clone(), record).await;
        assert_eq!(out.str_param(1), Some("$gameVariables.value(7) == '剣'"));
        assert_eq!(model.calls(), 0);
    }
}
