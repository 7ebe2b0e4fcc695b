//! Per-file result lines and the run summary

use std::time::Duration;

use rpgtl::Pricing;

use crate::runner::FileOutcome;
use crate::tokens::TokenUsage;

const SUCCESS: &str = "✓";
const FAILURE: &str = "✗";

fn counters(usage: TokenUsage, pricing: &Pricing, elapsed: Duration) -> String {
    format!(
        "[Input: {}][Output: {}][Cost: ${:.4}][{:.1}s]",
        usage.input,
        usage.output,
        usage.cost(pricing),
        elapsed.as_secs_f64()
    )
}

/// `Map001.json: [Input: 120][Output: 240][Cost: $0.0006][1.2s] ✓`
pub fn file_line(outcome: &FileOutcome, pricing: &Pricing) -> String {
    let status = match &outcome.error {
        None => SUCCESS.to_string(),
        Some(err) => format!("{FAILURE} {err}"),
    };
    format!(
        "{}: {} {status}",
        outcome.file_name(),
        counters(outcome.usage, pricing, outcome.elapsed)
    )
}

/// Aggregate over every file of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub usage: TokenUsage,
    pub elapsed: Duration,
    pub files: usize,
    pub failed: usize,
    /// Files with at least one batch mismatch, in run order
    pub mismatches: Vec<String>,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[FileOutcome]) -> Self {
        let mut summary = RunSummary {
            files: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            summary.usage += outcome.usage;
            summary.elapsed += outcome.elapsed;
            if !outcome.succeeded() {
                summary.failed += 1;
            }
            if outcome.mismatch {
                summary.mismatches.push(outcome.file_name());
            }
        }
        summary
    }

    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }

    /// The `TOTAL` line followed by the mismatch list
    pub fn render(&self, pricing: &Pricing) -> String {
        let glyph = if self.succeeded() { SUCCESS } else { FAILURE };
        format!(
            "TOTAL: {} {glyph} ({}/{} files)\nMismatch Errors: [{}]",
            counters(self.usage, pricing, self.elapsed),
            self.files - self.failed,
            self.files,
            self.mismatches.join(", ")
        )
    }
}
