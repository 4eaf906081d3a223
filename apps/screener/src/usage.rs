//! Token and cost accounting.
//!
//! The ledger is an explicit accumulator: callers create one per batch, pass
//! it into each stage invocation, and render the summary at the end. There is
//! no global counter state.

use std::fmt::Write as _;

use crate::llm_client::TokenUsage;

/// Cost per 1K tokens, same rate for every stage.
const INPUT_COST_PER_1K: f64 = 0.0005;
const OUTPUT_COST_PER_1K: f64 = 0.0015;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageUsage {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl StageUsage {
    pub fn cost(&self) -> f64 {
        (self.input_tokens as f64 * INPUT_COST_PER_1K
            + self.output_tokens as f64 * OUTPUT_COST_PER_1K)
            / 1000.0
    }
}

/// Per-stage call and token counters, in stage execution order.
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    stages: Vec<(&'static str, StageUsage)>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: &'static str, usage: &TokenUsage) {
        let idx = match self.stages.iter().position(|(name, _)| *name == stage) {
            Some(idx) => idx,
            None => {
                self.stages.push((stage, StageUsage::default()));
                self.stages.len() - 1
            }
        };
        let entry = &mut self.stages[idx].1;
        entry.calls += 1;
        entry.input_tokens += usage.input_tokens;
        entry.output_tokens += usage.output_tokens;
    }

    pub fn stage(&self, name: &str) -> StageUsage {
        self.stages
            .iter()
            .find(|(stage, _)| *stage == name)
            .map(|(_, usage)| *usage)
            .unwrap_or_default()
    }

    pub fn total(&self) -> StageUsage {
        self.stages.iter().fold(
            StageUsage::default(),
            |acc, (_, usage)| StageUsage {
                calls: acc.calls + usage.calls,
                input_tokens: acc.input_tokens + usage.input_tokens,
                output_tokens: acc.output_tokens + usage.output_tokens,
            },
        )
    }

    /// Renders the token and cost summary table printed after a batch.
    pub fn summary_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "==================== TOKEN & COST SUMMARY ===================="
        );
        let _ = writeln!(
            out,
            "{:<28}{:>7}{:>12}{:>12}{:>12}",
            "Stage", "Calls", "Input", "Output", "Cost($)"
        );
        let _ = writeln!(out, "{}", "-".repeat(71));
        for (name, usage) in &self.stages {
            let _ = writeln!(
                out,
                "{:<28}{:>7}{:>12}{:>12}{:>12.4}",
                name,
                usage.calls,
                usage.input_tokens,
                usage.output_tokens,
                usage.cost()
            );
        }
        let total = self.total();
        let _ = writeln!(out, "{}", "-".repeat(71));
        let _ = writeln!(
            out,
            "{:<28}{:>7}{:>12}{:>12}{:>12.4}",
            "TOTAL",
            total.calls,
            total.input_tokens,
            total.output_tokens,
            total.cost()
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates_per_stage() {
        let mut ledger = UsageLedger::new();
        ledger.record(
            "resume_parsing",
            &TokenUsage {
                input_tokens: 100,
                output_tokens: 40,
            },
        );
        ledger.record(
            "resume_parsing",
            &TokenUsage {
                input_tokens: 50,
                output_tokens: 10,
            },
        );

        let usage = ledger.stage("resume_parsing");
        assert_eq!(usage.calls, 2);
        assert_eq!(usage.input_tokens, 150);
        assert_eq!(usage.output_tokens, 50);
    }

    #[test]
    fn test_cost_uses_per_1k_rates() {
        let usage = StageUsage {
            calls: 1,
            input_tokens: 2000,
            output_tokens: 1000,
        };
        // 2000 * 0.0005/1K + 1000 * 0.0015/1K
        assert!((usage.cost() - 0.0025).abs() < 1e-9);
    }

    #[test]
    fn test_total_sums_all_stages() {
        let mut ledger = UsageLedger::new();
        ledger.record(
            "job_requirements",
            &TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        );
        ledger.record(
            "audit",
            &TokenUsage {
                input_tokens: 20,
                output_tokens: 15,
            },
        );

        let total = ledger.total();
        assert_eq!(total.calls, 2);
        assert_eq!(total.input_tokens, 30);
        assert_eq!(total.output_tokens, 20);
    }

    #[test]
    fn test_summary_table_preserves_execution_order() {
        let mut ledger = UsageLedger::new();
        ledger.record("job_requirements", &TokenUsage::default());
        ledger.record("audit", &TokenUsage::default());

        let table = ledger.summary_table();
        let jd_pos = table.find("job_requirements").unwrap();
        let audit_pos = table.find("audit").unwrap();
        assert!(jd_pos < audit_pos);
        assert!(table.contains("TOTAL"));
    }

    #[test]
    fn test_unknown_stage_reads_as_zero() {
        let ledger = UsageLedger::new();
        assert_eq!(ledger.stage("nonexistent"), StageUsage::default());
    }
}
