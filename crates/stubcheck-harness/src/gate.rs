//! Exit-code gates for harness runs.

use serde::{Deserialize, Serialize};
use stubcheck_core::{ReconciliationReport, RunSummary};

/// Which gate rule applies to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Pass if anything succeeded, or if nothing failed.
    Lenient,

    /// Pass only if nothing failed or timed out.
    Strict,
}

/// Gate evaluation verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// Offending jobs or targets (may be non-empty on a lenient pass).
    pub violations: Vec<String>,

    /// Summary message.
    pub message: String,
}

impl GateVerdict {
    pub fn exit_code(&self) -> i32 {
        if self.passed {
            0
        } else {
            1
        }
    }
}

/// Gate rules.
pub struct RunGate;

impl RunGate {
    /// Evaluate a generate or validate run.
    pub fn evaluate(summary: &RunSummary, mode: GateMode) -> GateVerdict {
        let violations: Vec<String> = summary
            .failures()
            .into_iter()
            .map(|(path, _)| path.to_string())
            .collect();
        let failures = summary.failure_count();

        let passed = match mode {
            GateMode::Lenient => summary.success > 0 || failures == 0,
            GateMode::Strict => failures == 0,
        };

        let message = if failures == 0 {
            format!("all {} job(s) passed or were skipped", summary.total)
        } else if passed {
            format!(
                "{} of {} job(s) failed; {} succeeded",
                failures, summary.total, summary.success
            )
        } else {
            format!("{} of {} job(s) failed", failures, summary.total)
        };

        GateVerdict {
            passed,
            violations,
            message,
        }
    }

    /// Evaluate a reconciled build log: fail if any target failed.
    pub fn evaluate_log(report: &ReconciliationReport) -> GateVerdict {
        let violations: Vec<String> = report.result.failed.iter().cloned().collect();
        let passed = violations.is_empty();
        let message = if passed {
            format!("{} target(s) built", report.result.successful.len())
        } else {
            format!("{} target(s) failed to build", violations.len())
        };
        GateVerdict {
            passed,
            violations,
            message,
        }
    }
}
