use crate::domain::{Result, RunSummary};
use crate::reconcile::LogReconciliation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the run report written into the output root.
pub const RUN_REPORT_FILE: &str = "stubcheck-summary.json";

pub const SCHEMA_VERSION: &str = "1.0";

/// The aggregator descriptor produced by a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregatorArtifact {
    pub path: PathBuf,
    pub digest: String,
    pub children: usize,
}

/// Persisted record of one generate or validate run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub schema_version: String,
    pub run_id: Uuid,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub corpus_root: PathBuf,
    pub output_root: PathBuf,
    pub summary: RunSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<AggregatorArtifact>,
}

impl RunReport {
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Default location inside the output root.
    pub fn default_path(&self) -> PathBuf {
        self.output_root.join(RUN_REPORT_FILE)
    }
}

/// Write a run report in pretty JSON format.
pub fn write_run_report_json(path: &Path, report: &RunReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn read_run_report_json(path: &Path) -> Result<RunReport> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Result of reconciling one build log, optionally against an expected list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub log_file: PathBuf,
    pub result: LogReconciliation,
    /// Expected stubs with no terminal signal in the log, in list order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_built: Vec<String>,
}

impl ReconciliationReport {
    pub fn new(log_file: &Path, result: LogReconciliation, expected: Option<&[String]>) -> Self {
        let not_built = expected
            .map(|e| result.missing(e).into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            log_file: log_file.to_path_buf(),
            result,
            not_built,
        }
    }

    /// Whether any target failed.
    pub fn has_failures(&self) -> bool {
        !self.result.failed.is_empty()
    }
}
