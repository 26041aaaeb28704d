//! Run-level aggregation.

use crate::domain::outcome::{JobOutcome, JobRecord};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Counts and per-job records for one pipeline run.
///
/// `records` is in corpus order (sorted relative input path, carried as the
/// job ordinal) regardless of the order in which jobs completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub records: Vec<JobRecord>,
}

impl RunSummary {
    /// `(relative path, message)` for every failed or timed-out job.
    pub fn failures(&self) -> Vec<(&str, String)> {
        self.records
            .iter()
            .filter(|r| r.outcome.is_failure())
            .map(|r| (r.rel_path.as_str(), r.outcome.message().unwrap_or_default()))
            .collect()
    }

    /// Relative paths of skipped jobs.
    pub fn skipped_paths(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.outcome.is_skipped())
            .map(|r| r.rel_path.as_str())
            .collect()
    }

    /// Failed plus timed out.
    pub fn failure_count(&self) -> usize {
        self.failed + self.timed_out
    }

    /// Sorted, deduplicated directories of every leaf descriptor written.
    pub fn leaf_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .records
            .iter()
            .filter(|r| r.outcome.is_success())
            .filter_map(|r| r.leaf_dir.clone())
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }

    /// Success rate as a percentage of all inputs.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64 * 100.0
        }
    }
}

/// Accumulates job records as they complete, in any order.
#[derive(Debug, Default)]
pub struct RunAggregator {
    summary: RunSummary,
}

impl RunAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed job.
    pub fn record(&mut self, record: JobRecord) {
        let s = &mut self.summary;
        s.total += 1;
        match &record.outcome {
            JobOutcome::Success { .. } => s.success += 1,
            JobOutcome::Skipped { .. } => s.skipped += 1,
            JobOutcome::Failed { .. } => s.failed += 1,
            JobOutcome::TimedOut { .. } => s.timed_out += 1,
        }
        s.records.push(record);
    }

    /// Number of jobs recorded so far.
    pub fn completed(&self) -> usize {
        self.summary.total
    }

    /// Restore corpus order and return the summary.
    pub fn finish(mut self) -> RunSummary {
        self.summary.records.sort_by_key(|r| r.ordinal);
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::{ArtifactSet, SkipReason, Stage};

    fn record(ordinal: usize, rel: &str, outcome: JobOutcome) -> JobRecord {
        JobRecord {
            ordinal,
            rel_path: rel.to_string(),
            fragment: rel.replace('/', "."),
            outcome,
            duration_ms: 1,
            leaf_dir: None,
        }
    }

    #[test]
    fn test_counts_partition_total() {
        let mut agg = RunAggregator::new();
        agg.record(record(3, "c.wit", JobOutcome::Skipped { reason: SkipReason::NoOutput }));
        agg.record(record(1, "a.wit", JobOutcome::Success { artifacts: ArtifactSet::default() }));
        agg.record(record(
            4,
            "d.wit",
            JobOutcome::Failed {
                stage: Stage::Generation,
                message: "parse error".to_string(),
            },
        ));
        agg.record(record(
            2,
            "b.wit",
            JobOutcome::TimedOut {
                stage: Stage::Generation,
                after_secs: 30,
            },
        ));
        let s = agg.finish();
        assert_eq!(s.total, 4);
        assert_eq!(s.success + s.skipped + s.failed + s.timed_out, s.total);
        assert_eq!(s.failure_count(), 2);
    }

    #[test]
    fn test_finish_restores_corpus_order() {
        let mut agg = RunAggregator::new();
        // Completion order differs from corpus order.
        for (ordinal, rel) in [(3, "z.wit"), (2, "b/a.wit"), (1, "a.wit")] {
            agg.record(record(ordinal, rel, JobOutcome::Skipped { reason: SkipReason::NoOutput }));
        }
        let s = agg.finish();
        let order: Vec<_> = s.records.iter().map(|r| r.rel_path.as_str()).collect();
        assert_eq!(order, vec!["a.wit", "b/a.wit", "z.wit"]);
    }

    #[test]
    fn test_failures_lists_paths_and_messages() {
        let mut agg = RunAggregator::new();
        agg.record(record(
            1,
            "d.wit",
            JobOutcome::Failed {
                stage: Stage::Generation,
                message: "parse error at line 4".to_string(),
            },
        ));
        agg.record(record(2, "e.wit", JobOutcome::Skipped { reason: SkipReason::NoOutput }));
        let s = agg.finish();
        assert_eq!(s.failures(), vec![("d.wit", "parse error at line 4".to_string())]);
        assert_eq!(s.skipped_paths(), vec!["e.wit"]);
    }

    #[test]
    fn test_leaf_dirs_sorted_and_deduplicated() {
        let mut agg = RunAggregator::new();
        let mut a = record(1, "b.wit", JobOutcome::Success { artifacts: ArtifactSet::default() });
        a.leaf_dir = Some(PathBuf::from("/out/b"));
        let mut b = record(2, "a.wit", JobOutcome::Success { artifacts: ArtifactSet::default() });
        b.leaf_dir = Some(PathBuf::from("/out/a"));
        let mut c = record(
            3,
            "c.wit",
            JobOutcome::Failed {
                stage: Stage::Compilation,
                message: "error".to_string(),
            },
        );
        c.leaf_dir = Some(PathBuf::from("/out/c"));
        agg.record(a);
        agg.record(b);
        agg.record(c);
        let s = agg.finish();
        assert_eq!(s.leaf_dirs(), vec![PathBuf::from("/out/a"), PathBuf::from("/out/b")]);
    }
}
