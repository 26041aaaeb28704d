//! Structured lifecycle events for harness runs.
//!
//! Each event is a single `info!` (or `warn!`) line carrying an `event`
//! field, so runs can be followed in JSON logs without parsing messages.

use crate::domain::JobRecord;
use crate::reconcile::LogReconciliation;
use tracing::{info, warn, Span};

/// Span that tags every event inside one run with its id.
///
/// Attach it to the run future with `Instrument`; an entered guard must not
/// be held across an await.
pub fn run_span(run_id: &str) -> Span {
    tracing::info_span!("stubcheck.run", run_id = %run_id)
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, mode: &str, total_jobs: usize, concurrency: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        mode = %mode,
        total_jobs = total_jobs,
        concurrency = concurrency,
    );
}

/// Emit event: one job reached its final outcome.
pub fn emit_job_finished(record: &JobRecord) {
    let status = if record.outcome.is_success() {
        "success"
    } else if record.outcome.is_skipped() {
        "skipped"
    } else {
        "failed"
    };
    if record.outcome.is_failure() {
        warn!(
            event = "job.finished",
            job = %record.rel_path,
            status = status,
            duration_ms = record.duration_ms,
            message = %record.outcome.message().unwrap_or_default(),
        );
    } else {
        info!(
            event = "job.finished",
            job = %record.rel_path,
            status = status,
            duration_ms = record.duration_ms,
        );
    }
}

/// Emit event: run finished.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, success: usize, failures: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        success = success,
        failures = failures,
    );
}

/// Emit event: a build log was reconciled.
pub fn emit_log_reconciled(source: &str, result: &LogReconciliation) {
    info!(
        event = "log.reconciled",
        source = %source,
        successful = result.successful.len(),
        failed = result.failed.len(),
        interrupted = result.interrupted.len(),
    );
}

/// Emit event: the run report could not be written (warning level).
pub fn emit_report_error(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.report_error", run_id = %run_id, error = %error);
}
