//! stubcheck core: the data model and pure logic of the generator test
//! harness.
//!
//! Process execution and scheduling live in `stubcheck-harness`; this crate
//! owns everything that can be decided without spawning a process:
//! - corpus scanning and job identity
//! - outcome classification
//! - build descriptor synthesis
//! - build-log reconciliation
//! - configuration, reports and tracing setup

pub mod buildgen;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod obs;
pub mod reconcile;
pub mod reporting;
pub mod scanner;
pub mod telemetry;

pub use domain::{
    generic_path, plan_jobs, ArtifactSet, InputFile, InvocationResult, InvocationStatus,
    JobDescriptor, JobOutcome, JobRecord, ProjectFragment, Result, RunAggregator, RunSummary,
    SkipReason, Stage, StubcheckError,
};

pub use buildgen::{AggregatorDescriptor, LeafProject, WrittenAggregator, DESCRIPTOR_FILE};
pub use classify::{
    apply_empty_marker, classify_compilation, classify_generation, probe_artifacts,
};
pub use config::{HarnessConfig, StubSelection, ALL_GROUPS, DEFAULT_CONFIG_FILE};
pub use reconcile::{
    load_stub_list, percent, LogReconciler, LogReconciliation, LogStyle, PatternSpec, Signal,
};
pub use reporting::{
    read_run_report_json, write_run_report_json, AggregatorArtifact, ReconciliationReport,
    RunReport, RUN_REPORT_FILE,
};
pub use obs::{
    emit_job_finished, emit_log_reconciled, emit_report_error, emit_run_finished,
    emit_run_started, run_span,
};
pub use scanner::{filter_inputs, scan_corpus, select_stubs};
pub use telemetry::init_tracing;

/// stubcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
