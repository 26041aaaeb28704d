//! Job scheduling and run aggregation.
//!
//! Jobs run concurrently on a bounded pool. Each job owns its output
//! directory, so workers share nothing but the invoker. Completed records are
//! reduced by a single consumer loop that owns the aggregator and the
//! progress sink; the final summary is put back into corpus order before the
//! aggregator build descriptor is written.

use crate::gate::GateMode;
use crate::progress::ProgressSink;
use crate::runner::Invoker;
use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use stubcheck_core::buildgen::{load_template, remove_stale, DEFAULT_TEMPLATE};
use stubcheck_core::reporting::SCHEMA_VERSION;
use stubcheck_core::{
    apply_empty_marker, classify_compilation, classify_generation, emit_job_finished,
    emit_report_error, emit_run_finished, emit_run_started, probe_artifacts, run_span,
    write_run_report_json, AggregatorArtifact, AggregatorDescriptor, HarnessConfig, JobDescriptor,
    JobOutcome, JobRecord, LeafProject, Result, RunAggregator, RunReport, RunSummary, Stage,
    DESCRIPTOR_FILE,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// What a run does with each job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Generate only.
    Generate,

    /// Generate, then compile-check every successful job.
    Validate,
}

impl RunMode {
    pub fn name(&self) -> &'static str {
        match self {
            RunMode::Generate => "generate",
            RunMode::Validate => "validate",
        }
    }

    pub fn compiles(&self) -> bool {
        matches!(self, RunMode::Validate)
    }

    pub fn gate_mode(&self) -> GateMode {
        match self {
            RunMode::Generate => GateMode::Lenient,
            RunMode::Validate => GateMode::Strict,
        }
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub mode: RunMode,
    pub corpus_root: PathBuf,
    pub output_root: PathBuf,

    /// Maximum jobs in flight.
    pub jobs: usize,

    pub candidate_suffixes: Vec<String>,
    pub empty_marker: Option<String>,
    pub max_error_lines: usize,

    /// Write leaf and aggregator build descriptors.
    pub build_files: bool,
    pub include_fallback: String,
    pub aggregator_template: String,

    /// Write `stubcheck-summary.json` into the output root.
    pub write_report: bool,
}

impl PipelineOptions {
    pub fn from_config(
        config: &HarnessConfig,
        mode: RunMode,
        corpus_root: &Path,
        output_root: &Path,
    ) -> Result<Self> {
        let aggregator_template = if config.build.enabled {
            load_template(config.build.aggregator_template.as_deref())?
        } else {
            DEFAULT_TEMPLATE.to_string()
        };
        Ok(Self {
            mode,
            corpus_root: corpus_root.to_path_buf(),
            output_root: output_root.to_path_buf(),
            jobs: config.jobs,
            candidate_suffixes: config.generator.candidate_suffixes.clone(),
            empty_marker: config.generator.empty_marker.clone(),
            max_error_lines: config.compiler.max_error_lines,
            build_files: config.build.enabled,
            include_fallback: config.build.include_fallback.clone(),
            aggregator_template,
            write_report: true,
        })
    }
}

/// Runs a planned set of jobs against an [`Invoker`].
pub struct StubPipeline {
    invoker: Arc<dyn Invoker>,
    options: Arc<PipelineOptions>,
}

impl StubPipeline {
    pub fn new(invoker: Arc<dyn Invoker>, options: PipelineOptions) -> Self {
        Self {
            invoker,
            options: Arc::new(options),
        }
    }

    /// Execute every job and return the run report.
    ///
    /// Per-job problems never fail the run; only output-root I/O errors do.
    pub async fn run(
        &self,
        jobs: Vec<JobDescriptor>,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id, jobs, progress)
            .instrument(run_span(&run_id.to_string()))
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        jobs: Vec<JobDescriptor>,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let start = Instant::now();
        let opts = &self.options;
        let total = jobs.len();
        let concurrency = opts.jobs.max(1);

        std::fs::create_dir_all(&opts.output_root)?;
        emit_run_started(&run_id.to_string(), opts.mode.name(), total, concurrency);
        progress.run_started(total);

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut join_set = JoinSet::new();
        let mut pending = HashMap::with_capacity(total);
        for job in jobs {
            let identity = PendingJob::of(&job);
            let invoker = Arc::clone(&self.invoker);
            let options = Arc::clone(&self.options);
            let semaphore = Arc::clone(&semaphore);
            let handle = join_set.spawn(
                async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    execute_job(invoker.as_ref(), &options, job).await
                }
                .in_current_span(),
            );
            pending.insert(handle.id(), identity);
        }

        let mut aggregator = RunAggregator::new();
        while let Some(joined) = join_set.join_next_with_id().await {
            let record = match joined {
                Ok((id, record)) => {
                    pending.remove(&id);
                    record
                }
                Err(e) => match pending.remove(&e.id()) {
                    Some(job) => {
                        warn!(job = %job.rel_path, error = %e, "job task did not complete");
                        job.into_lost_record(&e)
                    }
                    None => {
                        warn!(error = %e, "unknown job task did not complete");
                        continue;
                    }
                },
            };
            progress.job_finished(aggregator.completed() + 1, total, &record);
            emit_job_finished(&record);
            aggregator.record(record);
        }
        let summary = aggregator.finish();

        let aggregator_artifact = if opts.build_files {
            self.write_aggregator(&summary)?
        } else {
            None
        };

        let report = RunReport {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id,
            mode: opts.mode.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            corpus_root: opts.corpus_root.clone(),
            output_root: opts.output_root.clone(),
            summary,
            aggregator: aggregator_artifact,
        };

        emit_run_finished(
            &run_id.to_string(),
            start.elapsed().as_millis() as u64,
            report.summary.success,
            report.summary.failure_count(),
        );

        if opts.write_report {
            if let Err(e) = write_run_report_json(&report.default_path(), &report) {
                emit_report_error(&run_id.to_string(), &e);
            }
        }
        Ok(report)
    }

    fn write_aggregator(&self, summary: &RunSummary) -> Result<Option<AggregatorArtifact>> {
        let root = &self.options.output_root;
        let leaf_dirs = summary.leaf_dirs();
        if leaf_dirs.is_empty() {
            remove_stale(root)?;
            info!(output = %root.display(), "no leaf projects; aggregator removed");
            return Ok(None);
        }
        let written = AggregatorDescriptor::new(root, &leaf_dirs)
            .write(&self.options.aggregator_template)?;
        info!(
            path = %written.path.display(),
            children = written.children,
            digest = %written.digest,
            "aggregator written"
        );
        Ok(Some(AggregatorArtifact {
            path: written.path,
            digest: written.digest,
            children: written.children,
        }))
    }
}

/// Identity of a spawned job, kept outside its task so a task that never
/// yields a record still gets one.
#[derive(Debug, Clone)]
struct PendingJob {
    ordinal: usize,
    rel_path: String,
    fragment: String,
}

impl PendingJob {
    fn of(job: &JobDescriptor) -> Self {
        Self {
            ordinal: job.ordinal,
            rel_path: job.rel_path(),
            fragment: job.fragment.to_string(),
        }
    }

    fn into_lost_record(self, cause: &dyn std::fmt::Display) -> JobRecord {
        JobRecord {
            ordinal: self.ordinal,
            rel_path: self.rel_path,
            fragment: self.fragment,
            outcome: JobOutcome::Failed {
                stage: Stage::Generation,
                message: format!("job task did not complete: {}", cause),
            },
            duration_ms: 0,
            leaf_dir: None,
        }
    }
}

/// Run one job to its final record. Panics inside the job become a failure.
async fn execute_job(
    invoker: &dyn Invoker,
    options: &PipelineOptions,
    job: JobDescriptor,
) -> JobRecord {
    let start = Instant::now();
    let (outcome, leaf_dir) = match AssertUnwindSafe(process_job(invoker, options, &job))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => (
            JobOutcome::Failed {
                stage: Stage::Generation,
                message: format!("job panicked: {}", panic_message(panic.as_ref())),
            },
            None,
        ),
    };

    JobRecord {
        ordinal: job.ordinal,
        rel_path: job.rel_path(),
        fragment: job.fragment.to_string(),
        outcome,
        duration_ms: start.elapsed().as_millis() as u64,
        leaf_dir,
    }
}

async fn process_job(
    invoker: &dyn Invoker,
    options: &PipelineOptions,
    job: &JobDescriptor,
) -> (JobOutcome, Option<PathBuf>) {
    if let Err(e) = prepare_job_dir(job, &options.candidate_suffixes) {
        return (
            JobOutcome::Failed {
                stage: Stage::Generation,
                message: format!("cannot prepare {}: {}", job.job_dir.display(), e),
            },
            None,
        );
    }

    let generated = invoker.generate(job).await;
    debug!(
        job = %job.rel_path(),
        status = ?generated.status,
        duration_ms = generated.duration.as_millis() as u64,
        "generator finished"
    );
    let artifacts = probe_artifacts(job, &options.candidate_suffixes);
    let outcome = apply_empty_marker(
        classify_generation(&generated, artifacts),
        options.empty_marker.as_deref(),
    );
    let artifacts = match outcome {
        JobOutcome::Success { artifacts } => artifacts,
        other => return (other, None),
    };

    let artifacts = if options.mode.compiles() {
        let unit = match artifacts.compile_unit() {
            Some(unit) => unit.to_path_buf(),
            None => {
                return (
                    JobOutcome::Failed {
                        stage: Stage::Compilation,
                        message: "no compilable unit generated".to_string(),
                    },
                    None,
                )
            }
        };
        let compiled = invoker.compile(&unit, &[job.job_dir.clone()]).await;
        debug!(
            job = %job.rel_path(),
            unit = %unit.display(),
            status = ?compiled.status,
            "compiler finished"
        );
        match classify_compilation(&compiled, artifacts, options.max_error_lines) {
            JobOutcome::Success { artifacts } => artifacts,
            other => return (other, None),
        }
    } else {
        artifacts
    };

    if !options.build_files {
        return (JobOutcome::Success { artifacts }, None);
    }
    match LeafProject::for_job(job, &artifacts, &options.output_root, &options.include_fallback) {
        None => (JobOutcome::Success { artifacts }, None),
        Some(leaf) => match leaf.write() {
            Ok(_) => (JobOutcome::Success { artifacts }, Some(leaf.dir)),
            Err(e) => (
                JobOutcome::Failed {
                    stage: Stage::Descriptor,
                    message: format!("cannot write {}: {}", leaf.path().display(), e),
                },
                None,
            ),
        },
    }
}

/// Create the job directory and remove this job's own stale outputs.
fn prepare_job_dir(job: &JobDescriptor, suffixes: &[String]) -> std::io::Result<()> {
    std::fs::create_dir_all(&job.job_dir)?;
    let stale = suffixes
        .iter()
        .map(|s| job.artifact_path(s))
        .chain(std::iter::once(job.job_dir.join(DESCRIPTOR_FILE)));
    for path in stale {
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
