//! Invocation results, artifact sets and job outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pipeline stage an outcome is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Running the external generator.
    Generation,

    /// Compile-checking a generated unit.
    Compilation,

    /// Writing the job's leaf build descriptor.
    Descriptor,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Generation => "generation",
            Stage::Compilation => "compilation",
            Stage::Descriptor => "descriptor",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an external process invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationStatus {
    /// Process exited normally with a code.
    Exited { code: i32 },

    /// Process was terminated by a signal (unix).
    Signaled { signal: i32 },

    /// Wall-clock limit elapsed; the process was killed.
    TimedOut { after_secs: u64 },

    /// The process could not be started at all.
    SpawnFailed { message: String },
}

impl InvocationStatus {
    /// Whether the process exited with code zero.
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationStatus::Exited { code: 0 })
    }
}

/// Captured result of one generator or compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub status: InvocationStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl InvocationResult {
    /// A clean zero exit with no output.
    pub fn ok() -> Self {
        Self::exited(0, "")
    }

    /// A normal exit with the given code and stderr text.
    pub fn exited(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: InvocationStatus::Exited { code },
            stdout: String::new(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
        }
    }

    /// A timed-out invocation.
    pub fn timed_out(after: Duration) -> Self {
        Self {
            status: InvocationStatus::TimedOut {
                after_secs: after.as_secs(),
            },
            stdout: String::new(),
            stderr: String::new(),
            duration: after,
        }
    }

    /// An invocation whose process never started.
    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self {
            status: InvocationStatus::SpawnFailed {
                message: message.into(),
            },
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }

    /// Combined diagnostic text, stderr first.
    pub fn diagnostics(&self) -> String {
        match (self.stderr.trim().is_empty(), self.stdout.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stderr.trim_end(), self.stdout.trim_end()),
            (false, true) => self.stderr.trim_end().to_string(),
            (true, false) => self.stdout.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Generated files that exist after an invocation, in candidate order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSet(Vec<PathBuf>);

const SOURCE_EXTENSIONS: &[&str] = &["cpp", "cc", "cxx", "c"];
const HEADER_EXTENSIONS: &[&str] = &["hpp", "hh", "hxx", "h"];

impl ArtifactSet {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self(paths)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    /// Compilable implementation units.
    pub fn sources(&self) -> Vec<&Path> {
        self.with_extension(SOURCE_EXTENSIONS)
    }

    /// Header files.
    pub fn headers(&self) -> Vec<&Path> {
        self.with_extension(HEADER_EXTENSIONS)
    }

    /// The first header in candidate order.
    pub fn primary_header(&self) -> Option<&Path> {
        self.headers().into_iter().next()
    }

    /// Unit to hand to the compiler: the first source, else the primary header.
    pub fn compile_unit(&self) -> Option<&Path> {
        self.sources()
            .into_iter()
            .next()
            .or_else(|| self.primary_header())
    }

    /// Comma-separated file names, for progress output.
    pub fn file_names(&self) -> String {
        self.0
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn with_extension(&self, exts: &[&str]) -> Vec<&Path> {
        self.0
            .iter()
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| exts.contains(&e))
                    .unwrap_or(false)
            })
            .map(PathBuf::as_path)
            .collect()
    }
}

/// Why a job produced nothing worth building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The generator exited cleanly without writing any candidate file.
    NoOutput,

    /// Output exists but is marked as having no concrete definitions.
    EmptyStub,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::NoOutput => "no output",
            SkipReason::EmptyStub => "empty stub",
        }
    }
}

/// Final classification of one job. Exactly one per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Success { artifacts: ArtifactSet },
    Skipped { reason: SkipReason },
    Failed { stage: Stage, message: String },
    TimedOut { stage: Stage, after_secs: u64 },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, JobOutcome::Skipped { .. })
    }

    /// Failed or timed out.
    pub fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. } | JobOutcome::TimedOut { .. })
    }

    /// Human-readable message for non-success outcomes.
    pub fn message(&self) -> Option<String> {
        match self {
            JobOutcome::Success { .. } => None,
            JobOutcome::Skipped { reason } => Some(reason.describe().to_string()),
            JobOutcome::Failed { message, .. } => Some(message.clone()),
            JobOutcome::TimedOut { stage, after_secs } => {
                Some(format!("{} timed out after {}s", stage, after_secs))
            }
        }
    }
}

/// The outcome of one job together with its identity, as aggregated into a
/// run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub ordinal: usize,
    pub rel_path: String,
    pub fragment: String,
    pub outcome: JobOutcome,
    pub duration_ms: u64,

    /// Directory holding this job's leaf build descriptor, if one was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_dir: Option<PathBuf>,
}
