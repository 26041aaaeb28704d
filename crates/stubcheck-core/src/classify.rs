//! Outcome classification.
//!
//! | exit status | artifacts found | outcome |
//! |---|---|---|
//! | zero | >= 1 | `Success` |
//! | zero | 0 | `Skipped` |
//! | non-zero / signal / spawn failure | any | `Failed` |
//! | timed out | any | `TimedOut` |

use crate::diagnostics::summarize_compiler_errors;
use crate::domain::{
    ArtifactSet, InvocationResult, InvocationStatus, JobDescriptor, JobOutcome, SkipReason, Stage,
};
use std::path::Path;

/// Collect the candidate artifacts that exist for `job`, in suffix order.
pub fn probe_artifacts(job: &JobDescriptor, candidate_suffixes: &[String]) -> ArtifactSet {
    let found = candidate_suffixes
        .iter()
        .map(|suffix| job.artifact_path(suffix))
        .filter(|p| p.is_file())
        .collect();
    ArtifactSet::new(found)
}

/// Classify a generator invocation.
pub fn classify_generation(result: &InvocationResult, artifacts: ArtifactSet) -> JobOutcome {
    decide(Stage::Generation, result, artifacts, generation_message)
}

/// Classify a compiler invocation against an already generated job.
pub fn classify_compilation(
    result: &InvocationResult,
    artifacts: ArtifactSet,
    max_error_lines: usize,
) -> JobOutcome {
    decide(Stage::Compilation, result, artifacts, |r| {
        let text = r.diagnostics();
        let summary = summarize_compiler_errors(&text, max_error_lines);
        if summary.is_empty() {
            generation_message(r)
        } else {
            summary
        }
    })
}

fn decide(
    stage: Stage,
    result: &InvocationResult,
    artifacts: ArtifactSet,
    message: impl Fn(&InvocationResult) -> String,
) -> JobOutcome {
    match &result.status {
        InvocationStatus::TimedOut { after_secs } => JobOutcome::TimedOut {
            stage,
            after_secs: *after_secs,
        },
        InvocationStatus::Exited { code: 0 } => {
            if artifacts.is_empty() {
                JobOutcome::Skipped {
                    reason: SkipReason::NoOutput,
                }
            } else {
                JobOutcome::Success { artifacts }
            }
        }
        _ => JobOutcome::Failed {
            stage,
            message: message(result),
        },
    }
}

/// Failure text for a non-zero generator exit: stderr, else stdout, else a
/// description of the exit status.
pub fn generation_message(result: &InvocationResult) -> String {
    let stderr = result.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = result.stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    match &result.status {
        InvocationStatus::Exited { code } => {
            let mut msg = format!("Process exited with code {}", code);
            if is_crash_code(*code) {
                msg.push_str(" (segmentation fault/access violation)");
            }
            msg
        }
        InvocationStatus::Signaled { signal } => {
            let mut msg = format!("Process terminated by signal {}", signal);
            if *signal == 11 {
                msg.push_str(" (segmentation fault)");
            }
            msg
        }
        InvocationStatus::SpawnFailed { message } => message.clone(),
        InvocationStatus::TimedOut { after_secs } => format!("Timed out after {}s", after_secs),
    }
}

fn is_crash_code(code: i32) -> bool {
    // 128 + SIGSEGV from a shell, or Windows STATUS_ACCESS_VIOLATION.
    code == 139 || code == -1073741819 || code as u32 == 3221225477
}

/// Downgrade a `Success` to `Skipped{EmptyStub}` when the primary header
/// carries `marker`.
pub fn apply_empty_marker(outcome: JobOutcome, marker: Option<&str>) -> JobOutcome {
    let marker = match marker {
        Some(m) if !m.is_empty() => m,
        _ => return outcome,
    };
    match &outcome {
        JobOutcome::Success { artifacts } => match artifacts.primary_header() {
            Some(header) if contains_marker(header, marker) => JobOutcome::Skipped {
                reason: SkipReason::EmptyStub,
            },
            _ => outcome,
        },
        _ => outcome,
    }
}

fn contains_marker(path: &Path, marker: &str) -> bool {
    std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).contains(marker))
        .unwrap_or(false)
}
