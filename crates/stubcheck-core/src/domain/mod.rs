//! Domain models for stubcheck.
//!
//! - `InputFile` / `JobDescriptor`: what a job processes and where it writes
//! - `InvocationResult` / `JobOutcome`: what happened to it
//! - `RunSummary`: what happened to all of them

pub mod error;
pub mod job;
pub mod outcome;
pub mod summary;

pub use error::{Result, StubcheckError};
pub use job::{
    generic_path, plan_jobs, InputFile, JobDescriptor, ProjectFragment, SEGMENT_DELIMITER,
    TARGET_SUFFIX,
};
pub use outcome::{
    ArtifactSet, InvocationResult, InvocationStatus, JobOutcome, JobRecord, SkipReason, Stage,
};
pub use summary::{RunAggregator, RunSummary};
