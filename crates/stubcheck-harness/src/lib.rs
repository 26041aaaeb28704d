//! stubcheck harness: runs the generator and compiler over a corpus.
//!
//! This crate provides:
//! - Isolated tool invocation with capture and timeouts (`runner`)
//! - Tool resolution and preflight checks (`tool`)
//! - Bounded-concurrency scheduling and aggregation (`pipeline`)
//! - Exit-code gates (`gate`)
//! - Console progress and summaries (`progress`)

pub mod gate;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod tool;

pub use gate::{GateMode, GateVerdict, RunGate};
pub use pipeline::{PipelineOptions, RunMode, StubPipeline};
pub use progress::{
    render_job_line, render_reconciliation, render_run_summary, ConsoleProgress, NullProgress,
    ProgressSink,
};
pub use runner::{run_tool, Invoker, ProcessInvoker};
pub use tool::{find_vcpkg_include, CompilerTool, GeneratorTool};
