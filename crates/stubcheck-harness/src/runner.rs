//! Isolated tool invocation.
//!
//! Every invocation is a separate child process with captured output and a
//! deadline. Nothing that happens to the child is an error for the caller:
//! spawn failures, non-zero exits, signals and timeouts all come back as an
//! [`InvocationResult`].

use crate::tool::{CompilerTool, GeneratorTool};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use stubcheck_core::{InvocationResult, InvocationStatus, JobDescriptor};
use tokio::process::Command;
use tracing::debug;

/// The seam between scheduling and process execution.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Run the generator for one job.
    async fn generate(&self, job: &JobDescriptor) -> InvocationResult;

    /// Compile-check one generated unit with additional include paths.
    async fn compile(&self, unit: &Path, include_dirs: &[PathBuf]) -> InvocationResult;
}

/// Run `program` with `args`, capturing output, killing it after `timeout`.
pub async fn run_tool(program: &Path, args: &[OsString], timeout: Duration) -> InvocationResult {
    let start = Instant::now();

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(c) => c,
        Err(e) => {
            return InvocationResult::spawn_failed(format!(
                "failed to start {}: {}",
                program.display(),
                e
            ))
        }
    };

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return InvocationResult::spawn_failed(format!(
                "failed waiting for {}: {}",
                program.display(),
                e
            ))
        }
        Err(_) => {
            debug!(program = %program.display(), timeout_secs = timeout.as_secs(), "invocation timed out");
            return InvocationResult::timed_out(timeout);
        }
    };

    InvocationResult {
        status: exit_status(output.status),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration: start.elapsed(),
    }
}

fn exit_status(status: ExitStatus) -> InvocationStatus {
    if let Some(code) = status.code() {
        return InvocationStatus::Exited { code };
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return InvocationStatus::Signaled { signal };
        }
    }
    InvocationStatus::Exited { code: -1 }
}

/// Invoker backed by real child processes.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    generator: GeneratorTool,
    compiler: Option<CompilerTool>,
}

impl ProcessInvoker {
    pub fn new(generator: GeneratorTool) -> Self {
        Self {
            generator,
            compiler: None,
        }
    }

    pub fn with_compiler(mut self, compiler: CompilerTool) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn compiler(&self) -> Option<&CompilerTool> {
        self.compiler.as_ref()
    }
}

#[async_trait]
impl Invoker for ProcessInvoker {
    async fn generate(&self, job: &JobDescriptor) -> InvocationResult {
        let args = self.generator.args(job);
        run_tool(&self.generator.program, &args, self.generator.timeout).await
    }

    async fn compile(&self, unit: &Path, include_dirs: &[PathBuf]) -> InvocationResult {
        match &self.compiler {
            Some(compiler) => {
                let args = compiler.args(unit, include_dirs);
                run_tool(&compiler.program, &args, compiler.timeout).await
            }
            None => InvocationResult::spawn_failed("no compiler configured"),
        }
    }
}
