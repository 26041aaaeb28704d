//! Console narration of runs.
//!
//! The pipeline reports each completed job to a [`ProgressSink`] from a
//! single consumer loop, so implementations never see concurrent calls.

use colored::Colorize;
use stubcheck_core::diagnostics::truncate_lines;
use stubcheck_core::{JobOutcome, JobRecord, ReconciliationReport, RunReport};

/// Diagnostic lines shown per failure unless verbose.
pub const DEFAULT_DIAGNOSTIC_LINES: usize = 3;

const RULE_WIDTH: usize = 60;

/// Receives per-job progress in completion order.
pub trait ProgressSink: Send {
    fn run_started(&mut self, _total: usize) {}

    fn job_finished(&mut self, done: usize, total: usize, record: &JobRecord);
}

/// Discards progress.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn job_finished(&mut self, _done: usize, _total: usize, _record: &JobRecord) {}
}

/// Status glyphs. Plain ASCII on Windows consoles.
#[derive(Debug, Clone, Copy)]
pub struct Glyphs {
    pub ok: &'static str,
    pub fail: &'static str,
    pub skip: &'static str,
}

pub fn glyphs() -> Glyphs {
    if cfg!(windows) {
        Glyphs {
            ok: "OK",
            fail: "FAIL",
            skip: "SKIP",
        }
    } else {
        Glyphs {
            ok: "✓",
            fail: "✗",
            skip: "⊘",
        }
    }
}

/// Prints one line per job to stdout.
pub struct ConsoleProgress {
    verbose: bool,
}

impl ConsoleProgress {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressSink for ConsoleProgress {
    fn run_started(&mut self, total: usize) {
        println!("Found {} input file(s)\n", total);
    }

    fn job_finished(&mut self, done: usize, total: usize, record: &JobRecord) {
        print!("{}", render_job_line(done, total, record, self.verbose));
    }
}

/// `[done/total] rel/path ... <glyph>` plus indented detail lines.
pub fn render_job_line(done: usize, total: usize, record: &JobRecord, verbose: bool) -> String {
    let g = glyphs();
    let mut out = format!("[{}/{}] {} ... ", done, total, record.rel_path);
    match &record.outcome {
        JobOutcome::Success { artifacts } => {
            out.push_str(&format!("{}\n", g.ok.green()));
            if verbose {
                out.push_str(&format!("       {}\n", artifacts.file_names()));
            }
        }
        JobOutcome::Skipped { reason } => {
            out.push_str(&format!("{}\n", format!("{} ({})", g.skip, reason.describe()).yellow()));
        }
        JobOutcome::Failed { stage, message } => {
            out.push_str(&format!("{}\n", format!("{} ({})", g.fail, stage).red()));
            out.push_str(&indent_diagnostic(message, verbose));
        }
        JobOutcome::TimedOut { stage, after_secs } => {
            out.push_str(&format!(
                "{}\n",
                format!("{} ({} timed out after {}s)", g.fail, stage, after_secs).red()
            ));
        }
    }
    out
}

fn indent_diagnostic(message: &str, verbose: bool) -> String {
    let (kept, hidden) = if verbose {
        (message.trim().to_string(), 0)
    } else {
        truncate_lines(message, DEFAULT_DIAGNOSTIC_LINES)
    };
    let mut out = String::new();
    for line in kept.lines() {
        out.push_str(&format!("       {}\n", line));
    }
    if hidden > 0 {
        out.push_str(&format!("       ... {} more line(s), use --verbose\n", hidden));
    }
    out
}

/// The end-of-run summary block.
pub fn render_run_summary(report: &RunReport, verbose: bool) -> String {
    let s = &report.summary;
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", "=".repeat(RULE_WIDTH)));
    out.push_str("Summary:\n");
    out.push_str(&format!("  Total files:      {}\n", s.total));
    out.push_str(&format!("{}\n", format!("  Successful:       {}", s.success).green()));
    out.push_str(&format!("{}\n", format!("  Skipped:          {}", s.skipped).yellow()));
    out.push_str(&format!("{}\n", format!("  Failed:           {}", s.failed).red()));
    if s.timed_out > 0 {
        out.push_str(&format!("{}\n", format!("  Timed out:        {}", s.timed_out).red()));
    }
    out.push_str(&format!("  Success rate:     {:.1}%\n", s.success_rate()));
    out.push_str(&format!(
        "  Duration:         {:.1}s\n",
        report.duration_ms() as f64 / 1000.0
    ));

    let failures = s.failures();
    if !failures.is_empty() {
        out.push_str(&format!("\n{}\n", "Failed files:".red()));
        for (path, message) in failures {
            out.push_str(&format!("  - {}\n", path));
            out.push_str(&indent_diagnostic(&message, verbose));
        }
    }

    if verbose {
        let skipped = s.skipped_paths();
        if !skipped.is_empty() {
            out.push_str(&format!("\n{}\n", "Skipped files:".yellow()));
            for path in skipped {
                out.push_str(&format!("  - {}\n", path));
            }
        }
    }

    if let Some(agg) = &report.aggregator {
        out.push_str(&format!(
            "\nBuild descriptor: {} ({} project(s))\n",
            agg.path.display(),
            agg.children
        ));
    }
    out
}

/// The reconciled build-log summary block.
pub fn render_reconciliation(report: &ReconciliationReport) -> String {
    let g = glyphs();
    let r = &report.result;
    let mut out = String::new();
    let rule = "=".repeat(80);

    out.push_str(&format!("\n{}\nStub Compilation Summary\n{}\n\n", rule, rule));
    out.push_str(&format!("Total stubs attempted: {}\n", r.total()));
    out.push_str(&format!(
        "Successful:            {} ({}%)\n",
        r.successful.len(),
        r.success_percent()
    ));
    out.push_str(&format!(
        "Failed:                {} ({}%)\n\n",
        r.failed.len(),
        r.failure_percent()
    ));

    if !r.successful.is_empty() {
        out.push_str("Successfully compiled stubs:\n");
        for stub in &r.successful {
            out.push_str(&format!("  {} {}\n", g.ok.green(), stub));
        }
        out.push('\n');
    }

    if !r.failed.is_empty() {
        out.push_str("Failed stubs:\n");
        for stub in &r.failed {
            out.push_str(&format!("  {} {}\n", g.fail.red(), stub));
        }
        out.push('\n');
    }

    if !r.interrupted.is_empty() {
        out.push_str("Interrupted (no result in log):\n");
        for stub in &r.interrupted {
            out.push_str(&format!("  {} {}\n", g.skip.yellow(), stub));
        }
        out.push('\n');
    }

    if !report.not_built.is_empty() {
        out.push_str("Not built:\n");
        for stub in &report.not_built {
            out.push_str(&format!("  {} {}\n", g.skip.yellow(), stub));
        }
        out.push('\n');
    }

    if r.failed.is_empty() {
        out.push_str(&format!("All stubs compiled successfully! {}\n", g.ok));
    }
    out.push_str(&format!("\n{}\n", rule));
    out
}
