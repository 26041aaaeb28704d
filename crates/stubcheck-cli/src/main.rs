//! stubcheck - test harness for interface-definition code generators
//!
//! The `stubcheck` command runs a code generator over a corpus of input
//! definition files, optionally compile-checks what it produced, and
//! reconciles build logs into per-target verdicts.
//!
//! ## Commands
//!
//! - `generate`: run the generator over every input (lenient gate)
//! - `validate`: generate, then compile-check each stub (strict gate)
//! - `summarize`: reconcile a build log into success/failure sets
//! - `list`: show discovered inputs and their project names
//! - `groups`: show configured stub groups

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stubcheck_core::{
    emit_log_reconciled, filter_inputs, init_tracing, load_stub_list, plan_jobs, scan_corpus,
    select_stubs, HarnessConfig, InputFile, LogReconciler, ProjectFragment, ReconciliationReport,
    StubSelection, StubcheckError,
};
use stubcheck_harness::{
    render_reconciliation, render_run_summary, CompilerTool, ConsoleProgress, GateVerdict,
    GeneratorTool, PipelineOptions, ProcessInvoker, RunGate, RunMode, StubPipeline,
};
use tracing::{info, Level};

/// Exit code for configuration errors raised before any job runs.
const EXIT_CONFIG: i32 = 2;

#[derive(Parser)]
#[command(name = "stubcheck")]
#[command(version = stubcheck_core::VERSION)]
#[command(about = "Generate, compile-check and reconcile code generator stubs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (default: ./stubcheck.toml if present)
    #[arg(long, global = true, env = "STUBCHECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by `generate` and `validate`.
#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Directory containing input definition files
    #[arg(short = 'd', long)]
    corpus: PathBuf,

    /// Output directory for generated stubs
    #[arg(short, long, default_value = "generated_stubs")]
    output: PathBuf,

    /// Path to the generator executable
    #[arg(short = 'c', long, env = "STUBCHECK_GENERATOR")]
    generator: Option<PathBuf>,

    /// Maximum concurrent jobs
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Only process inputs whose relative path contains this text
    #[arg(short, long)]
    filter: Option<String>,

    /// Per-invocation timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Do not write leaf or aggregator build descriptors
    #[arg(long)]
    no_build_files: bool,

    /// Remove the output directory before running
    #[arg(long)]
    clean: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the generator over every input
    Generate {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Generate, then compile-check every successful stub
    Validate {
        #[command(flatten)]
        run: RunArgs,

        /// Compiler executable
        #[arg(long)]
        compiler: Option<String>,

        /// Additional include directory (repeatable)
        #[arg(short = 'I', long = "include")]
        include: Vec<PathBuf>,

        /// Validate a configured group of stubs (`all` for every group)
        #[arg(short, long)]
        group: Option<String>,

        /// Exclude a configured group
        #[arg(long)]
        exclude: Option<String>,

        /// Specific stub names to validate
        stubs: Vec<String>,
    },

    /// Reconcile a build log into per-target verdicts
    Summarize {
        /// Build log to analyse
        #[arg(long)]
        log_file: PathBuf,

        /// File listing expected stub names, one per line
        #[arg(long)]
        stub_list: Option<PathBuf>,

        /// Also write the reconciliation as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List discovered inputs and their project names
    List {
        /// Directory containing input definition files
        #[arg(short = 'd', long)]
        corpus: PathBuf,

        /// Only list inputs whose relative path contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// List configured stub groups
    Groups,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress goes to stdout; keep stderr quiet unless asked.
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_tracing(cli.json, level);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => configuration_exit(e)?,
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let mut config = HarnessConfig::discover(cli.config.as_deref(), &cwd)
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Generate { run } => {
            apply_run_args(&mut config, &run);
            cmd_run(&config, RunMode::Generate, &run, &StubSelection::default(), cli.verbose)
                .await
        }
        Commands::Validate {
            run,
            compiler,
            include,
            group,
            exclude,
            stubs,
        } => {
            apply_run_args(&mut config, &run);
            if let Some(compiler) = compiler {
                config.compiler.path = compiler;
            }
            config.compiler.include_dirs.extend(include);
            let selection = config.select_stubs(&stubs, group.as_deref(), exclude.as_deref())?;
            cmd_run(&config, RunMode::Validate, &run, &selection, cli.verbose).await
        }
        Commands::Summarize {
            log_file,
            stub_list,
            report,
        } => cmd_summarize(&config, &log_file, stub_list.as_deref(), report.as_deref()),
        Commands::List { corpus, filter } => cmd_list(&config, &corpus, filter.as_deref()),
        Commands::Groups => cmd_groups(&config),
    }
}

/// Turn configuration-class errors into exit code 2; anything else propagates.
fn configuration_exit(err: anyhow::Error) -> Result<i32> {
    match err.downcast_ref::<StubcheckError>() {
        Some(e) if e.is_configuration() => {
            eprintln!("{} {}", "Error:".red(), e);
            if let StubcheckError::GeneratorNotFound(_) = e {
                eprintln!("Build the generator first or pass --generator <path>");
            }
            Ok(EXIT_CONFIG)
        }
        _ => Err(err),
    }
}

/// Command-line flags override file configuration.
fn apply_run_args(config: &mut HarnessConfig, run: &RunArgs) {
    if let Some(generator) = &run.generator {
        config.generator.path = Some(generator.clone());
    }
    if let Some(jobs) = run.jobs {
        config.jobs = jobs;
    }
    if let Some(timeout) = run.timeout {
        config.generator.timeout_secs = timeout;
        config.compiler.timeout_secs = timeout;
    }
    if run.no_build_files {
        config.build.enabled = false;
    }
}

async fn cmd_run(
    config: &HarnessConfig,
    mode: RunMode,
    run: &RunArgs,
    selection: &StubSelection,
    verbose: bool,
) -> Result<i32> {
    config.validate()?;

    let inputs = discover_inputs(config, &run.corpus, run.filter.as_deref(), selection)?;
    let (generator, compiler) = prepare_tools(config, mode, run)?;

    println!("{}", format!("stubcheck {}", mode.name()).cyan());
    println!("{}", "=".repeat(60));
    println!("Corpus:    {}", run.corpus.display());
    println!("Output:    {}", run.output.display());
    println!("Generator: {}", generator.program.display());
    if let Some(compiler) = &compiler {
        println!("Compiler:  {}", compiler.program.display());
    }
    println!("Jobs:      {}", config.jobs);
    if let Some(filter) = &run.filter {
        println!("Filter:    {}", filter);
    }
    for name in unmatched_stubs(selection, &inputs) {
        println!("{}", format!("No input found for stub '{}'", name).yellow());
    }
    println!();

    let mut invoker = ProcessInvoker::new(generator);
    if let Some(compiler) = compiler {
        invoker = invoker.with_compiler(compiler);
    }

    let jobs = plan_jobs(inputs, &run.output);
    let options = PipelineOptions::from_config(config, mode, &run.corpus, &run.output)?;
    let mut progress = ConsoleProgress::new(verbose);
    let report = StubPipeline::new(Arc::new(invoker), options)
        .run(jobs, &mut progress)
        .await
        .context("Stub pipeline failed to run")?;

    print!("{}", render_run_summary(&report, verbose));
    let verdict = RunGate::evaluate(&report.summary, mode.gate_mode());
    print_verdict(&verdict);
    Ok(verdict.exit_code())
}

/// Scan, filter and select inputs. Zero remaining inputs is a configuration
/// error.
fn discover_inputs(
    config: &HarnessConfig,
    corpus: &Path,
    filter: Option<&str>,
    selection: &StubSelection,
) -> Result<Vec<InputFile>> {
    let inputs = scan_corpus(corpus, &config.input_extension)?;
    let inputs = select_stubs(filter_inputs(inputs, filter), selection);
    if inputs.is_empty() {
        return Err(StubcheckError::NoInputs {
            root: corpus.to_path_buf(),
            extension: config.input_extension.clone(),
        }
        .into());
    }
    Ok(inputs)
}

/// Explicitly requested stubs that matched no input.
fn unmatched_stubs(selection: &StubSelection, inputs: &[InputFile]) -> Vec<String> {
    let Some(include) = &selection.include else {
        return Vec::new();
    };
    let found: BTreeSet<String> = inputs.iter().map(InputFile::stem).collect();
    include
        .iter()
        .filter(|name| !found.contains(*name))
        .cloned()
        .collect()
}

/// Resolve the generator, clean the output root if asked, then resolve the
/// compiler. The compiler looks for vcpkg includes under the output root, so
/// it must only see what survives the clean.
fn prepare_tools(
    config: &HarnessConfig,
    mode: RunMode,
    run: &RunArgs,
) -> Result<(GeneratorTool, Option<CompilerTool>)> {
    let generator = GeneratorTool::resolve(&config.generator)?;
    if run.clean {
        clean_output(&run.output, &run.corpus)?;
    }
    let compiler = if mode.compiles() {
        Some(CompilerTool::resolve(&config.compiler, &run.output)?)
    } else {
        None
    };
    Ok((generator, compiler))
}

fn clean_output(output: &Path, corpus: &Path) -> Result<()> {
    if !output.exists() {
        return Ok(());
    }
    let output_abs = output.canonicalize()?;
    let corpus_abs = corpus.canonicalize()?;
    if corpus_abs.starts_with(&output_abs) {
        anyhow::bail!(
            "Refusing to clean {}: it contains the corpus",
            output.display()
        );
    }
    std::fs::remove_dir_all(output)
        .with_context(|| format!("Failed to remove {}", output.display()))?;
    info!(output = %output.display(), "cleaned output directory");
    Ok(())
}

fn print_verdict(verdict: &GateVerdict) {
    if verdict.passed {
        println!("\n{}", verdict.message.green());
    } else {
        println!("\n{}", verdict.message.red());
    }
}

fn cmd_summarize(
    config: &HarnessConfig,
    log_file: &Path,
    stub_list: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<i32> {
    let reconciler = LogReconciler::standard()?.with_custom(&config.reconcile.patterns)?;
    let result = reconciler.reconcile_file(log_file)?;
    let expected = stub_list.map(load_stub_list).transpose()?;
    let report = ReconciliationReport::new(log_file, result, expected.as_deref());
    emit_log_reconciled(&log_file.display().to_string(), &report.result);

    print!("{}", render_reconciliation(&report));

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(RunGate::evaluate_log(&report).exit_code())
}

fn cmd_list(config: &HarnessConfig, corpus: &Path, filter: Option<&str>) -> Result<i32> {
    let inputs = filter_inputs(scan_corpus(corpus, &config.input_extension)?, filter);
    println!("Inputs in {}:", corpus.display());
    for input in &inputs {
        let fragment = ProjectFragment::from_rel_path(&input.rel_path);
        println!("  {:40} {}", input.display_rel(), fragment.as_str().cyan());
    }
    println!("\n{} input file(s)", inputs.len());
    Ok(0)
}

fn cmd_groups(config: &HarnessConfig) -> Result<i32> {
    if config.groups.is_empty() {
        println!("No groups configured. Add a [groups] table to stubcheck.toml.");
        return Ok(0);
    }
    println!("Available groups:");
    for (name, stubs) in &config.groups {
        println!("  {:20} {}", name.cyan(), stubs.join(", "));
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = parse(&[
            "stubcheck", "generate", "-d", "corpus", "-o", "out", "-c", "/bin/gen", "-j", "3",
            "-f", "list", "--timeout", "5", "--no-build-files", "--clean",
        ]);
        match cli.command {
            Commands::Generate { run } => {
                assert_eq!(run.corpus, PathBuf::from("corpus"));
                assert_eq!(run.output, PathBuf::from("out"));
                assert_eq!(run.generator, Some(PathBuf::from("/bin/gen")));
                assert_eq!(run.jobs, Some(3));
                assert_eq!(run.filter.as_deref(), Some("list"));
                assert_eq!(run.timeout, Some(5));
                assert!(run.no_build_files && run.clean);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_parse_validate_with_selection() {
        let cli = parse(&[
            "stubcheck", "-v", "validate", "-d", "c", "-I", "/inc", "-I", "/inc2", "-g", "all",
            "--exclude", "async", "floats", "strings",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Validate {
                run,
                include,
                group,
                exclude,
                stubs,
                compiler,
            } => {
                assert_eq!(run.output, PathBuf::from("generated_stubs"));
                assert_eq!(include, vec![PathBuf::from("/inc"), PathBuf::from("/inc2")]);
                assert_eq!(group.as_deref(), Some("all"));
                assert_eq!(exclude.as_deref(), Some("async"));
                assert_eq!(stubs, vec!["floats", "strings"]);
                assert!(compiler.is_none());
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn test_parse_requires_corpus() {
        assert!(Cli::try_parse_from(["stubcheck", "generate"]).is_err());
    }

    #[test]
    fn test_apply_run_args_overrides() {
        let cli = parse(&[
            "stubcheck", "generate", "-d", "c", "-c", "/bin/gen", "-j", "2", "--timeout", "9",
            "--no-build-files",
        ]);
        let Commands::Generate { run } = cli.command else {
            panic!("expected generate");
        };
        let mut config = HarnessConfig::default();
        apply_run_args(&mut config, &run);
        assert_eq!(config.generator.path, Some(PathBuf::from("/bin/gen")));
        assert_eq!(config.jobs, 2);
        assert_eq!(config.generator.timeout_secs, 9);
        assert_eq!(config.compiler.timeout_secs, 9);
        assert!(!config.build.enabled);
    }

    #[test]
    fn test_configuration_errors_exit_2() {
        let err = anyhow::Error::from(StubcheckError::GeneratorNotFound(PathBuf::from("/x")));
        assert_eq!(configuration_exit(err).unwrap(), EXIT_CONFIG);

        let err = anyhow::Error::from(StubcheckError::UnknownGroup("nope".to_string()))
            .context("while selecting stubs");
        assert_eq!(configuration_exit(err).unwrap(), EXIT_CONFIG);

        let err = anyhow::anyhow!("something else");
        assert!(configuration_exit(err).is_err());
    }

    #[test]
    fn test_discover_inputs_filters_and_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        for rel in ["floats.wit", "b/floats.wit", "strings.wit"] {
            std::fs::write(dir.path().join(rel), "").unwrap();
        }
        let config = HarnessConfig::default();

        let all = discover_inputs(&config, dir.path(), None, &StubSelection::default()).unwrap();
        assert_eq!(all.len(), 3);

        let selection = StubSelection {
            include: Some(["floats".to_string()].into_iter().collect()),
            exclude: BTreeSet::new(),
        };
        let floats = discover_inputs(&config, dir.path(), None, &selection).unwrap();
        assert_eq!(floats.len(), 2);
        assert!(unmatched_stubs(&selection, &floats).is_empty());

        let err = discover_inputs(&config, dir.path(), Some("zzz"), &StubSelection::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StubcheckError>(),
            Some(StubcheckError::NoInputs { .. })
        ));
    }

    #[test]
    fn test_unmatched_stubs() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![InputFile::new(dir.path(), dir.path().join("floats.wit")).unwrap()];
        let selection = StubSelection {
            include: Some(
                ["floats".to_string(), "missing".to_string()]
                    .into_iter()
                    .collect(),
            ),
            exclude: BTreeSet::new(),
        };
        assert_eq!(unmatched_stubs(&selection, &inputs), vec!["missing"]);
        assert!(unmatched_stubs(&StubSelection::default(), &inputs).is_empty());
    }

    #[test]
    fn test_clean_output_refuses_corpus_parent() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus");
        std::fs::create_dir_all(&corpus).unwrap();
        assert!(clean_output(dir.path(), &corpus).is_err());
        assert!(corpus.exists());

        let out = dir.path().join("out");
        std::fs::create_dir_all(out.join("a")).unwrap();
        clean_output(&out, &corpus).unwrap();
        assert!(!out.exists());
        clean_output(&out, &corpus).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_runs_before_compiler_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus");
        let out = dir.path().join("out");
        let vcpkg = out.join("vcpkg_installed/x64-linux/include");
        std::fs::create_dir_all(&corpus).unwrap();
        std::fs::create_dir_all(&vcpkg).unwrap();
        let generator = dir.path().join("gen");
        std::fs::write(&generator, "").unwrap();

        let mut config = HarnessConfig::default();
        config.generator.path = Some(generator);
        config.compiler.path = "sh".to_string();
        let args = |extra: &[&str]| {
            let mut argv = vec![
                "stubcheck",
                "validate",
                "-d",
                corpus.to_str().unwrap(),
                "-o",
                out.to_str().unwrap(),
            ];
            argv.extend_from_slice(extra);
            match parse(&argv).command {
                Commands::Validate { run, .. } => run,
                _ => panic!("expected validate"),
            }
        };

        let (_, compiler) = prepare_tools(&config, RunMode::Validate, &args(&[])).unwrap();
        assert!(compiler.unwrap().include_dirs.contains(&vcpkg));

        let (_, compiler) =
            prepare_tools(&config, RunMode::Validate, &args(&["--clean"])).unwrap();
        assert!(!out.exists());
        assert!(!compiler.unwrap().include_dirs.contains(&vcpkg));
    }

    #[test]
    fn test_summarize_exit_codes() {
        colored::control::set_override(false);
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("build.log");
        std::fs::write(
            &log,
            "[ 50%] Built target floats-stub\n\
             gmake[2]: *** [CMakeFiles/strings-stub.dir/build.make:76: x.o] Error 1\n",
        )
        .unwrap();
        let list = dir.path().join("stubs.txt");
        std::fs::write(&list, "# expected\nfloats\nstrings\nchar\n").unwrap();
        let json = dir.path().join("report.json");

        let config = HarnessConfig::default();
        let code = cmd_summarize(&config, &log, Some(&list), Some(&json)).unwrap();
        assert_eq!(code, 1);

        let written: ReconciliationReport =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert!(written.result.successful.contains("floats"));
        assert!(written.result.failed.contains("strings"));
        assert_eq!(written.not_built, vec!["char"]);

        std::fs::write(&log, "[100%] Built target floats-stub\n").unwrap();
        assert_eq!(cmd_summarize(&config, &log, None, None).unwrap(), 0);
    }

    #[test]
    fn test_summarize_missing_log_is_configuration_error() {
        let config = HarnessConfig::default();
        let err = cmd_summarize(&config, Path::new("/no/such/build.log"), None, None).unwrap_err();
        assert_eq!(configuration_exit(err).unwrap(), EXIT_CONFIG);
    }

    #[test]
    fn test_groups_and_list_succeed() {
        let config = HarnessConfig::from_toml("[groups]\nbasic = [\"floats\"]\n").unwrap();
        assert_eq!(cmd_groups(&config).unwrap(), 0);
        assert_eq!(cmd_groups(&HarnessConfig::default()).unwrap(), 0);

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wit"), "").unwrap();
        assert_eq!(cmd_list(&config, dir.path(), None).unwrap(), 0);
        assert!(cmd_list(&config, &dir.path().join("missing"), None).is_err());
    }
}
