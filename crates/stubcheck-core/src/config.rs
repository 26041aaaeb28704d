//! Harness configuration.
//!
//! Loaded from an optional TOML file. Every table and field has a default, so
//! an empty file (or no file) is a valid configuration. Command-line flags are
//! applied on top by the binary before [`HarnessConfig::validate`] runs.

use crate::domain::{Result, StubcheckError};
use crate::reconcile::PatternSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "stubcheck.toml";

/// Group name that selects every configured group.
pub const ALL_GROUPS: &str = "all";

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

/// Complete harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Input file extension, without the dot.
    pub input_extension: String,

    /// Concurrent job bound.
    pub jobs: usize,

    pub generator: GeneratorConfig,
    pub compiler: CompilerConfig,
    pub build: BuildConfig,

    /// Named lists of stub names for `validate --group`.
    pub groups: BTreeMap<String, Vec<String>>,

    pub reconcile: ReconcileConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            input_extension: "wit".to_string(),
            jobs: default_jobs(),
            generator: GeneratorConfig::default(),
            compiler: CompilerConfig::default(),
            build: BuildConfig::default(),
            groups: BTreeMap::new(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The code generator under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Executable path. Usually supplied on the command line.
    pub path: Option<PathBuf>,

    /// Wall-clock limit per generator run. Defaults above the compiler's
    /// limit, since large inputs under a full worker pool run long.
    pub timeout_secs: u64,

    /// Artifact suffixes appended to a job's output prefix, in priority order.
    pub candidate_suffixes: Vec<String>,

    /// Text that marks a generated header as an empty stub.
    pub empty_marker: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            path: None,
            timeout_secs: 60,
            candidate_suffixes: vec![
                ".hpp".to_string(),
                "_wamr.hpp".to_string(),
                "_wamr.cpp".to_string(),
            ],
            empty_marker: None,
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The C++ compiler used by `validate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Program name or path.
    pub path: String,

    pub timeout_secs: u64,

    pub flags: Vec<String>,

    pub include_dirs: Vec<PathBuf>,

    /// Cap on `error:`/`note:` lines kept in a failure message.
    pub max_error_lines: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            path: "g++".to_string(),
            timeout_secs: 30,
            flags: vec![
                "-std=c++20".to_string(),
                "-fsyntax-only".to_string(),
                "-Wno-unused-parameter".to_string(),
                "-Wno-unused-variable".to_string(),
            ],
            include_dirs: Vec::new(),
            max_error_lines: 10,
        }
    }
}

impl CompilerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Build descriptor synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub enabled: bool,

    /// Custom aggregator template; the built-in one is used when unset.
    pub aggregator_template: Option<PathBuf>,

    /// Runtime include directory relative to the output root, used by leaf
    /// projects built standalone.
    pub include_fallback: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            aggregator_template: None,
            include_fallback: "../../../include".to_string(),
        }
    }
}

/// Extra build-log patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    pub patterns: Vec<PatternSpec>,
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl HarnessConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(StubcheckError::InvalidConfig(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load from an explicit path, else `stubcheck.toml` in `cwd` if it
    /// exists, else defaults.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let candidate = cwd.join(DEFAULT_CONFIG_FILE);
                if candidate.is_file() {
                    Self::load(&candidate)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(invalid("jobs must be at least 1"));
        }
        if self.input_extension.is_empty() || self.input_extension.contains(['.', '/', '\\']) {
            return Err(invalid(format!(
                "input_extension must be a bare extension, got '{}'",
                self.input_extension
            )));
        }
        if self.generator.timeout_secs == 0 {
            return Err(invalid("generator.timeout_secs must be positive"));
        }
        if self.compiler.timeout_secs == 0 {
            return Err(invalid("compiler.timeout_secs must be positive"));
        }
        if self.generator.candidate_suffixes.is_empty() {
            return Err(invalid("generator.candidate_suffixes must not be empty"));
        }
        if self.generator.candidate_suffixes.iter().any(|s| s.is_empty()) {
            return Err(invalid("generator.candidate_suffixes must not contain empty entries"));
        }
        if self.compiler.path.trim().is_empty() {
            return Err(invalid("compiler.path must not be empty"));
        }
        if self.groups.contains_key(ALL_GROUPS) {
            return Err(invalid(format!("'{}' is a reserved group name", ALL_GROUPS)));
        }
        Ok(())
    }

    /// Stub names selected by `group`. `all` is the union of every group.
    pub fn resolve_group(&self, group: &str) -> Result<BTreeSet<String>> {
        if group == ALL_GROUPS {
            return Ok(self.groups.values().flatten().cloned().collect());
        }
        self.groups
            .get(group)
            .map(|names| names.iter().cloned().collect())
            .ok_or_else(|| StubcheckError::UnknownGroup(group.to_string()))
    }

    /// Final selection of stubs for a validate run.
    ///
    /// Explicit names and `--group` are unioned; `--exclude` is subtracted.
    pub fn select_stubs(
        &self,
        explicit: &[String],
        group: Option<&str>,
        exclude: Option<&str>,
    ) -> Result<StubSelection> {
        let include = if explicit.is_empty() && group.is_none() {
            None
        } else {
            let mut selected: BTreeSet<String> = explicit.iter().cloned().collect();
            if let Some(g) = group {
                selected.extend(self.resolve_group(g)?);
            }
            Some(selected)
        };
        let exclude = match exclude {
            Some(g) => self.resolve_group(g)?,
            None => BTreeSet::new(),
        };
        Ok(StubSelection { include, exclude })
    }
}

/// Which stubs (by input stem) a run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StubSelection {
    /// `None` admits every stub not excluded.
    pub include: Option<BTreeSet<String>>,
    pub exclude: BTreeSet<String>,
}

impl StubSelection {
    pub fn admits(&self, stub: &str) -> bool {
        if self.exclude.contains(stub) {
            return false;
        }
        self.include.as_ref().map_or(true, |inc| inc.contains(stub))
    }

    /// Whether the selection narrows the corpus at all.
    pub fn is_everything(&self) -> bool {
        self.include.is_none() && self.exclude.is_empty()
    }
}

fn invalid(msg: impl Into<String>) -> StubcheckError {
    StubcheckError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Signal;

    const SAMPLE: &str = r#"
input_extension = "wit"
jobs = 4

[generator]
path = "/opt/wit-codegen"
timeout_secs = 45
empty_marker = "// empty stub"

[compiler]
path = "clang++"
include_dirs = ["include"]

[build]
enabled = false

[groups]
basic = ["bools", "floats"]
composite = ["lists", "records", "bools"]

[[reconcile.patterns]]
name = "bazel"
regex = 'ERROR: //stubs:(\w+) failed'
signal = "failure"
"#;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.input_extension, "wit");
        assert!(config.jobs >= 1);
        assert_eq!(config.generator.timeout(), Duration::from_secs(60));
        assert_eq!(config.compiler.timeout(), Duration::from_secs(30));
        assert!(config.generator.timeout() > config.compiler.timeout());
        assert_eq!(
            config.generator.candidate_suffixes,
            vec![".hpp", "_wamr.hpp", "_wamr.cpp"]
        );
        assert_eq!(config.compiler.path, "g++");
        assert_eq!(config.compiler.max_error_lines, 10);
        assert!(config.build.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(HarnessConfig::from_toml("").unwrap(), HarnessConfig::default());
    }

    #[test]
    fn test_parse_sample() {
        let config = HarnessConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.jobs, 4);
        assert_eq!(config.generator.path, Some(PathBuf::from("/opt/wit-codegen")));
        assert_eq!(config.generator.timeout_secs, 45);
        assert_eq!(config.generator.empty_marker.as_deref(), Some("// empty stub"));
        assert_eq!(config.generator.candidate_suffixes.len(), 3);
        assert_eq!(config.compiler.path, "clang++");
        assert_eq!(config.compiler.flags[0], "-std=c++20");
        assert!(!config.build.enabled);
        assert_eq!(config.groups["basic"], vec!["bools", "floats"]);
        assert_eq!(config.reconcile.patterns[0].signal, Signal::Failure);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = HarnessConfig::from_toml("[generator]\ntimeout = 3\n").unwrap_err();
        assert!(matches!(err, StubcheckError::ConfigParse(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        let cases: Vec<fn(&mut HarnessConfig)> = vec![
            |c| c.jobs = 0,
            |c| c.generator.timeout_secs = 0,
            |c| c.compiler.timeout_secs = 0,
            |c| c.generator.candidate_suffixes.clear(),
            |c| c.generator.candidate_suffixes.push(String::new()),
            |c| c.input_extension = ".wit".to_string(),
            |c| {
                c.groups.insert("all".to_string(), vec![]);
            },
        ];
        for mutate in cases {
            let mut config = HarnessConfig::default();
            mutate(&mut config);
            assert!(matches!(
                config.validate(),
                Err(StubcheckError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_resolve_group() {
        let config = HarnessConfig::from_toml(SAMPLE).unwrap();
        let basic = config.resolve_group("basic").unwrap();
        assert_eq!(basic.into_iter().collect::<Vec<_>>(), vec!["bools", "floats"]);

        let all = config.resolve_group("all").unwrap();
        assert_eq!(
            all.into_iter().collect::<Vec<_>>(),
            vec!["bools", "floats", "lists", "records"]
        );

        assert!(matches!(
            config.resolve_group("nope"),
            Err(StubcheckError::UnknownGroup(_))
        ));
    }

    #[test]
    fn test_select_stubs() {
        let config = HarnessConfig::from_toml(SAMPLE).unwrap();
        assert!(config.select_stubs(&[], None, None).unwrap().is_everything());

        let selection = config
            .select_stubs(&["strings".to_string()], Some("composite"), Some("basic"))
            .unwrap();
        assert!(selection.admits("strings"));
        assert!(selection.admits("lists"));
        assert!(!selection.admits("bools"));
        assert!(!selection.admits("variants"));

        let selection = config.select_stubs(&[], None, Some("basic")).unwrap();
        assert!(selection.admits("variants"));
        assert!(!selection.admits("floats"));
    }

    #[test]
    fn test_discover_and_load() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            HarnessConfig::discover(None, dir.path()).unwrap(),
            HarnessConfig::default()
        );

        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "jobs = 2\n").unwrap();
        assert_eq!(HarnessConfig::discover(None, dir.path()).unwrap().jobs, 2);

        let err = HarnessConfig::discover(Some(&dir.path().join("missing.toml")), dir.path())
            .unwrap_err();
        assert!(matches!(err, StubcheckError::InvalidConfig(_)));
    }
}
