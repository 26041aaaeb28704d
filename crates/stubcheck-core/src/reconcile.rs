//! Build-log reconciliation.
//!
//! Recovers which stub targets compiled and which failed from a free-form
//! build log. Each [`LogPattern`] is applied independently to the whole log;
//! the merged result obeys these rules:
//!
//! 1. success = union of every success match
//! 2. failure = union of every failure match
//! 3. a target in both sets is reported only as failed
//! 4. a target seen starting but with no success or failure signal is
//!    reported as interrupted (truncated or aborted logs)
//!
//! Lines that match nothing are ignored, so reconciliation never fails on
//! input text.

use crate::domain::{Result, StubcheckError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Build-system generation a pattern understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStyle {
    /// One CMake target per stub, driven by make or ninja.
    PerTarget,

    /// One project per stub, Visual Studio generator.
    MsBuild,

    /// Single monolithic target compiling one object file per stub.
    Legacy,

    /// User-supplied pattern from configuration.
    Custom,
}

impl fmt::Display for LogStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogStyle::PerTarget => "per_target",
            LogStyle::MsBuild => "msbuild",
            LogStyle::Legacy => "legacy",
            LogStyle::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// What a pattern match says about its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Success,
    Failure,
    Started,
}

/// A user-defined pattern as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub name: String,
    pub regex: String,
    pub signal: Signal,
}

/// A compiled pattern and the signal it carries.
///
/// The target identity is taken from the named group `target` when present,
/// otherwise from the first capture group.
#[derive(Debug, Clone)]
pub struct LogPattern {
    pub name: String,
    pub style: LogStyle,
    pub signal: Signal,
    regex: Regex,
}

impl LogPattern {
    pub fn new(name: &str, style: LogStyle, signal: Signal, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| StubcheckError::Pattern {
            name: name.to_string(),
            source,
        })?;
        if regex.captures_len() < 2 {
            return Err(StubcheckError::InvalidConfig(format!(
                "log pattern '{}' has no capture group for the target",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            style,
            signal,
            regex,
        })
    }

    /// Every target identity this pattern finds in `log`.
    pub fn extract(&self, log: &str) -> BTreeSet<String> {
        self.regex
            .captures_iter(log)
            .filter_map(|caps| caps.name("target").or_else(|| caps.get(1)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

// (name, style, signal, regex)
const STANDARD_PATTERNS: &[(&str, LogStyle, Signal, &str)] = &[
    (
        "make_built_target",
        LogStyle::PerTarget,
        Signal::Success,
        r"(?m)\[\s*\d+%\] Built target (?P<target>\S+?)-stub(?:\s|$)",
    ),
    // Printed when the archive step begins, not when it ends.
    (
        "link_library",
        LogStyle::PerTarget,
        Signal::Started,
        r"Linking CXX static library (?:\S*/)?lib(?P<target>[^/\s]+)-stub\.a",
    ),
    (
        "make_error",
        LogStyle::PerTarget,
        Signal::Failure,
        r"g?make\[\d+\]: \*\*\* \[(?:\S+/)?CMakeFiles/(?P<target>[^/\s]+)-stub\.dir/",
    ),
    (
        "ninja_failed",
        LogStyle::PerTarget,
        Signal::Failure,
        r"FAILED: (?:\S+/)?CMakeFiles/(?P<target>[^/\s]+)-stub\.dir/",
    ),
    (
        "ninja_failed_library",
        LogStyle::PerTarget,
        Signal::Failure,
        r"FAILED: (?:\S+/)?lib(?P<target>[^/\s]+)-stub\.a",
    ),
    (
        "building_object",
        LogStyle::PerTarget,
        Signal::Started,
        r"Building CXX object (?:\S+/)?CMakeFiles/(?P<target>[^/\s]+)-stub\.dir/",
    ),
    (
        "msbuild_project_output",
        LogStyle::MsBuild,
        Signal::Success,
        r"(?P<target>[^\s\\/\[\]]+)-stub\.vcxproj -> ",
    ),
    (
        "msbuild_project_error",
        LogStyle::MsBuild,
        Signal::Failure,
        r"(?P<target>[^\s\\/\[\]]+)-stub\.vcxproj\([^)]*\)\s*: (?:fatal )?error ",
    ),
    (
        "msbuild_compiler_error",
        LogStyle::MsBuild,
        Signal::Failure,
        r"(?m): (?:fatal )?error [A-Z]+\d+:.*\[(?:[^\]\r\n]*[\\/])?(?P<target>[^\\/\]\r\n]+)-stub\.vcxproj\]",
    ),
    (
        "legacy_object_built",
        LogStyle::Legacy,
        Signal::Success,
        r"\[\d+/\d+\] Building CXX object test/CMakeFiles/test-stubs-compiled\.dir/generated_stubs/(?P<target>\w+)_wamr\.cpp\.o",
    ),
    (
        "legacy_object_failed",
        LogStyle::Legacy,
        Signal::Failure,
        r"FAILED: test/CMakeFiles/test-stubs-compiled\.dir/generated_stubs/(?P<target>\w+)_wamr\.cpp\.o",
    ),
];

/// An ordered list of independent extractors plus the merge rules.
#[derive(Debug, Clone)]
pub struct LogReconciler {
    patterns: Vec<LogPattern>,
}

impl LogReconciler {
    /// The built-in patterns for every known build-log style.
    pub fn standard() -> Result<Self> {
        let patterns = STANDARD_PATTERNS
            .iter()
            .map(|(name, style, signal, re)| LogPattern::new(name, *style, *signal, re))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Append user-defined patterns.
    pub fn with_custom(mut self, specs: &[PatternSpec]) -> Result<Self> {
        for spec in specs {
            self.patterns.push(LogPattern::new(
                &spec.name,
                LogStyle::Custom,
                spec.signal,
                &spec.regex,
            )?);
        }
        Ok(self)
    }

    pub fn patterns(&self) -> &[LogPattern] {
        &self.patterns
    }

    /// Reconcile one log.
    pub fn reconcile(&self, log: &str) -> LogReconciliation {
        let mut success = BTreeSet::new();
        let mut failure = BTreeSet::new();
        let mut started = BTreeSet::new();

        for pattern in &self.patterns {
            let found = pattern.extract(log);
            if !found.is_empty() {
                debug!(pattern = %pattern.name, style = %pattern.style, matches = found.len(), "log pattern matched");
            }
            let bucket = match pattern.signal {
                Signal::Success => &mut success,
                Signal::Failure => &mut failure,
                Signal::Started => &mut started,
            };
            bucket.extend(found);
        }

        let successful: BTreeSet<String> = success.difference(&failure).cloned().collect();
        let interrupted = started
            .into_iter()
            .filter(|t| !success.contains(t) && !failure.contains(t))
            .collect();

        LogReconciliation {
            successful,
            failed: failure,
            interrupted,
        }
    }

    /// Read and reconcile a log file. Invalid UTF-8 is replaced, not rejected.
    pub fn reconcile_file(&self, path: &Path) -> Result<LogReconciliation> {
        if !path.is_file() {
            return Err(StubcheckError::LogNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        Ok(self.reconcile(&String::from_utf8_lossy(&bytes)))
    }
}

/// Reconciled classification. The three sets are disjoint and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogReconciliation {
    pub successful: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub interrupted: BTreeSet<String>,
}

impl LogReconciliation {
    /// Targets with a terminal signal.
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    pub fn success_percent(&self) -> usize {
        percent(self.successful.len(), self.total())
    }

    pub fn failure_percent(&self) -> usize {
        percent(self.failed.len(), self.total())
    }

    /// Expected stubs that appear in neither terminal set.
    pub fn missing<'a>(&self, expected: &'a [String]) -> Vec<&'a str> {
        expected
            .iter()
            .filter(|e| !self.successful.contains(*e) && !self.failed.contains(*e))
            .map(String::as_str)
            .collect()
    }
}

/// Integer percentage, 0 when `total` is 0.
pub fn percent(part: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        100 * part / total
    }
}

/// Read an expected-stub list: one name per line, `#` comments allowed.
pub fn load_stub_list(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(StubcheckError::InvalidConfig(format!(
            "stub list not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}
