//! Whole-run aggregator build descriptor.
//!
//! Children are deduplicated, sorted and rendered relative to the aggregator's
//! own directory, so identical inputs always give byte-identical output.

use crate::buildgen::leaf::DESCRIPTOR_FILE;
use crate::domain::{generic_path, Result, StubcheckError};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Placeholder replaced with one `add_subdirectory` line per child.
pub const SUBDIRECTORIES_PLACEHOLDER: &str = "@STUB_SUBDIRECTORIES@";

/// Placeholder replaced with the number of children.
pub const COUNT_PLACEHOLDER: &str = "@STUB_COUNT@";

/// Template used when no custom template is configured.
pub const DEFAULT_TEMPLATE: &str = r#"# Generated by stubcheck: aggregates every generated stub project.
# @STUB_COUNT@ stub project(s).

cmake_minimum_required(VERSION 3.10)
project(generated-stubs CXX)

set(CMAKE_CXX_STANDARD 20)
set(CMAKE_CXX_STANDARD_REQUIRED ON)

if(NOT DEFINED CMCPP_INCLUDE_DIR)
    set(CMCPP_INCLUDE_DIR "${CMAKE_CURRENT_SOURCE_DIR}/../../../include")
endif()
include_directories(${CMCPP_INCLUDE_DIR})

message(STATUS "Building @STUB_COUNT@ generated stub project(s)")

@STUB_SUBDIRECTORIES@"#;

/// The aggregator descriptor for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorDescriptor {
    /// Directory the aggregator is written to (the output root).
    pub root: PathBuf,

    /// Child directories relative to `root`, `/`-separated, sorted.
    pub children: Vec<String>,
}

/// Where an aggregator was written and the digest of its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenAggregator {
    pub path: PathBuf,
    pub digest: String,
    pub children: usize,
}

impl AggregatorDescriptor {
    /// Build from leaf directories in any order, with duplicates allowed.
    ///
    /// Directories outside `root` cannot be referenced relatively and are
    /// skipped with a warning.
    pub fn new(root: &Path, leaf_dirs: &[PathBuf]) -> Self {
        let mut children = BTreeSet::new();
        for dir in leaf_dirs {
            match dir.strip_prefix(root) {
                Ok(rel) if rel.as_os_str().is_empty() => {
                    warn!(dir = %dir.display(), "leaf directory equals aggregator root; skipping");
                }
                Ok(rel) => {
                    children.insert(generic_path(rel));
                }
                Err(_) => {
                    warn!(dir = %dir.display(), root = %root.display(), "leaf directory outside aggregator root; skipping");
                }
            }
        }
        Self {
            root: root.to_path_buf(),
            children: children.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(DESCRIPTOR_FILE)
    }

    /// Substitute the children into `template`.
    pub fn render(&self, template: &str) -> String {
        let subdirs: String = self
            .children
            .iter()
            .map(|c| format!("add_subdirectory(\"{}\")\n", c))
            .collect();
        template
            .replace(SUBDIRECTORIES_PLACEHOLDER, &subdirs)
            .replace(COUNT_PLACEHOLDER, &self.children.len().to_string())
    }

    /// Render and write the aggregator, returning its content digest.
    pub fn write(&self, template: &str) -> Result<WrittenAggregator> {
        let content = self.render(template);
        let path = self.path();
        std::fs::write(&path, &content)?;
        Ok(WrittenAggregator {
            path,
            digest: content_digest(&content),
            children: self.children.len(),
        })
    }
}

/// SHA-256 hex digest of descriptor content.
pub fn content_digest(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Read a custom template, or fall back to [`DEFAULT_TEMPLATE`].
pub fn load_template(path: Option<&Path>) -> Result<String> {
    match path {
        None => Ok(DEFAULT_TEMPLATE.to_string()),
        Some(p) if !p.is_file() => Err(StubcheckError::TemplateNotFound(p.to_path_buf())),
        Some(p) => Ok(std::fs::read_to_string(p)?),
    }
}

/// Remove an aggregator left over from a previous run.
pub fn remove_stale(root: &Path) -> Result<()> {
    let path = root.join(DESCRIPTOR_FILE);
    if path.is_file() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
