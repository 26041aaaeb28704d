//! Corpus scanning.
//!
//! Enumerates input definition files under a root directory in a
//! deterministic order. An empty result is not an error here; callers decide
//! whether zero inputs is fatal.

use crate::config::StubSelection;
use crate::domain::{InputFile, Result, StubcheckError};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Recursively find every file under `root` whose extension is `extension`
/// (without the leading dot), sorted by relative path.
pub fn scan_corpus(root: &Path, extension: &str) -> Result<Vec<InputFile>> {
    if !root.is_dir() {
        return Err(StubcheckError::CorpusNotFound(root.to_path_buf()));
    }

    let mut inputs = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable corpus entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|e| e == extension)
            .unwrap_or(false);
        if !matches {
            continue;
        }
        if let Some(input) = InputFile::new(root, entry.path().to_path_buf()) {
            inputs.push(input);
        }
    }

    inputs.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    debug!(root = %root.display(), count = inputs.len(), "scanned corpus");
    Ok(inputs)
}

/// Keep only inputs whose relative path contains `pattern`.
pub fn filter_inputs(inputs: Vec<InputFile>, pattern: Option<&str>) -> Vec<InputFile> {
    match pattern {
        Some(p) if !p.is_empty() => inputs
            .into_iter()
            .filter(|i| i.display_rel().contains(p))
            .collect(),
        _ => inputs,
    }
}

/// Keep only inputs whose stub name (file stem) the selection admits.
pub fn select_stubs(inputs: Vec<InputFile>, selection: &StubSelection) -> Vec<InputFile> {
    if selection.is_everything() {
        return inputs;
    }
    inputs
        .into_iter()
        .filter(|i| selection.admits(&i.stem()))
        .collect()
}
