//! Input files, job descriptors and project identity.
//!
//! A [`ProjectFragment`] is derived from the *full* relative path of an
//! input, never from its file stem alone, so `a.wit` and `b/a.wit` always
//! map to different build targets.
//!
//! Encoding: every path segment keeps the bytes `[A-Za-z0-9-]` verbatim and
//! writes any other byte as `_` followed by two lowercase hex digits.
//! Segments are joined with `.`. Because `.` and `_` are themselves escaped
//! inside segments, the encoding is decodable and therefore injective.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Delimiter placed between encoded path segments.
pub const SEGMENT_DELIMITER: char = '.';

/// Suffix appended to a fragment to form a build target name.
pub const TARGET_SUFFIX: &str = "-stub";

/// An input definition file discovered under the corpus root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InputFile {
    /// Absolute (or root-joined) path to the file.
    pub path: PathBuf,

    /// Path relative to the corpus root.
    pub rel_path: PathBuf,
}

impl InputFile {
    /// Create an input file from a path under `root`.
    ///
    /// Returns `None` when `path` does not live under `root`.
    pub fn new(root: &Path, path: PathBuf) -> Option<Self> {
        let rel_path = path.strip_prefix(root).ok()?.to_path_buf();
        Some(Self { path, rel_path })
    }

    /// Relative path rendered with `/` separators on every platform.
    pub fn display_rel(&self) -> String {
        generic_path(&self.rel_path)
    }

    /// File stem, used as the stub name.
    pub fn stem(&self) -> String {
        self.rel_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Render a path with forward slashes regardless of platform.
pub fn generic_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Collision-free project identity derived from a relative input path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectFragment(String);

impl ProjectFragment {
    /// Derive the fragment for a path relative to the corpus root.
    ///
    /// The last segment uses the file stem; the input extension is shared by
    /// every input in a run so dropping it keeps the mapping injective.
    pub fn from_rel_path(rel_path: &Path) -> Self {
        let mut segments: Vec<Vec<u8>> = Vec::new();
        if let Some(parent) = rel_path.parent() {
            for component in parent.components() {
                if let Component::Normal(part) = component {
                    segments.push(part.as_encoded_bytes().to_vec());
                }
            }
        }
        let stem = rel_path.file_stem().unwrap_or_default();
        segments.push(stem.as_encoded_bytes().to_vec());

        let encoded = segments
            .iter()
            .map(|seg| encode_segment(seg))
            .collect::<Vec<_>>()
            .join(&SEGMENT_DELIMITER.to_string());
        Self(encoded)
    }

    /// The encoded identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build target name (`<fragment>-stub`).
    pub fn target_name(&self) -> String {
        format!("{}{}", self.0, TARGET_SUFFIX)
    }

    /// Decode back into the original path segments (stem last).
    pub fn decode(&self) -> Option<Vec<Vec<u8>>> {
        self.0
            .split(SEGMENT_DELIMITER)
            .map(decode_segment)
            .collect()
    }
}

impl fmt::Display for ProjectFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn encode_segment(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b as char);
        } else {
            out.push('_');
            out.push_str(&format!("{:02x}", b));
        }
    }
    out
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let hex = segment.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

/// One unit of work: a single input file plus everything derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// The input definition file.
    pub input: InputFile,

    /// Directory exclusively owned by this job.
    pub job_dir: PathBuf,

    /// Prefix passed to the generator; artifacts are `<prefix><suffix>`.
    pub output_prefix: PathBuf,

    /// Unique project identity.
    pub fragment: ProjectFragment,

    /// 1-based position in corpus order.
    pub ordinal: usize,
}

impl JobDescriptor {
    /// Derive the descriptor for `input` under `output_root`.
    ///
    /// The job directory mirrors the input's relative location:
    /// `<output_root>/<relative parent>/<stem>/`.
    pub fn plan(input: InputFile, output_root: &Path, ordinal: usize) -> Self {
        let stem = input.stem();
        let mut job_dir = output_root.to_path_buf();
        if let Some(parent) = input.rel_path.parent() {
            job_dir.push(parent);
        }
        job_dir.push(&stem);
        let output_prefix = job_dir.join(&stem);
        let fragment = ProjectFragment::from_rel_path(&input.rel_path);

        Self {
            input,
            job_dir,
            output_prefix,
            fragment,
            ordinal,
        }
    }

    /// Stub name (the input's file stem).
    pub fn stub_name(&self) -> String {
        self.input.stem()
    }

    /// Relative input path with `/` separators.
    pub fn rel_path(&self) -> String {
        self.input.display_rel()
    }

    /// Path of a candidate artifact with the given suffix.
    pub fn artifact_path(&self, suffix: &str) -> PathBuf {
        let mut raw = self.output_prefix.clone().into_os_string();
        raw.push(suffix);
        PathBuf::from(raw)
    }
}

/// Plan every job for a scanned corpus, numbering them in corpus order.
pub fn plan_jobs(inputs: Vec<InputFile>, output_root: &Path) -> Vec<JobDescriptor> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| JobDescriptor::plan(input, output_root, i + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn input(rel: &str) -> InputFile {
        InputFile::new(Path::new("/corpus"), Path::new("/corpus").join(rel)).unwrap()
    }

    #[test]
    fn test_same_stem_different_directory_is_distinct() {
        let a = ProjectFragment::from_rel_path(Path::new("a.wit"));
        let b = ProjectFragment::from_rel_path(Path::new("b/a.wit"));
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "a");
        assert_eq!(b.as_str(), "b.a");
    }

    #[test]
    fn test_separator_lookalikes_do_not_collide() {
        let paths = [
            "a/b.wit",
            "a-b.wit",
            "a_b.wit",
            "a.b.wit",
            "a_2fb.wit",
            "a/b/c.wit",
            "a.b/c.wit",
            "a/b.c.wit",
        ];
        let fragments: HashSet<_> = paths
            .iter()
            .map(|p| ProjectFragment::from_rel_path(Path::new(p)))
            .collect();
        assert_eq!(fragments.len(), paths.len());
    }

    #[test]
    fn test_fragment_alphabet_excludes_path_separators() {
        let f = ProjectFragment::from_rel_path(Path::new("deep/nested dir/my.file.wit"));
        assert!(!f.as_str().contains('/'));
        assert!(!f.as_str().contains('\\'));
        assert!(!f.as_str().contains(' '));
        assert!(f
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    }

    #[test]
    fn test_fragment_decodes_to_segments() {
        let f = ProjectFragment::from_rel_path(Path::new("x_y/z.q.wit"));
        let decoded = f.decode().unwrap();
        assert_eq!(decoded, vec![b"x_y".to_vec(), b"z.q".to_vec()]);
    }

    #[test]
    fn test_target_name_suffix() {
        let f = ProjectFragment::from_rel_path(Path::new("b/a.wit"));
        assert_eq!(f.target_name(), "b.a-stub");
    }

    #[test]
    fn test_plan_mirrors_relative_structure() {
        let job = JobDescriptor::plan(input("b/a.wit"), Path::new("/out"), 2);
        assert_eq!(job.job_dir, PathBuf::from("/out/b/a"));
        assert_eq!(job.output_prefix, PathBuf::from("/out/b/a/a"));
        assert_eq!(job.artifact_path(".hpp"), PathBuf::from("/out/b/a/a.hpp"));
        assert_eq!(job.artifact_path("_wamr.cpp"), PathBuf::from("/out/b/a/a_wamr.cpp"));
        assert_eq!(job.rel_path(), "b/a.wit");
        assert_eq!(job.stub_name(), "a");
        assert_eq!(job.ordinal, 2);
    }

    #[test]
    fn test_plan_jobs_gives_exclusive_directories() {
        let jobs = plan_jobs(
            vec![input("a.wit"), input("a/a.wit"), input("b/a.wit"), input("c.wit")],
            Path::new("/out"),
        );
        let dirs: HashSet<_> = jobs.iter().map(|j| j.job_dir.clone()).collect();
        assert_eq!(dirs.len(), jobs.len());
        let ordinals: Vec<_> = jobs.iter().map(|j| j.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_input_outside_root_is_rejected() {
        assert!(InputFile::new(Path::new("/corpus"), PathBuf::from("/elsewhere/a.wit")).is_none());
    }
}
