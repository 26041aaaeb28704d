//! Per-job (leaf) build descriptors.

use crate::domain::{ArtifactSet, JobDescriptor};
use std::path::{Path, PathBuf};

/// File name used for both leaf and aggregator descriptors.
pub const DESCRIPTOR_FILE: &str = "CMakeLists.txt";

/// A static-library project wrapping one job's generated sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafProject {
    /// Directory holding the descriptor and the artifacts.
    pub dir: PathBuf,

    /// Human-facing project name (the stub name).
    pub project_name: String,

    /// Unique library target (`<fragment>-stub`).
    pub target: String,

    /// Source file names, relative to `dir`.
    pub sources: Vec<String>,

    /// Header file names, relative to `dir`.
    pub headers: Vec<String>,

    /// Fallback include directory, relative to `dir`, for standalone builds.
    pub include_fallback: String,
}

impl LeafProject {
    /// Describe the leaf project for a successful job.
    ///
    /// Returns `None` when the job produced no compilable unit; header-only
    /// output gets no descriptor.
    pub fn for_job(
        job: &JobDescriptor,
        artifacts: &ArtifactSet,
        output_root: &Path,
        include_fallback: &str,
    ) -> Option<Self> {
        let sources = file_names(artifacts.sources());
        if sources.is_empty() {
            return None;
        }
        let headers = file_names(artifacts.headers());

        let depth = job
            .job_dir
            .strip_prefix(output_root)
            .map(|rel| rel.components().count())
            .unwrap_or(0);
        let include_fallback = format!("{}{}", "../".repeat(depth), include_fallback);

        Some(Self {
            dir: job.job_dir.clone(),
            project_name: job.stub_name(),
            target: job.fragment.target_name(),
            sources,
            headers,
            include_fallback,
        })
    }

    /// Path the descriptor is written to.
    pub fn path(&self) -> PathBuf {
        self.dir.join(DESCRIPTOR_FILE)
    }

    /// Render the descriptor text.
    pub fn render(&self) -> String {
        let t = &self.target;
        let mut out = String::new();
        out.push_str(&format!(
            "# Generated by stubcheck for compile-testing the {} stub.\n",
            self.project_name
        ));
        out.push_str("# Sources ending in _wamr.cpp need the WAMR runtime headers on the include path.\n\n");
        out.push_str("cmake_minimum_required(VERSION 3.10)\n");
        out.push_str(&format!("project({}-test)\n\n", t));
        out.push_str("set(CMAKE_CXX_STANDARD 20)\n");
        out.push_str("set(CMAKE_CXX_STANDARD_REQUIRED ON)\n\n");

        out.push_str("# Include paths are inherited when built from the aggregator project.\n");
        out.push_str("if(NOT DEFINED CMCPP_INCLUDE_DIR AND NOT TARGET cmcpp)\n");
        out.push_str("    find_package(cmcpp QUIET)\n");
        out.push_str("    if(NOT cmcpp_FOUND)\n");
        out.push_str(&format!(
            "        set(CMCPP_INCLUDE_DIR \"${{CMAKE_CURRENT_SOURCE_DIR}}/{}\")\n",
            self.include_fallback
        ));
        out.push_str("        if(NOT EXISTS \"${CMCPP_INCLUDE_DIR}/cmcpp.hpp\")\n");
        out.push_str("            message(FATAL_ERROR \"cmcpp headers not found. Set CMCPP_INCLUDE_DIR or install cmcpp.\")\n");
        out.push_str("        endif()\n");
        out.push_str("        include_directories(${CMCPP_INCLUDE_DIR})\n");
        out.push_str("    endif()\n");
        out.push_str("endif()\n\n");

        out.push_str("if(MSVC AND NOT CMAKE_CXX_FLAGS MATCHES \"/wd4244\")\n");
        out.push_str("    add_compile_options(/wd4244 /wd4267 /wd4305 /wd4309)\n");
        out.push_str("endif()\n\n");

        out.push_str("set(STUB_SOURCES\n");
        for s in &self.sources {
            out.push_str(&format!("    {}\n", s));
        }
        out.push_str(")\n\n");

        if !self.headers.is_empty() {
            out.push_str("set(STUB_HEADERS\n");
            for h in &self.headers {
                out.push_str(&format!("    {}\n", h));
            }
            out.push_str(")\n\n");
        }

        let header_var = if self.headers.is_empty() {
            ""
        } else {
            "\n    ${STUB_HEADERS}"
        };
        out.push_str(&format!(
            "add_library({} STATIC\n    ${{STUB_SOURCES}}{}\n)\n\n",
            t, header_var
        ));
        out.push_str("if(TARGET cmcpp::cmcpp)\n");
        out.push_str(&format!("    target_link_libraries({} PRIVATE cmcpp::cmcpp)\n", t));
        out.push_str("else()\n");
        out.push_str(&format!(
            "    target_include_directories({} PRIVATE ${{CMCPP_INCLUDE_DIR}})\n",
            t
        ));
        out.push_str("endif()\n\n");
        out.push_str(&format!(
            "target_include_directories({} PRIVATE ${{CMAKE_CURRENT_SOURCE_DIR}})\n",
            t
        ));
        out
    }

    /// Write the descriptor, replacing any previous one.
    pub fn write(&self) -> std::io::Result<PathBuf> {
        let path = self.path();
        std::fs::write(&path, self.render())?;
        Ok(path)
    }
}

fn file_names(paths: Vec<&Path>) -> Vec<String> {
    paths
        .into_iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InputFile;

    fn job(rel: &str, out: &Path) -> JobDescriptor {
        let corpus = Path::new("/corpus");
        JobDescriptor::plan(InputFile::new(corpus, corpus.join(rel)).unwrap(), out, 1)
    }

    #[test]
    fn test_header_only_job_gets_no_leaf() {
        let out = Path::new("/out");
        let j = job("a.wit", out);
        let artifacts = ArtifactSet::new(vec![j.artifact_path(".hpp")]);
        assert!(LeafProject::for_job(&j, &artifacts, out, "../../../include").is_none());
    }

    #[test]
    fn test_leaf_uses_unique_target_and_relative_fallback() {
        let out = Path::new("/out");
        let j = job("b/a.wit", out);
        let artifacts = ArtifactSet::new(vec![
            j.artifact_path(".hpp"),
            j.artifact_path("_wamr.hpp"),
            j.artifact_path("_wamr.cpp"),
        ]);
        let leaf = LeafProject::for_job(&j, &artifacts, out, "../../../include").unwrap();
        assert_eq!(leaf.target, "b.a-stub");
        assert_eq!(leaf.project_name, "a");
        assert_eq!(leaf.sources, vec!["a_wamr.cpp"]);
        assert_eq!(leaf.headers, vec!["a.hpp", "a_wamr.hpp"]);
        assert_eq!(leaf.include_fallback, "../../../../../include");
        assert_eq!(leaf.path(), PathBuf::from("/out/b/a/CMakeLists.txt"));

        let text = leaf.render();
        assert!(text.contains("project(b.a-stub-test)"));
        assert!(text.contains("add_library(b.a-stub STATIC"));
        assert!(text.contains("    a_wamr.cpp\n"));
        assert!(text.contains("${CMAKE_CURRENT_SOURCE_DIR}/../../../../../include"));
    }

    #[test]
    fn test_same_stem_jobs_render_different_targets() {
        let out = Path::new("/out");
        let a = job("a.wit", out);
        let b = job("b/a.wit", out);
        let leaf_a = LeafProject::for_job(
            &a,
            &ArtifactSet::new(vec![a.artifact_path("_wamr.cpp")]),
            out,
            "include",
        )
        .unwrap();
        let leaf_b = LeafProject::for_job(
            &b,
            &ArtifactSet::new(vec![b.artifact_path("_wamr.cpp")]),
            out,
            "include",
        )
        .unwrap();
        assert_ne!(leaf_a.target, leaf_b.target);
    }

    #[test]
    fn test_write_creates_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let j = job("x.wit", dir.path());
        std::fs::create_dir_all(&j.job_dir).unwrap();
        let artifacts = ArtifactSet::new(vec![j.artifact_path("_wamr.cpp")]);
        let leaf = LeafProject::for_job(&j, &artifacts, dir.path(), "include").unwrap();
        let path = leaf.write().unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, leaf.render());
    }
}
