//! External tool definitions: the generator under test and the C++ compiler.
//!
//! Both are resolved once, before any job is dispatched, so a missing tool is
//! a configuration error rather than one failure per job.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stubcheck_core::config::{CompilerConfig, GeneratorConfig};
use stubcheck_core::{JobDescriptor, Result, StubcheckError};
use tracing::debug;

/// Name of the directory vcpkg installs dependencies into.
pub const VCPKG_INSTALLED: &str = "vcpkg_installed";

/// The generator executable. Invoked as `<program> <input> <output prefix>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorTool {
    pub program: PathBuf,
    pub timeout: Duration,
}

impl GeneratorTool {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    /// Resolve the configured generator.
    ///
    /// An existing file path is used as is; a bare name is looked up on
    /// `PATH`.
    pub fn resolve(config: &GeneratorConfig) -> Result<Self> {
        let path = config.path.clone().ok_or_else(|| {
            StubcheckError::InvalidConfig("no generator configured (use --generator)".to_string())
        })?;
        let program = if path.is_file() {
            path
        } else {
            which::which(&path).map_err(|_| StubcheckError::GeneratorNotFound(path.clone()))?
        };
        debug!(generator = %program.display(), "resolved generator");
        Ok(Self::new(program, config.timeout()))
    }

    pub fn args(&self, job: &JobDescriptor) -> Vec<OsString> {
        vec![
            job.input.path.clone().into_os_string(),
            job.output_prefix.clone().into_os_string(),
        ]
    }
}

/// The compiler used to check generated stubs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerTool {
    pub program: PathBuf,
    pub flags: Vec<String>,
    /// Configured directories plus any discovered vcpkg include directory.
    pub include_dirs: Vec<PathBuf>,
    pub timeout: Duration,
}

impl CompilerTool {
    /// Resolve the compiler on `PATH` and collect include directories.
    pub fn resolve(config: &CompilerConfig, output_root: &Path) -> Result<Self> {
        let program = which::which(&config.path)
            .map_err(|_| StubcheckError::CompilerNotFound(config.path.clone()))?;

        let mut include_dirs = config.include_dirs.clone();
        if let Some(vcpkg) = find_vcpkg_include(output_root, &config.include_dirs) {
            debug!(include = %vcpkg.display(), "using vcpkg includes");
            include_dirs.push(vcpkg);
        }

        Ok(Self {
            program,
            flags: config.flags.clone(),
            include_dirs,
            timeout: config.timeout(),
        })
    }

    /// Arguments for checking `unit`: flags, include paths (configured dirs
    /// first, then `extra_includes`), then the unit.
    pub fn args(&self, unit: &Path, extra_includes: &[PathBuf]) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.flags.iter().map(OsString::from).collect();
        for dir in self.include_dirs.iter().chain(extra_includes) {
            let mut flag = OsString::from("-I");
            flag.push(dir.as_os_str());
            args.push(flag);
        }
        args.push(unit.as_os_str().to_os_string());
        args
    }
}

/// Locate `vcpkg_installed/<triplet>/include`.
///
/// Looks beside the output root and its parent, then beside each include
/// directory (and its sibling `build/`). The first triplet directory in name
/// order that has an `include` subdirectory wins.
pub fn find_vcpkg_include(output_root: &Path, include_dirs: &[PathBuf]) -> Option<PathBuf> {
    let mut roots = vec![output_root.join(VCPKG_INSTALLED)];
    if let Some(parent) = output_root.parent() {
        roots.push(parent.join(VCPKG_INSTALLED));
    }
    for dir in include_dirs {
        if let Some(parent) = dir.parent() {
            roots.push(parent.join("build").join(VCPKG_INSTALLED));
            roots.push(parent.join(VCPKG_INSTALLED));
        }
    }

    let installed = roots.into_iter().find(|r| r.is_dir())?;
    let mut triplets: Vec<PathBuf> = std::fs::read_dir(&installed)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    triplets.sort();
    triplets
        .into_iter()
        .map(|t| t.join("include"))
        .find(|inc| inc.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stubcheck_core::InputFile;

    fn job(out: &Path) -> JobDescriptor {
        let corpus = Path::new("/corpus");
        JobDescriptor::plan(
            InputFile::new(corpus, corpus.join("b/a.wit")).unwrap(),
            out,
            1,
        )
    }

    #[test]
    fn test_generator_args() {
        let tool = GeneratorTool::new(PathBuf::from("/bin/gen"), Duration::from_secs(30));
        let args = tool.args(&job(Path::new("/out")));
        assert_eq!(
            args,
            vec![OsString::from("/corpus/b/a.wit"), OsString::from("/out/b/a/a")]
        );
    }

    #[test]
    fn test_generator_missing_is_configuration_error() {
        let config = GeneratorConfig {
            path: Some(PathBuf::from("/definitely/not/here/gen")),
            ..Default::default()
        };
        let err = GeneratorTool::resolve(&config).unwrap_err();
        assert!(matches!(err, StubcheckError::GeneratorNotFound(_)));
        assert!(err.is_configuration());

        let err = GeneratorTool::resolve(&GeneratorConfig::default()).unwrap_err();
        assert!(matches!(err, StubcheckError::InvalidConfig(_)));
    }

    #[test]
    fn test_generator_existing_file_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let gen = dir.path().join("gen");
        std::fs::write(&gen, "#!/bin/sh\n").unwrap();
        let config = GeneratorConfig {
            path: Some(gen.clone()),
            timeout_secs: 7,
            ..Default::default()
        };
        let tool = GeneratorTool::resolve(&config).unwrap();
        assert_eq!(tool.program, gen);
        assert_eq!(tool.timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_compiler_missing_is_configuration_error() {
        let config = CompilerConfig {
            path: "no-such-compiler-xyz++".to_string(),
            ..Default::default()
        };
        let err = CompilerTool::resolve(&config, Path::new("/out")).unwrap_err();
        assert!(matches!(err, StubcheckError::CompilerNotFound(_)));
    }

    #[test]
    fn test_compiler_args_order() {
        let tool = CompilerTool {
            program: PathBuf::from("/usr/bin/g++"),
            flags: vec!["-std=c++20".to_string(), "-fsyntax-only".to_string()],
            include_dirs: vec![PathBuf::from("/inc")],
            timeout: Duration::from_secs(30),
        };
        let j = job(Path::new("/out"));
        let unit = j.artifact_path("_wamr.cpp");
        let args = tool.args(&unit, &[j.job_dir.clone()]);
        assert_eq!(
            args,
            vec![
                OsString::from("-std=c++20"),
                OsString::from("-fsyntax-only"),
                OsString::from("-I/inc"),
                OsString::from("-I/out/b/a"),
                OsString::from("/out/b/a/a_wamr.cpp"),
            ]
        );
    }

    #[test]
    fn test_find_vcpkg_include() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("build/generated_stubs");
        std::fs::create_dir_all(&out).unwrap();
        assert_eq!(find_vcpkg_include(&out, &[]), None);

        let installed = dir.path().join("build").join(VCPKG_INSTALLED);
        std::fs::create_dir_all(installed.join(".hidden/include")).unwrap();
        std::fs::create_dir_all(installed.join("x64-linux/include")).unwrap();
        std::fs::create_dir_all(installed.join("vcpkg")).unwrap();
        assert_eq!(
            find_vcpkg_include(&out, &[]),
            Some(installed.join("x64-linux/include"))
        );
    }
}
