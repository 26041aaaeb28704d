//! Error taxonomy for stubcheck.
//!
//! Only configuration-class errors ever abort a run, and they are raised
//! before the first job is dispatched. Everything that can go wrong inside a
//! single job is a value ([`crate::JobOutcome`]), not an error.

use std::path::PathBuf;

/// stubcheck errors.
#[derive(Debug, thiserror::Error)]
pub enum StubcheckError {
    #[error("generator not found at {}", .0.display())]
    GeneratorNotFound(PathBuf),

    #[error("compiler not found: {0}")]
    CompilerNotFound(String),

    #[error("corpus directory not found at {}", .0.display())]
    CorpusNotFound(PathBuf),

    #[error("no .{extension} files found in {}", root.display())]
    NoInputs { root: PathBuf, extension: String },

    #[error("aggregator template not found at {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("log file not found: {}", .0.display())]
    LogNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("invalid log pattern '{name}': {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StubcheckError {
    /// Whether this error belongs to the configuration class that aborts a
    /// run before any job starts.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, StubcheckError::Serialization(_) | StubcheckError::Io(_))
    }
}

/// Result type for stubcheck operations.
pub type Result<T> = std::result::Result<T, StubcheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_not_found_display() {
        let err = StubcheckError::GeneratorNotFound(PathBuf::from("/opt/gen"));
        assert!(err.to_string().contains("generator not found"));
        assert!(err.to_string().contains("/opt/gen"));
    }

    #[test]
    fn test_no_inputs_display() {
        let err = StubcheckError::NoInputs {
            root: PathBuf::from("corpus"),
            extension: "wit".to_string(),
        };
        assert_eq!(err.to_string(), "no .wit files found in corpus");
    }

    #[test]
    fn test_configuration_classification() {
        assert!(StubcheckError::CorpusNotFound(PathBuf::from("x")).is_configuration());
        assert!(StubcheckError::UnknownGroup("async".to_string()).is_configuration());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert!(!StubcheckError::Io(io).is_configuration());
    }
}
