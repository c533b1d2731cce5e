//! Error Types
//!
//! A single error enum covers every failure the runner core can surface.
//! Lookup failures are kept as distinct variants so callers can match on
//! them instead of parsing messages.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while loading documents, marshalling parameters or
/// driving a runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Workflow '{0}' not found in CWL document")]
    WorkflowNotFound(String),

    #[error("Input '{0}' not found")]
    InputNotFound(String),

    #[error("Output '{0}' not found")]
    OutputNotFound(String),

    #[error("Cannot convert value '{value}' of input '{name}' to {data_type}")]
    Conversion {
        name: String,
        value: String,
        data_type: String,
    },

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse CWL document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to parse service {document}: {source}")]
    HostDocument {
        document: &'static str,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid CWL document: {0}")]
    InvalidDocument(String),

    #[error("Execution handler failed: {0}")]
    Handler(String),

    #[error("Backend failed: {0}")]
    Backend(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),
}

impl RunnerError {
    /// Builds a [`RunnerError::Handler`] from any message.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    /// Builds a [`RunnerError::Backend`] from any message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Returns true for the lookup family (workflow, input, output).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WorkflowNotFound(_) | Self::InputNotFound(_) | Self::OutputNotFound(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_family() {
        assert!(RunnerError::WorkflowNotFound("main".into()).is_not_found());
        assert!(RunnerError::InputNotFound("aoi".into()).is_not_found());
        assert!(RunnerError::OutputNotFound("stac".into()).is_not_found());
        assert!(!RunnerError::handler("boom").is_not_found());
        assert!(!RunnerError::Cancelled.is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = RunnerError::Conversion {
            name: "bands".into(),
            value: "abc".into(),
            data_type: "float".into(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot convert value 'abc' of input 'bands' to float"
        );
        assert_eq!(
            RunnerError::WorkflowNotFound("not-main".into()).to_string(),
            "Workflow 'not-main' not found in CWL document"
        );
        assert_eq!(
            RunnerError::backend("pod evicted").to_string(),
            "Backend failed: pod evicted"
        );
    }

    #[test]
    fn test_host_document_errors_name_the_document() {
        let source = serde_yaml::from_str::<u32>("not a number").unwrap_err();
        let err = RunnerError::HostDocument {
            document: "inputs",
            source,
        };
        let message = err.to_string();
        assert!(message.starts_with("Failed to parse service inputs: "));
        assert!(!message.contains("CWL"));
    }
}
