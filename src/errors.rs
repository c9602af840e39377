//! Typed error hierarchy for frontsmith.
//!
//! Four enums cover the four subsystems:
//! - `WorkflowError`: stage and engine failures
//! - `ModelError`: language-model transport failures
//! - `StoreError`: thread persistence failures
//! - `ExportError`: writing generated code to disk

use thiserror::Error;

use crate::conversation::ThreadId;
use crate::workflow::Stage;

/// Errors from the workflow engine and its stages.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The stage's decision call returned nothing usable.
    #[error("{stage} could not produce a valid decision: {reason}")]
    ClassificationFailure { stage: Stage, reason: String },

    /// The underlying model call failed before producing a response.
    #[error("{stage} model call failed: {source}")]
    ExternalCallFailure {
        stage: Stage,
        #[source]
        source: ModelError,
    },

    #[error("Thread {0} not found")]
    UnknownThread(ThreadId),

    #[error("Thread {0} already exists")]
    ThreadExists(ThreadId),

    #[error("A conversation must start with a user turn")]
    MissingUserTurn,

    #[error("Request text is empty")]
    EmptyInput,

    #[error("{from} cannot hand off to {to}")]
    IllegalTransition { from: Stage, to: String },

    #[error("Workflow stopped after {limit} steps without reaching human review")]
    StepLimitExceeded { limit: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Whether the failure came from the model side (call or decision parsing).
    pub fn is_model_failure(&self) -> bool {
        matches!(
            self,
            Self::ClassificationFailure { .. } | Self::ExternalCallFailure { .. }
        )
    }
}

/// Errors from a language-model backend.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to spawn model process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Model process I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model process exited with code {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model endpoint returned {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Scripted model has no response left")]
    ScriptExhausted,

    #[error("{0}")]
    Scripted(String),
}

/// Errors from thread persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store task panicked: {0}")]
    TaskFailed(String),

    #[error("Thread {0} already exists")]
    ThreadExists(String),

    #[error("Corrupt record for thread {thread}: {message}")]
    CorruptRecord { thread: String, message: String },

    #[error("Failed to create store directory {path}: {source}")]
    CreateDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from exporting generated code.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No valid code blocks found; files not created")]
    NoCodeBlocks,

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_failure_names_stage() {
        let err = WorkflowError::ClassificationFailure {
            stage: Stage::Router,
            reason: "unknown branch 'tester'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("router"));
        assert!(msg.contains("tester"));
        assert!(err.is_model_failure());
    }

    #[test]
    fn external_call_failure_carries_source() {
        let err = WorkflowError::ExternalCallFailure {
            stage: Stage::Generator,
            source: ModelError::NonZeroExit {
                exit_code: 2,
                stderr: "rate limited".into(),
            },
        };
        match &err {
            WorkflowError::ExternalCallFailure { stage, source } => {
                assert_eq!(*stage, Stage::Generator);
                assert!(matches!(source, ModelError::NonZeroExit { exit_code: 2, .. }));
            }
            _ => panic!("Expected ExternalCallFailure"),
        }
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn store_error_converts_into_workflow_error() {
        let err: WorkflowError = StoreError::LockPoisoned.into();
        assert!(matches!(err, WorkflowError::Store(StoreError::LockPoisoned)));
        assert!(!err.is_model_failure());
    }

    #[test]
    fn step_limit_carries_limit() {
        let err = WorkflowError::StepLimitExceeded { limit: 25 };
        assert!(err.to_string().contains("25"));
    }

    #[test]
    fn export_error_no_blocks_message() {
        assert_eq!(
            ExportError::NoCodeBlocks.to_string(),
            "No valid code blocks found; files not created"
        );
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&WorkflowError::EmptyInput);
        assert_std_error(&ModelError::EmptyResponse);
        assert_std_error(&StoreError::LockPoisoned);
        assert_std_error(&ExportError::NoCodeBlocks);
    }
}
