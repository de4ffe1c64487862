//! Error types for the Ragline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Ragline operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Invocation errors ---
    #[error("Invocation error: {0}")]
    Invoke(#[from] InvokeError),

    // --- Chain errors ---
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Registration-time invocation errors.
///
/// Runtime invocation failures are not errors at all: they travel as
/// `InvocationResult` failure payloads so callers can degrade instead
/// of aborting.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("Invalid input for unit {unit}: {reason}")]
    InvalidInput { unit: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("No chain registered for model '{model_id}' task '{task}'")]
    UnknownChain { model_id: String, task: String },

    #[error("Model invocation failed for chain {model_id}/{task}: {reason}")]
    InvocationFailed {
        model_id: String,
        task: String,
        reason: String,
    },

    #[error("Postprocessing failed: {0}")]
    Postprocess(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model decision failed: {0}")]
    DecisionFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Session not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_error_displays_correctly() {
        let err = Error::Invoke(InvokeError::InvalidInput {
            unit: "retrieval.compose".into(),
            reason: "missing required field 'query'".into(),
        });
        assert!(err.to_string().contains("retrieval.compose"));
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn chain_error_displays_correctly() {
        let err = Error::Chain(ChainError::UnknownChain {
            model_id: "gpt-4o".into(),
            task: "generation".into(),
        });
        assert!(err.to_string().contains("gpt-4o"));
        assert!(err.to_string().contains("generation"));
    }

    #[test]
    fn postprocess_error_is_distinct() {
        let err = Error::Chain(ChainError::Postprocess("tag <answer> absent".into()));
        assert!(err.to_string().contains("Postprocessing"));
    }
}
