//! Invocation value objects and the `Invoker` trait.
//!
//! The invocation abstraction is what lets the agent loop, the retrieval
//! composer, and the chain registry call "units" (tools, retrievers,
//! rerankers, model backends) without knowing whether the unit runs
//! in-process or as a separately-deployed worker. Mode is fully transparent
//! to callers: every unit has a single canonical input schema, and identical
//! `unit_name`/`payload` must be acceptable in either mode.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a unit executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    /// Resolve the unit to an in-process handler and call it directly.
    #[default]
    Local,
    /// Serialize the payload and dispatch to a remote worker over HTTP.
    Remote,
}

/// A request to execute a named unit. Immutable once constructed;
/// created per call and discarded after the call returns or fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Name of the target unit (tool, chain, retriever, model backend).
    pub unit_name: String,

    /// Structured input payload — the unit's canonical input schema.
    pub payload: serde_json::Value,

    /// Execution mode.
    #[serde(default)]
    pub mode: InvocationMode,

    /// Correlation ID for tracing a call across process boundaries.
    pub correlation_id: String,
}

impl InvocationRequest {
    pub fn new(
        unit_name: impl Into<String>,
        payload: serde_json::Value,
        mode: InvocationMode,
    ) -> Self {
        Self {
            unit_name: unit_name.into(),
            payload,
            mode,
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Convenience constructor for local invocations.
    pub fn local(unit_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(unit_name, payload, InvocationMode::Local)
    }

    /// Convenience constructor for remote invocations.
    pub fn remote(unit_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(unit_name, payload, InvocationMode::Remote)
    }
}

/// Whether an invocation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Success,
    Failure,
}

/// Classification of an invocation failure.
///
/// - `InvalidInput` — malformed payload or unknown unit; never retried.
/// - `TransientFailure` — timeout / transport error; eligible for one
///   bounded retry at the dispatch boundary.
/// - `ToolExecutionError` — the unit ran but returned an application error;
///   fed back into the agent loop rather than surfaced to the end user.
/// - `PostprocessError` — expected output structure absent; hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    TransientFailure,
    ToolExecutionError,
    PostprocessError,
}

/// Detail attached to a failed invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: FailureKind,
    pub message: String,
}

/// The result of one invocation. No persistent identity.
///
/// Unit-level failures (including exceptions inside local handlers) are
/// failure *results*, not `Err` values — callers always get a terminal
/// result and decide fallback policy themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    pub status: InvocationStatus,

    /// The unit's output on success; `null` on failure.
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Failure detail, present iff `status == Failure`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl InvocationResult {
    /// A successful result carrying the unit's output payload.
    pub fn success(payload: serde_json::Value) -> Self {
        Self {
            status: InvocationStatus::Success,
            payload,
            error: None,
        }
    }

    /// A failed result carrying an error classification and detail.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status: InvocationStatus::Failure,
            payload: serde_json::Value::Null,
            error: Some(ErrorDetail {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Success
    }

    /// The failure message, or an empty string for successes.
    pub fn error_message(&self) -> &str {
        self.error.as_ref().map(|e| e.message.as_str()).unwrap_or("")
    }
}

/// The core invocation trait.
///
/// Implemented by the dispatcher in `ragline-invoke`. Callers construct an
/// `InvocationRequest` and get back an `InvocationResult` regardless of
/// whether the unit ran locally or on a remote worker.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, request: InvocationRequest) -> InvocationResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_generates_correlation_id() {
        let req = InvocationRequest::local("echo", serde_json::json!({"text": "hi"}));
        assert!(!req.correlation_id.is_empty());
        assert_eq!(req.mode, InvocationMode::Local);
    }

    #[test]
    fn success_result_has_no_error() {
        let result = InvocationResult::success(serde_json::json!({"text": "hi"}));
        assert!(result.is_success());
        assert!(result.error.is_none());
        assert_eq!(result.error_message(), "");
    }

    #[test]
    fn failure_result_carries_kind_and_detail() {
        let result = InvocationResult::failure(FailureKind::TransientFailure, "timed out");
        assert!(!result.is_success());
        let detail = result.error.as_ref().unwrap();
        assert_eq!(detail.kind, FailureKind::TransientFailure);
        assert_eq!(result.error_message(), "timed out");
        assert!(result.payload.is_null());
    }

    #[test]
    fn result_serialization_roundtrip() {
        let result = InvocationResult::failure(FailureKind::InvalidInput, "missing 'query'");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""status":"failure""#));
        assert!(json.contains(r#""kind":"invalid_input""#));

        let back: InvocationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, InvocationStatus::Failure);
    }
}
