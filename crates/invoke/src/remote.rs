//! Remote unit dispatch over HTTP.
//!
//! Serializes the input payload to a JSON request, posts it to the worker
//! endpoint configured for the unit, and decodes the worker's
//! `InvocationResult` body. Every call has a bounded timeout; a timeout or
//! transport failure is a transient failure distinct from an
//! application-level error returned by the remote unit, and gets exactly
//! one retry before propagating.

use ragline_core::invocation::{FailureKind, InvocationResult};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Dispatches invocations to separately-deployed workers.
///
/// The `reqwest::Client` is injected at construction (one per process,
/// shared) — never a lazily-initialized global.
pub struct RemoteDispatcher {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
    timeout: Duration,
}

impl RemoteDispatcher {
    pub fn new(
        client: reqwest::Client,
        endpoints: HashMap<String, String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoints,
            timeout,
        }
    }

    pub fn has_endpoint(&self, unit: &str) -> bool {
        self.endpoints.contains_key(unit)
    }

    /// Dispatch one invocation, retrying once on a transient failure.
    pub async fn dispatch(
        &self,
        unit: &str,
        payload: &serde_json::Value,
        correlation_id: &str,
    ) -> InvocationResult {
        let Some(endpoint) = self.endpoints.get(unit) else {
            warn!(unit = %unit, "No remote endpoint configured");
            return InvocationResult::failure(
                FailureKind::InvalidInput,
                format!("No remote endpoint configured for unit: {unit}"),
            );
        };

        match self.post_once(endpoint, unit, payload, correlation_id).await {
            Outcome::Done(result) => result,
            Outcome::Transient(first_reason) => {
                debug!(unit = %unit, reason = %first_reason, "Transient failure, retrying once");
                match self.post_once(endpoint, unit, payload, correlation_id).await {
                    Outcome::Done(result) => result,
                    Outcome::Transient(reason) => {
                        warn!(unit = %unit, reason = %reason, "Retry also failed");
                        InvocationResult::failure(
                            FailureKind::TransientFailure,
                            format!("Remote unit {unit} unavailable: {reason}"),
                        )
                    }
                }
            }
        }
    }

    async fn post_once(
        &self,
        endpoint: &str,
        unit: &str,
        payload: &serde_json::Value,
        correlation_id: &str,
    ) -> Outcome {
        let response = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .header("X-Correlation-Id", correlation_id)
            .json(payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Outcome::Transient(format!("request timed out: {e}"));
            }
            Err(e) if e.is_connect() => {
                return Outcome::Transient(format!("connection failed: {e}"));
            }
            Err(e) => {
                return Outcome::Transient(e.to_string());
            }
        };

        let status = response.status();
        if status.is_server_error() {
            return Outcome::Transient(format!("worker returned {status}"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Outcome::Done(InvocationResult::failure(
                FailureKind::ToolExecutionError,
                format!("Remote unit {unit} returned {status}: {body}"),
            ));
        }

        match response.json::<InvocationResult>().await {
            Ok(result) => Outcome::Done(result),
            Err(e) => Outcome::Done(InvocationResult::failure(
                FailureKind::ToolExecutionError,
                format!("Malformed response from unit {unit}: {e}"),
            )),
        }
    }
}

enum Outcome {
    /// A terminal result (success or application failure).
    Done(InvocationResult),
    /// Transport-level trouble, eligible for retry.
    Transient(String),
}
