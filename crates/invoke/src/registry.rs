//! Typed local unit registry.
//!
//! Maps a unit name to a statically-typed handler descriptor (input
//! schema + callable). The schema is validated at registration time and
//! lookups fail closed with a typed "unknown unit" error — never a
//! runtime attribute error.

use async_trait::async_trait;
use ragline_core::error::InvokeError;
use ragline_core::invocation::{FailureKind, InvocationResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// An application-level failure returned by a unit.
#[derive(Debug, Clone)]
pub struct UnitError {
    pub kind: FailureKind,
    pub message: String,
}

impl UnitError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ToolExecutionError,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InvalidInput,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for UnitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A unit of logic executable in-process.
///
/// Every unit declares one canonical input schema; the same schema is what
/// a remote deployment of the unit accepts, which is what makes mode
/// transparent to callers.
#[async_trait]
pub trait UnitHandler: Send + Sync {
    /// The unique unit name (e.g. "retrieval.compose", "retriever.bm25").
    fn name(&self) -> &str;

    /// JSON Schema describing this unit's input payload.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the unit. Application errors come back as `UnitError`,
    /// which the registry converts into a failure result.
    async fn call(&self, input: serde_json::Value) -> Result<serde_json::Value, UnitError>;
}

/// A registry of in-process units, keyed by name.
pub struct UnitRegistry {
    units: HashMap<String, Arc<dyn UnitHandler>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    /// Register a unit, validating its declared schema.
    ///
    /// The schema must be a JSON-schema object declaration. Re-registering
    /// an existing name replaces the previous handler (last write wins).
    pub fn register(&mut self, unit: Arc<dyn UnitHandler>) -> Result<(), InvokeError> {
        let schema = unit.input_schema();
        let is_object_schema = schema
            .get("type")
            .and_then(|t| t.as_str())
            .is_some_and(|t| t == "object");
        if !is_object_schema {
            return Err(InvokeError::InvalidInput {
                unit: unit.name().to_string(),
                reason: "input_schema must declare type \"object\"".into(),
            });
        }

        let name = unit.name().to_string();
        if self.units.insert(name.clone(), unit).is_some() {
            debug!(unit = %name, "Replaced existing unit registration");
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.keys().map(|s| s.as_str()).collect()
    }

    /// Execute a unit by name within the caller's execution context.
    ///
    /// Unknown units and payloads missing required properties fail closed
    /// as `InvalidInput` results; handler errors become failure results
    /// carrying the error detail. Never panics into the caller.
    pub async fn execute(&self, name: &str, payload: serde_json::Value) -> InvocationResult {
        let Some(unit) = self.units.get(name) else {
            warn!(unit = %name, "Invocation of unknown unit");
            return InvocationResult::failure(
                FailureKind::InvalidInput,
                format!("Unknown unit: {name}"),
            );
        };

        if let Err(reason) = validate_required(&unit.input_schema(), &payload) {
            return InvocationResult::failure(
                FailureKind::InvalidInput,
                format!("Invalid input for unit {name}: {reason}"),
            );
        }

        match unit.call(payload).await {
            Ok(output) => InvocationResult::success(output),
            Err(e) => InvocationResult::failure(e.kind, e.message),
        }
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that every `required` property of the schema is present in the
/// payload. Deliberately light: full schema validation is the unit's own
/// concern, this guards against structurally-wrong calls.
fn validate_required(schema: &serde_json::Value, payload: &serde_json::Value) -> Result<(), String> {
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    let object = payload
        .as_object()
        .ok_or_else(|| "payload must be an object".to_string())?;
    for key in required.iter().filter_map(|k| k.as_str()) {
        if !object.contains_key(key) {
            return Err(format!("missing required field '{key}'"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_core::invocation::InvocationStatus;

    struct EchoUnit;

    #[async_trait]
    impl UnitHandler for EchoUnit {
        fn name(&self) -> &str {
            "echo"
        }

        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn call(&self, input: serde_json::Value) -> Result<serde_json::Value, UnitError> {
            Ok(input)
        }
    }

    struct FailingUnit;

    #[async_trait]
    impl UnitHandler for FailingUnit {
        fn name(&self) -> &str {
            "always_fails"
        }

        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }

        async fn call(&self, _input: serde_json::Value) -> Result<serde_json::Value, UnitError> {
            Err(UnitError::execution("deliberate failure"))
        }
    }

    struct BadSchemaUnit;

    #[async_trait]
    impl UnitHandler for BadSchemaUnit {
        fn name(&self) -> &str {
            "bad_schema"
        }

        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!("not a schema")
        }

        async fn call(&self, input: serde_json::Value) -> Result<serde_json::Value, UnitError> {
            Ok(input)
        }
    }

    fn registry() -> UnitRegistry {
        let mut registry = UnitRegistry::new();
        registry.register(Arc::new(EchoUnit)).unwrap();
        registry.register(Arc::new(FailingUnit)).unwrap();
        registry
    }

    #[tokio::test]
    async fn execute_registered_unit() {
        let registry = registry();
        let result = registry
            .execute("echo", serde_json::json!({"text": "hello"}))
            .await;
        assert_eq!(result.status, InvocationStatus::Success);
        assert_eq!(result.payload["text"], "hello");
    }

    #[tokio::test]
    async fn unknown_unit_fails_closed() {
        let registry = registry();
        let result = registry.execute("nonexistent", serde_json::json!({})).await;
        assert_eq!(result.status, InvocationStatus::Failure);
        assert_eq!(result.error.unwrap().kind, FailureKind::InvalidInput);
    }

    #[tokio::test]
    async fn missing_required_field_rejected_before_call() {
        let registry = registry();
        let result = registry.execute("echo", serde_json::json!({})).await;
        assert_eq!(result.status, InvocationStatus::Failure);
        assert!(result.error_message().contains("text"));
    }

    #[tokio::test]
    async fn unit_error_becomes_failure_result() {
        let registry = registry();
        let result = registry.execute("always_fails", serde_json::json!({})).await;
        let detail = result.error.unwrap();
        assert_eq!(detail.kind, FailureKind::ToolExecutionError);
        assert_eq!(detail.message, "deliberate failure");
    }

    #[test]
    fn bad_schema_rejected_at_registration() {
        let mut registry = UnitRegistry::new();
        let err = registry.register(Arc::new(BadSchemaUnit)).unwrap_err();
        assert!(matches!(err, InvokeError::InvalidInput { .. }));
        assert!(!registry.contains("bad_schema"));
    }

    #[test]
    fn reregistration_replaces() {
        let mut registry = UnitRegistry::new();
        registry.register(Arc::new(EchoUnit)).unwrap();
        registry.register(Arc::new(EchoUnit)).unwrap();
        assert_eq!(registry.names().len(), 1);
    }
}
