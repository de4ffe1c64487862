//! The mode-routing dispatcher.
//!
//! Implements `Invoker` by routing `Local` requests to the in-process
//! unit registry and `Remote` requests to the HTTP dispatcher. Callers
//! see identical result shapes either way.

use async_trait::async_trait;
use ragline_core::invocation::{InvocationMode, InvocationRequest, InvocationResult, Invoker};
use std::sync::Arc;
use tracing::debug;

use crate::registry::UnitRegistry;
use crate::remote::RemoteDispatcher;

/// The process-wide invoker. Constructed once at startup with its
/// registry and remote endpoints, then shared via `Arc`.
pub struct Dispatcher {
    registry: Arc<UnitRegistry>,
    remote: RemoteDispatcher,
}

impl Dispatcher {
    pub fn new(registry: Arc<UnitRegistry>, remote: RemoteDispatcher) -> Self {
        Self { registry, remote }
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }
}

#[async_trait]
impl Invoker for Dispatcher {
    async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        debug!(
            unit = %request.unit_name,
            mode = ?request.mode,
            correlation_id = %request.correlation_id,
            "Invoking unit"
        );

        match request.mode {
            InvocationMode::Local => {
                self.registry
                    .execute(&request.unit_name, request.payload)
                    .await
            }
            InvocationMode::Remote => {
                self.remote
                    .dispatch(&request.unit_name, &request.payload, &request.correlation_id)
                    .await
            }
        }
    }
}
