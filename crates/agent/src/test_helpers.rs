//! Scripted invoker for agent tests.
//!
//! Responses are queued per unit name and consumed in order; a unit may
//! also carry a fixed response that answers every call once (or instead
//! of) its queue. Unscripted units fail with an invalid-input result so
//! a test that drifts from its script fails loudly.

use async_trait::async_trait;
use ragline_core::invocation::{
    FailureKind, InvocationRequest, InvocationResult, Invoker,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub struct ScriptedInvoker {
    queued: Mutex<HashMap<String, VecDeque<InvocationResult>>>,
    fixed: HashMap<String, InvocationResult>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(HashMap::new()),
            fixed: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue one response for a unit; consumed in FIFO order.
    pub fn enqueue(self, unit: &str, result: InvocationResult) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(unit.to_string())
            .or_default()
            .push_back(result);
        self
    }

    /// Fixed response for a unit, used whenever its queue is empty.
    pub fn fixed(mut self, unit: &str, result: InvocationResult) -> Self {
        self.fixed.insert(unit.to_string(), result);
        self
    }

    /// How many times the given unit was invoked.
    pub fn calls_to(&self, unit: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|name| name.as_str() == unit)
            .count()
    }
}

#[async_trait]
impl Invoker for ScriptedInvoker {
    async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        self.calls.lock().unwrap().push(request.unit_name.clone());

        if let Some(result) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&request.unit_name)
            .and_then(|queue| queue.pop_front())
        {
            return result;
        }
        if let Some(result) = self.fixed.get(&request.unit_name) {
            return result.clone();
        }
        InvocationResult::failure(
            FailureKind::InvalidInput,
            format!("no scripted response for unit '{}'", request.unit_name),
        )
    }
}

/// A successful model-backend result carrying the given text.
pub fn model_text(text: &str) -> InvocationResult {
    InvocationResult::success(serde_json::json!({ "text": text }))
}
