//! Tool descriptors — the capabilities an agent turn may invoke.
//!
//! Unlike a registry of executable handlers, a `ToolDescriptor` only names
//! a unit for the invocation abstraction; execution happens through an
//! `Invoker`, so the agent never knows whether a tool runs in-process or
//! on a remote worker.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::invocation::InvocationMode;

/// A tool the agent loop may select during a conversation turn.
///
/// Registered at loop construction time; immutable for the duration of
/// the turn. Unique by `name` within one turn's tool set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// The tool name the model selects by.
    pub name: String,

    /// Description of what the tool does (sent to the model).
    pub description: String,

    /// JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,

    /// Unit name understood by the invocation abstraction.
    pub invocation_target: String,

    /// Where the unit runs.
    #[serde(default)]
    pub mode: InvocationMode,
}

/// The set of tools available to one conversation turn, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: HashMap<String, ToolDescriptor>,
}

impl ToolSet {
    pub fn new(descriptors: Vec<ToolDescriptor>) -> Self {
        let mut tools = HashMap::new();
        for descriptor in descriptors {
            // Duplicate names: last one wins, same as registry semantics.
            tools.insert(descriptor.name.clone(), descriptor);
        }
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Descriptors in a stable (sorted-by-name) order, for rendering the
    /// tool listing into a prompt.
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        let mut all: Vec<&ToolDescriptor> = self.tools.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
