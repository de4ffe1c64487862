//! Conversation turn types and per-request state.
//!
//! `TurnState` is the value object threaded through one request:
//! preprocessing → agent loop → generation → persistence. Stages take a
//! state and return a new one — nothing mutates shared structure in place,
//! which keeps ordering and ownership auditable.

use serde::{Deserialize, Serialize};

use crate::retrieval::RetrievalCandidate;

/// The role of a turn in the model-visible conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Tool,
            content: content.into(),
        }
    }
}

/// A record of one tool invocation made during a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTrace {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub success: bool,
    pub output: String,
}

/// Per-request conversation state.
///
/// Invariants:
/// - `chat_history` is append-only and never reordered.
/// - The current `query` is the most recent human turn; it is held *out of*
///   `chat_history` while the request is in flight and re-appended (with
///   the answer) when the state is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    /// The current user utterance.
    pub query: String,

    /// Prior turns, oldest first. Excludes the current query.
    pub chat_history: Vec<ChatTurn>,

    /// Tool calls made so far in this request, in execution order.
    #[serde(default)]
    pub tool_trace: Vec<ToolTrace>,

    /// Context documents gathered so far (retrieval results).
    #[serde(default)]
    pub context_docs: Vec<RetrievalCandidate>,

    /// Free-form response metadata accumulated by pipeline stages.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TurnState {
    pub fn new(query: impl Into<String>, chat_history: Vec<ChatTurn>) -> Self {
        Self {
            query: query.into(),
            chat_history,
            tool_trace: Vec::new(),
            context_docs: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// The history to expose to a model invocation: prior turns only,
    /// current query excluded.
    pub fn history_for_model(&self) -> &[ChatTurn] {
        &self.chat_history
    }

    /// Return a new state with the query replaced (e.g. after rewrite).
    /// The original query is kept in `extra` under `original_query`.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let original = std::mem::take(&mut self.query);
        self.extra.insert(
            "original_query".into(),
            serde_json::Value::String(original),
        );
        self.query = query.into();
        self
    }

    /// Return a new state with a tool trace entry appended.
    pub fn with_trace(mut self, trace: ToolTrace) -> Self {
        self.tool_trace.push(trace);
        self
    }

    /// Return a new state with context documents appended.
    pub fn with_context_docs(mut self, docs: Vec<RetrievalCandidate>) -> Self {
        self.context_docs.extend(docs);
        self
    }

    /// Consume the state, re-appending the current query and the final
    /// answer as the last two turns. This is the shape handed to the
    /// session collaborator for persistence.
    pub fn into_persisted(mut self, answer: impl Into<String>) -> Vec<ChatTurn> {
        self.chat_history.push(ChatTurn::user(self.query));
        self.chat_history.push(ChatTurn::assistant(answer));
        self.chat_history
    }
}
