//! Streaming message envelopes.
//!
//! Typed messages delivered over a persistent client connection. The
//! protocol ordering (enforced by the emitter in `ragline-stream`):
//! `START` precedes any content; exactly one of `END`/`ERROR` is last;
//! nothing follows a terminal message.

use serde::{Deserialize, Serialize};

use crate::retrieval::RetrievalCandidate;

/// One message on the streaming channel.
///
/// Wire shape: `{"message_type": "CHUNK", "message": {"content": "..."}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type", content = "message", rename_all = "UPPERCASE")]
pub enum StreamMessage {
    /// Sent once, before any content.
    Start,

    /// An incremental text fragment (one sentence-equivalent unit).
    Chunk { content: String },

    /// Retrieved-source metadata. Zero or one per stream.
    Context { docs: Vec<RetrievalCandidate> },

    /// Terminal success. Mutually exclusive with `Error`.
    End,

    /// Terminal failure with human-readable content. The connection
    /// remains open for further requests.
    Error { message: String },

    /// Diagnostic/progress info. Non-terminal, zero or more.
    Monitor { content: serde_json::Value },
}

impl StreamMessage {
    /// Whether this message terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error { .. })
    }

    /// The wire name of this message type.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Chunk { .. } => "CHUNK",
            Self::Context { .. } => "CONTEXT",
            Self::End => "END",
            Self::Error { .. } => "ERROR",
            Self::Monitor { .. } => "MONITOR",
        }
    }
}
