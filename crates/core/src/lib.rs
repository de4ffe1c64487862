//! # Ragline Core
//!
//! Domain types, traits, and error definitions for the Ragline
//! retrieval-augmented conversational backend. This crate has **zero
//! framework dependencies** — it defines the domain model that all other
//! crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod chat_config;
pub mod envelope;
pub mod error;
pub mod invocation;
pub mod retrieval;
pub mod session;
pub mod signal;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use chat_config::{ChatbotConfig, SamplingParams, TaskType};
pub use envelope::StreamMessage;
pub use error::{Error, Result};
pub use invocation::{
    FailureKind, InvocationMode, InvocationRequest, InvocationResult, InvocationStatus, Invoker,
};
pub use retrieval::{RerankerConfig, RetrievalCandidate, RetrievalOptions, RetrieverConfig};
pub use session::{SessionStore, SessionTurn};
pub use signal::{StopSignal, StopSignalStore};
pub use tool::{ToolDescriptor, ToolSet};
pub use turn::{ChatTurn, ToolTrace, TurnRole, TurnState};
