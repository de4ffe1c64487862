//! # Ragline Agent
//!
//! The tool-calling agent loop and the turn pipeline that wraps it.
//! The loop decides each iteration between calling a tool and answering
//! directly; the pipeline adds preprocessing (query rewrite), the
//! retrieve-then-generate path for turns without tools, streamed output,
//! cancellation, and session persistence.

pub mod decision;
pub mod loop_runner;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use decision::AgentDecision;
pub use loop_runner::{AgentLoop, LoopEnd, LoopOutcome, DEFAULT_MAX_ITERATIONS};
pub use pipeline::{PipelineOptions, TurnPipeline, TurnRequest};
