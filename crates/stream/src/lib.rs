//! # Ragline Stream
//!
//! The streaming/cancellation channel: typed message emission with
//! protocol ordering enforced, token-to-sentence buffering, and the
//! in-memory stop-signal store used for out-of-band cancellation.

pub mod emitter;
pub mod sentence;
pub mod stop;

pub use emitter::Emitter;
pub use sentence::SentenceBuffer;
pub use stop::InMemoryStopStore;
