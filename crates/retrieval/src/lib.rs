//! # Ragline Retrieval
//!
//! The retrieval composer: fans a query out to one or more retrievers
//! (each scoped to a workspace/index subset), merges candidate passages,
//! and optionally applies a reranking pass — all through the invocation
//! abstraction, so retrievers and rerankers may run in-process or as
//! remote workers.

pub mod composer;
pub mod units;

pub use composer::Composer;
pub use units::ComposerUnit;
