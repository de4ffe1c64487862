//! # Ragline Chains
//!
//! The prompt/chain registry: maps a (model, task type) pair to a prompt
//! template and a postprocessing routine, and exposes a uniform
//! "build request → invoke model → parse response" chain abstraction.
//! Model backends are invoked as units named by `model_id`, so a chain
//! neither knows nor cares whether the model runs behind a local stub or
//! a remote inference worker.

pub mod postprocess;
pub mod registry;
pub mod template;

pub use postprocess::Postprocessor;
pub use registry::{Chain, ChainInput, ChainOutput, ChainRegistry, ChainSpec, register_defaults};
pub use template::PromptTemplate;
