//! # Ragline Invoke
//!
//! The invocation abstraction: executes a named unit of logic either
//! in-process (via a typed local registry) or by dispatching to a remote
//! worker over HTTP, transparently to callers.
//!
//! Mode transparency is the central design decision of the system: the
//! agent loop, retrieval composer, and chain registry all invoke "units"
//! through the same `Invoker` trait without knowing where the unit runs.

pub mod dispatcher;
pub mod registry;
pub mod remote;

pub use dispatcher::Dispatcher;
pub use registry::{UnitError, UnitHandler, UnitRegistry};
pub use remote::RemoteDispatcher;
