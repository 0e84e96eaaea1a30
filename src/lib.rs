//! plotbox - capability-sandboxed rendering of LLM-generated chart scripts
//!
//! Turns an untrusted, model-authored visualization script (Python with
//! matplotlib/pandas/numpy) into a PNG artifact, or a classified failure:
//! - static import allow-listing over the full syntax tree, before anything
//!   runs;
//! - a capability-limited namespace: bound library handles, a restricted
//!   builtin subset, a guarded import hook, and optionally a caller-supplied
//!   dataset bound as `df`;
//! - one dedicated interpreter process per invocation, in its own process
//!   group, under rlimit ceilings and a wall-clock timeout;
//! - artifact capture to base64-encoded PNG, with "nothing was drawn"
//!   reported as a distinct failure.
//!
//! The import allow-list does not vet attribute access or calls on
//! already-bound handles; the restricted namespace and the per-process
//! resource fences are the layers behind it.

mod artifact;
mod capability;
mod config;
mod dataset;
mod environment;
mod errors;
mod executor;
mod sandbox;
mod validator;
mod workspace;

pub use artifact::Artifact;
pub use capability::{Capability, CapabilityRegistry, RESTRICTED_BUILTINS};
pub use config::{RenderPolicy, ResourceBudget, SandboxConfig};
pub use dataset::Table;
pub use environment::{Environment, DATASET_BINDING};
pub use errors::{FailureKind, Result, SandboxError};
pub use sandbox::{Sandbox, SandboxBuilder};
pub use validator::validate;
