//! # Domain Layer
//!
//! Pure data and state for the deferred adapter.
//!
//! - `options` - Keys, values and per-call option structs
//! - `manifest` - Capability manifest and its one-time merger
//! - `lifecycle` - Adapter state machine
//! - `call` - Captured store calls and their completions
//! - `queue` - Ordered queue of deferred work

pub mod call;
pub mod lifecycle;
pub mod manifest;
pub mod options;
pub mod queue;

pub use call::{DeferredCall, Pending};
pub use lifecycle::{LifecycleEvent, LifecycleState, Readiness};
pub use manifest::{merge_capabilities, AdditionalMethod, AdditionalReply, Manifest};
pub use options::{
    BatchOperation, Entry, Key, OpenOptions, RangeOptions, ReadOptions, Value, WriteOptions,
};
pub use queue::{OperationQueue, QueuedOperation};
