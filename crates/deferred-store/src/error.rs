//! # Error Types
//!
//! Two layers of errors:
//!
//! - [`StoreError`]: raised by the wrapped store. The adapter never translates
//!   or suppresses these; they reach the caller through
//!   [`DeferredError::Store`] unchanged.
//! - [`DeferredError`]: raised by the adapter itself (capability checks,
//!   queue limits, lifecycle misuse, failed opens with queued work).

use crate::domain::lifecycle::LifecycleState;
use thiserror::Error;

/// Errors produced by the wrapped key-value store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store has not been opened, or has been closed.
    #[error("Store is not open")]
    NotOpen,

    /// Key not found.
    #[error("Key not found in store")]
    NotFound,

    /// The store does not implement the requested method.
    #[error("Store does not support '{method}'")]
    NotSupported { method: String },

    /// I/O error during read/write.
    #[error("Store I/O error: {message}")]
    Io { message: String },

    /// Data corruption in the store.
    #[error("Store corruption: {message}")]
    Corruption { message: String },

    /// The iterator was ended and cannot be advanced.
    #[error("Iterator has already ended")]
    IteratorEnded,
}

/// Errors produced by the deferred adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeferredError {
    /// Optional method absent from the capability manifest.
    ///
    /// Raised synchronously and never queued, whatever the adapter state.
    #[error("'{method}' is not supported by the wrapped store")]
    NotSupported { method: &'static str },

    /// The open attempt failed while this operation was still queued.
    #[error("Store unavailable: queued '{operation}' dropped after open failed: {reason}")]
    ResourceUnavailable {
        operation: &'static str,
        reason: String,
    },

    /// Pending operation limit reached; the operation was not queued.
    #[error("Deferred queue full: {pending} operations pending (max {max})")]
    QueueFull { pending: usize, max: usize },

    /// Iterator advanced after `end()` or after the adapter left the ready state.
    #[error("Iterator is not open")]
    NotOpen,

    /// The store answered an optional method with the wrong kind of reply.
    #[error("Unexpected reply from wrapped store to '{method}'")]
    UnexpectedReply { method: &'static str },

    /// Lifecycle request not valid in the current state.
    #[error("Cannot {operation} while store is {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    /// The adapter was dropped before the queued operation could run.
    #[error("Deferred store dropped before queued '{operation}' could run")]
    Dropped { operation: &'static str },

    /// Failure reported by the wrapped store, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DeferredError {
    /// Whether this error came from the wrapped store rather than the adapter.
    pub fn is_store_error(&self) -> bool {
        matches!(self, DeferredError::Store(_))
    }
}

/// Result type for wrapped store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for adapter operations.
pub type DeferredResult<T> = Result<T, DeferredError>;
