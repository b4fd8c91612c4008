//! Adapter configuration from defaults or environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Default cap on the adapter's operation queue.
pub const DEFAULT_MAX_PENDING_OPERATIONS: usize = 10_000;

/// Default cap on each deferred iterator's sub-operation queue.
pub const DEFAULT_MAX_PENDING_ITERATOR_OPERATIONS: usize = 1_024;

/// Configuration for a [`DeferredStore`](crate::DeferredStore).
///
/// A limit of `0` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeferredConfig {
    /// Operations (and iterator requests) queued while not ready.
    pub max_pending_operations: usize,

    /// Sub-operations queued on a single unbound iterator.
    pub max_pending_iterator_operations: usize,
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            max_pending_operations: DEFAULT_MAX_PENDING_OPERATIONS,
            max_pending_iterator_operations: DEFAULT_MAX_PENDING_ITERATOR_OPERATIONS,
        }
    }
}

impl DeferredConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DEFERRED_MAX_PENDING_OPERATIONS`: queue cap (default: 10000)
    /// - `DEFERRED_MAX_PENDING_ITERATOR_OPERATIONS`: per-iterator cap (default: 1024)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self {
            max_pending_operations: env::var("DEFERRED_MAX_PENDING_OPERATIONS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_PENDING_OPERATIONS),

            max_pending_iterator_operations: env::var("DEFERRED_MAX_PENDING_ITERATOR_OPERATIONS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_MAX_PENDING_ITERATOR_OPERATIONS),
        }
    }

    /// Configuration with no queue limits.
    pub fn unbounded() -> Self {
        Self {
            max_pending_operations: 0,
            max_pending_iterator_operations: 0,
        }
    }
}
