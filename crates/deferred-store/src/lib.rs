//! # deferred-store
//!
//! Key-value store adapter that accepts operations before the wrapped store
//! has finished opening.
//!
//! ## Overview
//!
//! This crate provides:
//! - **Operation queue**: reads, writes, batches, range clears and optional
//!   engine methods issued before the store is ready are queued and replayed
//!   in issuance order once it opens
//! - **Deferred iterators**: iteration handles usable immediately; seek, next
//!   and end are recorded until a real iterator exists
//! - **Capability manifest**: optional methods are accepted only when the
//!   wrapped store declares (or is detected to implement) them
//! - **Lifecycle dispatcher**: open/close state machine deciding per call
//!   whether to forward or to queue
//!
//! ## Architecture
//!
//! ```text
//! caller ──put/get/iterator──→ DeferredStore ──ready──→ dispatch worker ──→ KeyValueStore
//!                                   │                        ↑
//!                                   └──not ready──→ queue ───┘ (backlog on open)
//! ```
//!
//! The dispatch worker runs one operation at a time, in issuance order: the
//! queued backlog first, then everything issued while ready.
//!
//! ## Lifecycle
//!
//! ```text
//! [NOT_READY] ──open──→ [READYING] ──ok──→ [READY] ──close──→ [CLOSING] ──ok──→ [NOT_READY]
//!      ↑                     │                ↑                    │
//!      └─────── failed ──────┘                └────── failed ──────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use deferred_store::{DeferredStore, InMemoryStore, OpenOptions, ReadOptions, WriteOptions};
//!
//! let db = DeferredStore::new(InMemoryStore::new());
//!
//! // Queued: the store is not open yet
//! let write = db.put(b"key".to_vec(), b"value".to_vec(), WriteOptions::default());
//! let read = db.get(b"key".to_vec(), ReadOptions::default());
//!
//! // Opens the store and replays the queue in order
//! db.open(OpenOptions::default()).await?;
//!
//! write.await?;
//! assert_eq!(read.await?, Some(b"value".to_vec()));
//! ```

pub mod adapters;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod iterator;
pub mod metrics;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::{InMemoryStore, MemoryIterator};
pub use batch::ChainedBatch;
pub use config::DeferredConfig;
pub use domain::{
    AdditionalMethod, AdditionalReply, BatchOperation, Entry, Key, LifecycleState, Manifest,
    OpenOptions, Pending, RangeOptions, ReadOptions, Readiness, Value, WriteOptions,
};
pub use error::{DeferredError, DeferredResult, StoreError, StoreResult};
pub use iterator::DeferredIterator;
pub use metrics::StatsSnapshot;
pub use ports::outbound::{clear_by_iteration, KeyValueStore, StoreIterator};
pub use service::DeferredStore;
