//! Store Adapters
//!
//! Implementations of the [`KeyValueStore`](crate::ports::outbound::KeyValueStore) trait.

mod memory;

pub use memory::{InMemoryStore, MemoryIterator};
