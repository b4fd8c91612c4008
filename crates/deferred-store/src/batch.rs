//! Chained batch: stage puts and deletes, then submit them as one `batch` call.

use crate::domain::call::Pending;
use crate::domain::options::{BatchOperation, Key, Value, WriteOptions};
use crate::ports::outbound::KeyValueStore;
use crate::service::DeferredStore;

/// Batch under construction, created by [`DeferredStore::chained_batch`].
///
/// Nothing reaches the adapter until [`write`](Self::write); the staged
/// operations then go through the same queue-or-forward path as
/// [`DeferredStore::batch`].
#[must_use = "a chained batch does nothing until written"]
pub struct ChainedBatch<'a, S: KeyValueStore> {
    store: &'a DeferredStore<S>,
    operations: Vec<BatchOperation>,
}

impl<'a, S: KeyValueStore> ChainedBatch<'a, S> {
    pub(crate) fn new(store: &'a DeferredStore<S>) -> Self {
        Self {
            store,
            operations: Vec::new(),
        }
    }

    pub fn put(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.operations.push(BatchOperation::put(key, value));
        self
    }

    pub fn delete(mut self, key: impl Into<Key>) -> Self {
        self.operations.push(BatchOperation::delete(key));
        self
    }

    /// Discard every staged operation.
    pub fn clear(mut self) -> Self {
        self.operations.clear();
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[BatchOperation] {
        &self.operations
    }

    /// Submit the staged operations.
    pub fn write(self, options: WriteOptions) -> Pending<()> {
        self.store.batch(self.operations, options)
    }
}
