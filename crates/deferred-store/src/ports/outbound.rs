//! # Outbound Ports (Driven Ports)
//!
//! The wrapped store the adapter forwards to.
//!
//! Production: any engine implementing [`KeyValueStore`].
//! Testing: [`InMemoryStore`](crate::adapters::InMemoryStore) and the
//! recording mock in `test_utils`.

use crate::domain::manifest::{AdditionalMethod, AdditionalReply, Manifest};
use crate::domain::options::{
    BatchOperation, Entry, Key, OpenOptions, RangeOptions, ReadOptions, Value, WriteOptions,
};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;

/// Abstract interface for the wrapped key-value store.
///
/// The store owns its own open/closed policy: calls made while it is not open
/// should fail with [`StoreError::NotOpen`]. The adapter routes such errors to
/// the caller unchanged.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Declared capabilities.
    fn manifest(&self) -> Manifest {
        Manifest::default()
    }

    /// Check for an optional method the store implements without declaring it.
    fn implements(&self, _method: AdditionalMethod) -> bool {
        false
    }

    /// Encode a key into the store's internal representation.
    ///
    /// Applied to iterator seek targets before they reach [`StoreIterator::seek`].
    fn encode_key(&self, key: Key) -> Key {
        key
    }

    /// Open the store.
    async fn open(&self, options: OpenOptions) -> StoreResult<()>;

    /// Close the store.
    async fn close(&self) -> StoreResult<()>;

    /// Get a value by key.
    async fn get(&self, key: Key, options: ReadOptions) -> StoreResult<Option<Value>>;

    /// Get several values; one slot per key, in key order given.
    async fn get_many(
        &self,
        keys: Vec<Key>,
        options: ReadOptions,
    ) -> StoreResult<Vec<Option<Value>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key, options.clone()).await?);
        }
        Ok(values)
    }

    /// Put a single key-value pair.
    async fn put(&self, key: Key, value: Value, options: WriteOptions) -> StoreResult<()>;

    /// Delete a key.
    async fn delete(&self, key: Key, options: WriteOptions) -> StoreResult<()>;

    /// Execute an atomic batch write.
    async fn batch(&self, operations: Vec<BatchOperation>, options: WriteOptions)
        -> StoreResult<()>;

    /// Delete every key in `range`.
    ///
    /// The default is [`clear_by_iteration`].
    async fn clear(&self, range: RangeOptions) -> StoreResult<()> {
        clear_by_iteration(self, range).await
    }

    /// Create an iterator over `options`.
    fn iterator(&self, options: RangeOptions) -> Box<dyn StoreIterator>;

    /// Approximate size in bytes of the range `start..end`.
    async fn approximate_size(&self, _start: Key, _end: Key) -> StoreResult<u64> {
        Err(StoreError::NotSupported {
            method: AdditionalMethod::ApproximateSize.name().to_string(),
        })
    }

    /// Compact the range `start..end`.
    async fn compact_range(&self, _start: Key, _end: Key) -> StoreResult<()> {
        Err(StoreError::NotSupported {
            method: AdditionalMethod::CompactRange.name().to_string(),
        })
    }

    /// Route an optional method to its implementation.
    ///
    /// The adapter defers every [`AdditionalMethod`] through this one entry
    /// point; a new method only needs a variant and an arm here.
    async fn call_additional(
        &self,
        method: AdditionalMethod,
        start: Key,
        end: Key,
    ) -> StoreResult<AdditionalReply> {
        match method {
            AdditionalMethod::ApproximateSize => self
                .approximate_size(start, end)
                .await
                .map(AdditionalReply::Size),
            AdditionalMethod::CompactRange => self
                .compact_range(start, end)
                .await
                .map(|()| AdditionalReply::Done),
        }
    }
}

/// Range clear for stores without a native one.
///
/// Walks `range` with [`KeyValueStore::iterator`] and deletes each key through
/// [`KeyValueStore::delete`] on the same store. The iterator is always ended,
/// and the first error aborts the walk.
pub async fn clear_by_iteration<S>(store: &S, range: RangeOptions) -> StoreResult<()>
where
    S: KeyValueStore + ?Sized,
{
    let mut range = range;
    range.keys = true;
    range.values = false;

    let mut iterator = store.iterator(range);
    loop {
        match iterator.next().await {
            Ok(Some((key, _))) => {
                if let Err(err) = store.delete(key, WriteOptions::default()).await {
                    let _ = iterator.end().await;
                    return Err(err);
                }
            }
            Ok(None) => break,
            Err(err) => {
                let _ = iterator.end().await;
                return Err(err);
            }
        }
    }
    iterator.end().await
}

/// Iterator produced by [`KeyValueStore::iterator`].
///
/// Finite and not restartable: once `end` has been called, `next` fails.
#[async_trait]
pub trait StoreIterator: Send {
    /// Reposition at `target`, already encoded by [`KeyValueStore::encode_key`].
    fn seek(&mut self, target: Key);

    /// Next entry, or `None` when the range is exhausted.
    async fn next(&mut self) -> StoreResult<Option<Entry>>;

    /// Release the iterator.
    async fn end(&mut self) -> StoreResult<()>;
}
