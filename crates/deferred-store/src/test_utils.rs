//! Test utilities: a wrapped store that records every call made to it.
//!
//! Available to this crate's unit tests and, through the `test-utils`
//! feature, to the integration test crate.

use crate::adapters::MemoryIterator;
use crate::domain::manifest::{AdditionalMethod, Manifest};
use crate::domain::options::{
    BatchOperation, Entry, Key, OpenOptions, RangeOptions, ReadOptions, Value, WriteOptions,
};
use crate::error::{StoreError, StoreResult};
use crate::ports::outbound::{clear_by_iteration, KeyValueStore, StoreIterator};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Notify;

/// One call observed by [`RecordingStore`], with the arguments it received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Open { options: OpenOptions },
    Close,
    Get { key: Key, options: ReadOptions },
    GetMany { keys: Vec<Key>, options: ReadOptions },
    Put { key: Key, value: Value, options: WriteOptions },
    Delete { key: Key, options: WriteOptions },
    Batch { operations: Vec<BatchOperation>, options: WriteOptions },
    Clear { range: RangeOptions },
    /// A real iterator was created.
    Iterator { options: RangeOptions },
    /// Seek target as received, after key encoding.
    Seek { target: Key },
    Next,
    End,
    ApproximateSize { start: Key, end: Key },
    CompactRange { start: Key, end: Key },
}

impl StoreCall {
    /// Method name, as used by [`RecordingStore::with_failure`] and gates.
    pub fn method(&self) -> &'static str {
        match self {
            StoreCall::Open { .. } => "open",
            StoreCall::Close => "close",
            StoreCall::Get { .. } => "get",
            StoreCall::GetMany { .. } => "get_many",
            StoreCall::Put { .. } => "put",
            StoreCall::Delete { .. } => "delete",
            StoreCall::Batch { .. } => "batch",
            StoreCall::Clear { .. } => "clear",
            StoreCall::Iterator { .. } => "iterator",
            StoreCall::Seek { .. } => "seek",
            StoreCall::Next => "next",
            StoreCall::End => "end",
            StoreCall::ApproximateSize { .. } => "approximate_size",
            StoreCall::CompactRange { .. } => "compact_range",
        }
    }
}

type CallLog = Arc<Mutex<Vec<StoreCall>>>;

/// Mock wrapped store.
///
/// Backed by an ordered map and never enforces open/closed state itself, so
/// tests see exactly what the adapter forwards and when.
///
/// - `with_failure(method, error)` makes every call to `method` fail.
/// - `with_gate(method, notify)` parks every call to `method` (after
///   recording it) until the gate is notified once per call.
#[derive(Default)]
pub struct RecordingStore {
    data: RwLock<BTreeMap<Key, Value>>,
    calls: CallLog,
    manifest: Manifest,
    detected: BTreeSet<AdditionalMethod>,
    failures: BTreeMap<&'static str, StoreError>,
    gates: BTreeMap<&'static str, Arc<Notify>>,
    uppercase_keys: bool,
    iterating_clear: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared manifest returned by [`KeyValueStore::manifest`].
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Report `method` through the [`KeyValueStore::implements`] check only.
    pub fn with_detected_method(mut self, method: AdditionalMethod) -> Self {
        self.detected.insert(method);
        self
    }

    pub fn with_failure(mut self, method: &'static str, error: StoreError) -> Self {
        self.failures.insert(method, error);
        self
    }

    pub fn with_gate(mut self, method: &'static str, gate: Arc<Notify>) -> Self {
        self.gates.insert(method, gate);
        self
    }

    /// Encode keys to ASCII uppercase.
    pub fn with_uppercase_keys(mut self) -> Self {
        self.uppercase_keys = true;
        self
    }

    /// Implement `clear` by iterating and deleting through this store.
    pub fn with_iterating_clear(mut self) -> Self {
        self.iterating_clear = true;
        self
    }

    /// Seed stored data without recording calls.
    pub fn with_entries<I, K, V>(self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        {
            let mut data = self.data.write();
            for (key, value) in entries {
                data.insert(key.into(), value.into());
            }
        }
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Method names of every call received so far, in order.
    pub fn methods(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(StoreCall::method).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Current stored data, ascending.
    pub fn entries(&self) -> Vec<Entry> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    async fn record(&self, call: StoreCall) -> StoreResult<()> {
        let method = call.method();
        self.calls.lock().push(call);

        if let Some(gate) = self.gates.get(method) {
            gate.notified().await;
        }
        match self.failures.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    fn manifest(&self) -> Manifest {
        self.manifest.clone()
    }

    fn implements(&self, method: AdditionalMethod) -> bool {
        self.detected.contains(&method)
    }

    fn encode_key(&self, key: Key) -> Key {
        if self.uppercase_keys {
            key.to_ascii_uppercase()
        } else {
            key
        }
    }

    async fn open(&self, options: OpenOptions) -> StoreResult<()> {
        self.record(StoreCall::Open { options }).await
    }

    async fn close(&self) -> StoreResult<()> {
        self.record(StoreCall::Close).await
    }

    async fn get(&self, key: Key, options: ReadOptions) -> StoreResult<Option<Value>> {
        self.record(StoreCall::Get {
            key: key.clone(),
            options,
        })
        .await?;
        Ok(self.data.read().get(&key).cloned())
    }

    async fn get_many(
        &self,
        keys: Vec<Key>,
        options: ReadOptions,
    ) -> StoreResult<Vec<Option<Value>>> {
        self.record(StoreCall::GetMany {
            keys: keys.clone(),
            options,
        })
        .await?;
        let data = self.data.read();
        Ok(keys.iter().map(|key| data.get(key).cloned()).collect())
    }

    async fn put(&self, key: Key, value: Value, options: WriteOptions) -> StoreResult<()> {
        self.record(StoreCall::Put {
            key: key.clone(),
            value: value.clone(),
            options,
        })
        .await?;
        self.data.write().insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: Key, options: WriteOptions) -> StoreResult<()> {
        self.record(StoreCall::Delete {
            key: key.clone(),
            options,
        })
        .await?;
        self.data.write().remove(&key);
        Ok(())
    }

    async fn batch(
        &self,
        operations: Vec<BatchOperation>,
        options: WriteOptions,
    ) -> StoreResult<()> {
        self.record(StoreCall::Batch {
            operations: operations.clone(),
            options,
        })
        .await?;
        let mut data = self.data.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn clear(&self, range: RangeOptions) -> StoreResult<()> {
        self.record(StoreCall::Clear {
            range: range.clone(),
        })
        .await?;
        if self.iterating_clear {
            return clear_by_iteration(self, range).await;
        }
        self.data.write().retain(|key, _| !range.contains(key));
        Ok(())
    }

    fn iterator(&self, options: RangeOptions) -> Box<dyn StoreIterator> {
        self.calls.lock().push(StoreCall::Iterator {
            options: options.clone(),
        });
        Box::new(RecordingIterator {
            inner: MemoryIterator::new(self.entries(), options),
            calls: Arc::clone(&self.calls),
        })
    }

    async fn approximate_size(&self, start: Key, end: Key) -> StoreResult<u64> {
        self.record(StoreCall::ApproximateSize {
            start: start.clone(),
            end: end.clone(),
        })
        .await?;
        let count = self
            .data
            .read()
            .keys()
            .filter(|key| **key >= start && **key < end)
            .count();
        Ok(count as u64)
    }

    async fn compact_range(&self, start: Key, end: Key) -> StoreResult<()> {
        self.record(StoreCall::CompactRange { start, end }).await
    }
}

/// Iterator handed out by [`RecordingStore`]; logs into the store's call log.
struct RecordingIterator {
    inner: MemoryIterator,
    calls: CallLog,
}

#[async_trait]
impl StoreIterator for RecordingIterator {
    fn seek(&mut self, target: Key) {
        self.calls.lock().push(StoreCall::Seek {
            target: target.clone(),
        });
        self.inner.seek(target);
    }

    async fn next(&mut self) -> StoreResult<Option<Entry>> {
        self.calls.lock().push(StoreCall::Next);
        self.inner.next().await
    }

    async fn end(&mut self) -> StoreResult<()> {
        self.calls.lock().push(StoreCall::End);
        self.inner.end().await
    }
}
