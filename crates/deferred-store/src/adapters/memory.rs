//! # In-Memory Store
//!
//! Reference [`KeyValueStore`] for tests and examples.
//!
//! - Ordered map behind a `parking_lot::RwLock`; data survives close/re-open
//! - Enforces its own open flag, so calls while closed fail with `NotOpen`
//! - Native range clear, `approximate_size` and `compact_range`
//! - [`MemoryIterator`] walks a snapshot taken at creation

use crate::domain::manifest::{AdditionalMethod, Manifest};
use crate::domain::options::{
    BatchOperation, Entry, Key, OpenOptions, RangeOptions, ReadOptions, Value, WriteOptions,
};
use crate::error::{StoreError, StoreResult};
use crate::ports::outbound::{KeyValueStore, StoreIterator};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory key-value store.
///
/// Every call made while closed fails with [`StoreError::NotOpen`].
#[derive(Default)]
pub struct InMemoryStore {
    data: RwLock<BTreeMap<Key, Value>>,
    open: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, readable whether or not the store is open.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::NotOpen)
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    fn manifest(&self) -> Manifest {
        Manifest {
            snapshots: true,
            permanence: false,
            seek: true,
            clear: true,
            get_many: true,
            create_if_missing: true,
            error_if_exists: true,
            additional_methods: BTreeMap::new(),
        }
        .with_additional_method(AdditionalMethod::ApproximateSize)
        .with_additional_method(AdditionalMethod::CompactRange)
    }

    async fn open(&self, options: OpenOptions) -> StoreResult<()> {
        let exists = !self.data.read().is_empty();
        if options.error_if_exists && exists {
            return Err(StoreError::Io {
                message: "store already exists".to_string(),
            });
        }
        if !options.create_if_missing && !exists {
            return Err(StoreError::Io {
                message: "store does not exist".to_string(),
            });
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: Key, _options: ReadOptions) -> StoreResult<Option<Value>> {
        self.ensure_open()?;
        Ok(self.data.read().get(&key).cloned())
    }

    async fn put(&self, key: Key, value: Value, _options: WriteOptions) -> StoreResult<()> {
        self.ensure_open()?;
        self.data.write().insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: Key, _options: WriteOptions) -> StoreResult<()> {
        self.ensure_open()?;
        self.data.write().remove(&key);
        Ok(())
    }

    async fn batch(
        &self,
        operations: Vec<BatchOperation>,
        _options: WriteOptions,
    ) -> StoreResult<()> {
        self.ensure_open()?;
        // Single write guard: the batch is applied atomically.
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

    /// Native range clear honouring `reverse` and `limit`, under one write guard.
    async fn clear(&self, range: RangeOptions) -> StoreResult<()> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let mut doomed: Vec<Key> = data
            .keys()
            .filter(|key| range.contains(key))
            .cloned()
            .collect();
        if range.reverse {
            doomed.reverse();
        }
        if let Some(limit) = range.limit {
            doomed.truncate(limit);
        }
        for key in doomed {
            data.remove(&key);
        }
        Ok(())
    }

    fn iterator(&self, options: RangeOptions) -> Box<dyn StoreIterator> {
        let entries = self
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(MemoryIterator::new(entries, options).with_open_flag(Arc::clone(&self.open)))
    }

    async fn approximate_size(&self, start: Key, end: Key) -> StoreResult<u64> {
        self.ensure_open()?;
        if start >= end {
            return Ok(0);
        }
        let size = self
            .data
            .read()
            .range(start..end)
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        Ok(size)
    }

    async fn compact_range(&self, _start: Key, _end: Key) -> StoreResult<()> {
        self.ensure_open()
    }
}

/// Iterator over a snapshot of sorted entries.
///
/// Honours every [`RangeOptions`] field. `seek` moves to the first entry at or
/// after the target in iteration order (at or before it when reversed); the
/// limit counts entries yielded across seeks.
pub struct MemoryIterator {
    entries: Vec<Entry>,
    position: usize,
    yielded: usize,
    options: RangeOptions,
    ended: bool,
    open: Option<Arc<AtomicBool>>,
}

impl MemoryIterator {
    /// Build from ascending `entries`; entries outside the range are dropped.
    pub fn new(entries: Vec<Entry>, options: RangeOptions) -> Self {
        let mut entries: Vec<Entry> = entries
            .into_iter()
            .filter(|(key, _)| options.contains(key))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        if options.reverse {
            entries.reverse();
        }

        Self {
            entries,
            position: 0,
            yielded: 0,
            options,
            ended: false,
            open: None,
        }
    }

    /// Fail `next` with `NotOpen` whenever `flag` is false.
    pub fn with_open_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.open = Some(flag);
        self
    }

    fn limit_reached(&self) -> bool {
        self.options
            .limit
            .map_or(false, |limit| self.yielded >= limit)
    }
}

#[async_trait]
impl StoreIterator for MemoryIterator {
    fn seek(&mut self, target: Key) {
        let reverse = self.options.reverse;
        self.position = self.entries.partition_point(|(key, _)| {
            if reverse {
                *key > target
            } else {
                *key < target
            }
        });
    }

    async fn next(&mut self) -> StoreResult<Option<Entry>> {
        if self.ended {
            return Err(StoreError::IteratorEnded);
        }
        if let Some(open) = &self.open {
            if !open.load(Ordering::SeqCst) {
                return Err(StoreError::NotOpen);
            }
        }
        if self.limit_reached() || self.position >= self.entries.len() {
            return Ok(None);
        }

        let (key, value) = self.entries[self.position].clone();
        self.position += 1;
        self.yielded += 1;

        let key = if self.options.keys { key } else { Vec::new() };
        let value = if self.options.values { value } else { Vec::new() };
        Ok(Some((key, value)))
    }

    async fn end(&mut self) -> StoreResult<()> {
        if self.ended {
            return Err(StoreError::IteratorEnded);
        }
        self.ended = true;
        self.entries.clear();
        Ok(())
    }
}
