//! # Operation Arguments
//!
//! Keys, values and the option structs that travel with every call. The
//! adapter never inspects or encodes these; they are handed to the wrapped
//! store exactly as the caller supplied them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw key bytes.
pub type Key = Vec<u8>;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// A key/value pair yielded by an iterator.
pub type Entry = (Key, Value);

/// Configuration passed to the wrapped store's `open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOptions {
    /// Create the store if it does not exist.
    pub create_if_missing: bool,
    /// Fail if the store already exists.
    pub error_if_exists: bool,
    /// Engine-specific settings, forwarded verbatim.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            properties: BTreeMap::new(),
        }
    }
}

impl OpenOptions {
    /// Add an engine-specific property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// Options for point reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Populate the engine's block cache with the read.
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { fill_cache: true }
    }
}

/// Options for writes (`put`, `delete`, `batch`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// fsync before acknowledging the write.
    pub sync: bool,
}

/// Range selection for iteration and range-clear.
///
/// The default selects every key in ascending order with no limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeOptions {
    pub gt: Option<Key>,
    pub gte: Option<Key>,
    pub lt: Option<Key>,
    pub lte: Option<Key>,
    /// Iterate in descending key order.
    pub reverse: bool,
    /// Maximum number of entries; `None` is unbounded.
    pub limit: Option<usize>,
    /// Yield keys (empty key bytes when false).
    pub keys: bool,
    /// Yield values (empty value bytes when false).
    pub values: bool,
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self {
            gt: None,
            gte: None,
            lt: None,
            lte: None,
            reverse: false,
            limit: None,
            keys: true,
            values: true,
        }
    }
}

impl RangeOptions {
    /// Unbounded forward range.
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn gt(mut self, key: impl Into<Key>) -> Self {
        self.gt = Some(key.into());
        self
    }

    #[must_use]
    pub fn gte(mut self, key: impl Into<Key>) -> Self {
        self.gte = Some(key.into());
        self
    }

    #[must_use]
    pub fn lt(mut self, key: impl Into<Key>) -> Self {
        self.lt = Some(key.into());
        self
    }

    #[must_use]
    pub fn lte(mut self, key: impl Into<Key>) -> Self {
        self.lte = Some(key.into());
        self
    }

    #[must_use]
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether `key` falls inside the lower and upper bounds.
    pub fn contains(&self, key: &[u8]) -> bool {
        if let Some(gt) = &self.gt {
            if key <= gt.as_slice() {
                return false;
            }
        }
        if let Some(gte) = &self.gte {
            if key < gte.as_slice() {
                return false;
            }
        }
        if let Some(lt) = &self.lt {
            if key >= lt.as_slice() {
                return false;
            }
        }
        if let Some(lte) = &self.lte {
            if key > lte.as_slice() {
                return false;
            }
        }
        true
    }

    /// True when no bound and no limit is set.
    pub fn is_unbounded(&self) -> bool {
        self.gt.is_none()
            && self.gte.is_none()
            && self.lt.is_none()
            && self.lte.is_none()
            && self.limit.is_none()
    }
}

/// Single operation inside an atomic batch write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Key, value: Value },
    /// Delete a key.
    Delete { key: Key },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Key>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }

    /// Key targeted by this operation.
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOperation::Put { key, .. } | BatchOperation::Delete { key } => key,
        }
    }
}
