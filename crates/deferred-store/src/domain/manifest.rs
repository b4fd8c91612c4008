//! # Capability Manifest
//!
//! Describes what a wrapped store can do. Most fields are informational and
//! passed through untouched; `additional_methods` decides which optional
//! operations the adapter will accept and defer.
//!
//! The manifest is merged once, when the adapter is constructed, and is
//! read-only afterwards. Calls are never re-checked against the store itself.

use crate::ports::outbound::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Optional engine-specific operations beyond the fixed core set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionalMethod {
    /// Approximate on-disk size of a key range.
    ApproximateSize,
    /// Manual compaction of a key range.
    CompactRange,
}

impl AdditionalMethod {
    /// Every optional method the adapter knows how to defer.
    pub const ALL: [AdditionalMethod; 2] =
        [AdditionalMethod::ApproximateSize, AdditionalMethod::CompactRange];

    /// Method name used in manifests, logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            AdditionalMethod::ApproximateSize => "approximate_size",
            AdditionalMethod::CompactRange => "compact_range",
        }
    }
}

/// Outcome of an optional method, shared by every [`AdditionalMethod`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionalReply {
    /// Byte count, from `approximate_size`.
    Size(u64),
    /// Completed with no value, from `compact_range`.
    Done,
}

impl AdditionalReply {
    pub fn into_size(self) -> Option<u64> {
        match self {
            AdditionalReply::Size(size) => Some(size),
            AdditionalReply::Done => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, AdditionalReply::Done)
    }
}

impl fmt::Display for AdditionalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Features declared by a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Snapshot-consistent iterators.
    pub snapshots: bool,
    /// Data survives a close/open cycle.
    pub permanence: bool,
    /// Iterators support `seek`.
    pub seek: bool,
    /// Native range-clear.
    pub clear: bool,
    /// Native multi-key read.
    pub get_many: bool,
    pub create_if_missing: bool,
    pub error_if_exists: bool,
    /// Optional methods and whether they are supported.
    #[serde(default)]
    pub additional_methods: BTreeMap<AdditionalMethod, bool>,
}

impl Manifest {
    /// Declare an optional method as supported.
    #[must_use]
    pub fn with_additional_method(mut self, method: AdditionalMethod) -> Self {
        self.additional_methods.insert(method, true);
        self
    }

    /// Whether an optional method is supported.
    pub fn supports(&self, method: AdditionalMethod) -> bool {
        self.additional_methods.get(&method).copied().unwrap_or(false)
    }

    /// Supported optional methods, in [`AdditionalMethod`] order.
    pub fn supported_methods(&self) -> impl Iterator<Item = AdditionalMethod> + '_ {
        self.additional_methods
            .iter()
            .filter(|(_, supported)| **supported)
            .map(|(method, _)| *method)
    }
}

/// Build the adapter's manifest from the wrapped store.
///
/// Starts from the store's declared manifest, then checks for optional
/// methods the store implements without declaring them.
pub fn merge_capabilities<S>(store: &S) -> Manifest
where
    S: KeyValueStore + ?Sized,
{
    let mut manifest = store.manifest();

    for method in AdditionalMethod::ALL {
        if !manifest.supports(method) && store.implements(method) {
            debug!(method = %method, "Optional method detected, not declared in manifest");
            manifest.additional_methods.insert(method, true);
        }
    }

    manifest
}
