//! Inverted index over flattened log properties.
//!
//! This module provides:
//! - [`InvertedIndex`] - property → value → entry ids, with a per-property
//!   cardinality cap and a permanent blacklist for properties that exceed it
//! - [`IndexLimits`] - the cap and the maximum indexed value length
//!
//! The index has no lock of its own. It lives inside the log store's critical
//! section so that store and index never diverge.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::types::{FlatView, IndexCounts, LogId};

/// Limits applied when indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexLimits {
    /// Maximum distinct values a property may have before it is blacklisted.
    pub max_values: usize,
    /// Values longer than this many characters are not indexed.
    pub max_value_length: usize,
}

impl Default for IndexLimits {
    fn default() -> Self {
        Self {
            max_values: 10,
            max_value_length: 50,
        }
    }
}

/// Cardinality-limited inverted index.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    limits: IndexLimits,
    /// property → value → ids
    buckets: HashMap<String, HashMap<String, HashSet<LogId>>>,
    /// Properties permanently excluded from indexing
    blacklist: HashSet<String>,
}

impl InvertedIndex {
    /// Creates an empty index with the given limits.
    #[must_use]
    pub fn new(limits: IndexLimits) -> Self {
        Self {
            limits,
            buckets: HashMap::new(),
            blacklist: HashSet::new(),
        }
    }

    /// Returns the limits this index was created with.
    #[must_use]
    pub const fn limits(&self) -> IndexLimits {
        self.limits
    }

    /// Indexes an entry's flat view.
    ///
    /// Empty values, over-length values and blacklisted properties are
    /// skipped. A property whose distinct value count goes above
    /// `max_values` loses its whole bucket and is blacklisted for the lifetime
    /// of the index. Returns the properties blacklisted by this call.
    pub fn index(&mut self, id: LogId, flat: &FlatView) -> Vec<String> {
        let mut dropped = Vec::new();

        for (property, value) in flat {
            if value.is_empty() || value.chars().count() > self.limits.max_value_length {
                continue;
            }
            if self.blacklist.contains(property) {
                continue;
            }

            let bucket = self.buckets.entry(property.clone()).or_default();
            bucket.entry(value.clone()).or_default().insert(id);

            if bucket.len() > self.limits.max_values {
                self.buckets.remove(property);
                self.blacklist.insert(property.clone());
                warn!(
                    property = %property,
                    max_values = self.limits.max_values,
                    "Property exceeded unique value limit, dropped from index"
                );
                dropped.push(property.clone());
            }
        }

        dropped
    }

    /// Removes an entry from the index.
    ///
    /// Every (property, value) pair is looked up regardless of the length
    /// limit. Empty value sets and empty property buckets are removed.
    pub fn unindex(&mut self, id: LogId, flat: &FlatView) {
        for (property, value) in flat {
            let Some(bucket) = self.buckets.get_mut(property) else {
                continue;
            };
            if let Some(ids) = bucket.get_mut(value) {
                ids.remove(&id);
                if ids.is_empty() {
                    bucket.remove(value);
                }
            }
            if bucket.is_empty() {
                self.buckets.remove(property);
            }
        }
    }

    /// Returns the number of entries per property value.
    #[must_use]
    pub fn counts(&self) -> IndexCounts {
        self.buckets
            .iter()
            .map(|(property, values)| {
                let counts = values
                    .iter()
                    .map(|(value, ids)| (value.clone(), ids.len()))
                    .collect();
                (property.clone(), counts)
            })
            .collect()
    }

    /// Returns the number of entries carrying `value` for `property`.
    #[must_use]
    pub fn count(&self, property: &str, value: &str) -> usize {
        self.buckets
            .get(property)
            .and_then(|values| values.get(value))
            .map_or(0, HashSet::len)
    }

    /// Returns true if the property has been dropped from the index.
    #[must_use]
    pub fn is_blacklisted(&self, property: &str) -> bool {
        self.blacklist.contains(property)
    }

    /// Returns the blacklisted properties, sorted.
    #[must_use]
    pub fn blacklist(&self) -> Vec<String> {
        let mut properties: Vec<String> = self.blacklist.iter().cloned().collect();
        properties.sort_unstable();
        properties
    }

    /// Returns the number of indexed properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
