//! Core types for the log engine.
//!
//! This module provides:
//! - [`LogId`] - Monotonic identifier assigned at ingestion
//! - [`LogEntry`] - An ingested JSON object and its id
//! - [`SearchQuery`] - Per-property filters plus a free-text term
//! - Type aliases for flat views and index counts

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::flatten::flatten;

/// A parsed JSON log object.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Dot-notation property name to canonical string value.
pub type FlatView = BTreeMap<String, String>;

/// Property name to property value to number of entries carrying it.
pub type IndexCounts = BTreeMap<String, BTreeMap<String, usize>>;

/// Property name to the set of values a query accepts for it.
pub type SearchFilters = BTreeMap<String, Vec<String>>;

/// Unique identifier for a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogId(pub u64);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ingested log record.
///
/// The raw object is reference counted so the store, the distribution buffer
/// and outbound messages share one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Identifier assigned by the store
    pub id: LogId,
    /// The parsed object as received, possibly nested
    pub raw: Arc<JsonObject>,
}

impl LogEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(id: LogId, raw: impl Into<Arc<JsonObject>>) -> Self {
        Self {
            id,
            raw: raw.into(),
        }
    }

    /// Computes the flat view of this entry.
    ///
    /// The view is not cached; callers that evaluate many queries against the
    /// same entry should compute it once.
    #[must_use]
    pub fn flat(&self) -> FlatView {
        flatten(&self.raw)
    }
}

/// A viewer's query: property filters and an optional free-text term.
///
/// Filters are OR within a property and AND across properties. The search
/// term is either tokenized literal text or a case-insensitive regular
/// expression, depending on `regexp`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Allowed values per property
    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: SearchFilters,
    /// Free-text term
    #[serde(default, deserialize_with = "null_as_default")]
    pub search_term: String,
    /// Treat `search_term` as a regular expression
    #[serde(default)]
    pub regexp: bool,
}

impl SearchQuery {
    /// Creates an empty query that matches every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property filter, appending to any values already allowed.
    #[must_use]
    pub fn with_filter<I, S>(mut self, property: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .entry(property.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Sets the free-text term.
    #[must_use]
    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    /// Enables or disables regular-expression mode.
    #[must_use]
    pub const fn with_regexp(mut self, regexp: bool) -> Self {
        self.regexp = regexp;
        self
    }

    /// Returns true if the query accepts every entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.search_term.is_empty()
    }

    /// Returns true if `value` is excluded for `property` by an active filter.
    #[must_use]
    pub fn excludes(&self, property: &str, value: &str) -> bool {
        self.filters
            .get(property)
            .is_some_and(|allowed| !allowed.iter().any(|v| v == value))
    }
}

/// Clients send `null` for empty filters and terms.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> JsonObject {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn log_id_ordering_and_display() {
        assert!(LogId(1) < LogId(2));
        assert_eq!(LogId(42).to_string(), "42");
    }

    #[test]
    fn log_entry_flat_is_recomputed() {
        let entry = LogEntry::new(LogId(1), object(json!({"a": {"b": 1}})));
        let flat = entry.flat();
        assert_eq!(flat.get("a.b").map(String::as_str), Some("1"));
        assert_eq!(entry.flat(), flat);
    }

    #[test]
    fn log_entry_clone_shares_raw() {
        let entry = LogEntry::new(LogId(7), object(json!({"level": "INFO"})));
        let copy = entry.clone();
        assert!(Arc::ptr_eq(&entry.raw, &copy.raw));
    }

    #[test]
    fn query_deserializes_full_payload() {
        let query: SearchQuery = serde_json::from_value(json!({
            "filters": {"level": ["INFO", "ERROR"]},
            "searchTerm": "timeout",
            "regexp": true
        }))
        .unwrap();

        assert_eq!(query.filters["level"], vec!["INFO", "ERROR"]);
        assert_eq!(query.search_term, "timeout");
        assert!(query.regexp);
    }

    #[test]
    fn query_deserializes_missing_and_null_fields() {
        let query: SearchQuery = serde_json::from_value(json!({"filters": null})).unwrap();
        assert!(query.is_empty());
        assert!(!query.regexp);

        let query: SearchQuery =
            serde_json::from_value(json!({"filters": {}, "searchTerm": null})).unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn query_builder() {
        let query = SearchQuery::new()
            .with_filter("level", ["INFO"])
            .with_filter("level", ["WARN"])
            .with_search_term("disk")
            .with_regexp(true);

        assert_eq!(query.filters["level"], vec!["INFO", "WARN"]);
        assert_eq!(query.search_term, "disk");
        assert!(query.regexp);
        assert!(!query.is_empty());
    }

    #[test]
    fn query_excludes_only_filtered_properties() {
        let query = SearchQuery::new().with_filter("level", ["INFO"]);

        assert!(!query.excludes("level", "INFO"));
        assert!(query.excludes("level", "ERROR"));
        assert!(!query.excludes("service", "api"));
    }

    #[test]
    fn query_serializes_camel_case() {
        let query = SearchQuery::new().with_search_term("x");
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["searchTerm"], "x");
        assert_eq!(json["regexp"], false);
    }
}
