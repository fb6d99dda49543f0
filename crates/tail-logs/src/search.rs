//! Filter and free-text matching of log entries.
//!
//! A [`SearchQuery`] is compiled once into a [`Matcher`], which is then
//! evaluated against flat views. Filters are OR within a property and AND
//! across properties. The free-text term is either split on whitespace into
//! tokens that must each appear in some value, or compiled as a
//! case-insensitive regular expression. A pattern that fails to compile falls
//! back to a literal search for the whole term.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::{LogError, Result};
use crate::types::{FlatView, LogEntry, SearchFilters, SearchQuery};

/// Compiled free-text part of a query.
#[derive(Debug, Clone)]
enum TextSearch {
    /// Accept everything.
    Any,
    /// Lowercase tokens; each must be a substring of at least one value.
    Tokens(Vec<String>),
    /// Case-insensitive pattern; must match at least one value.
    Pattern(Regex),
}

/// A query compiled for repeated evaluation.
#[derive(Debug, Clone)]
pub struct Matcher {
    filters: SearchFilters,
    text: TextSearch,
}

impl Matcher {
    /// Compiles a query.
    #[must_use]
    pub fn new(query: &SearchQuery) -> Self {
        let term = query.search_term.as_str();
        let text = if term.is_empty() {
            TextSearch::Any
        } else if query.regexp {
            match compile_pattern(term) {
                Ok(re) => TextSearch::Pattern(re),
                Err(e) => {
                    debug!(error = %e, "Falling back to literal search");
                    TextSearch::Tokens(vec![term.to_lowercase()])
                }
            }
        } else {
            let tokens = tokenize(term);
            if tokens.is_empty() {
                TextSearch::Any
            } else {
                TextSearch::Tokens(tokens)
            }
        };

        Self {
            filters: query.filters.clone(),
            text,
        }
    }

    /// Returns true if the entry satisfies both the filters and the term.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.matches_flat(&entry.flat())
    }

    /// Same as [`Matcher::matches`] for an already flattened entry.
    #[must_use]
    pub fn matches_flat(&self, flat: &FlatView) -> bool {
        matches_filters(flat, &self.filters) && self.matches_text(flat)
    }

    /// Returns true if the query has no filters and no term.
    #[must_use]
    pub fn accepts_all(&self) -> bool {
        self.filters.is_empty() && matches!(self.text, TextSearch::Any)
    }

    fn matches_text(&self, flat: &FlatView) -> bool {
        match &self.text {
            TextSearch::Any => true,
            TextSearch::Pattern(re) => flat.values().any(|value| re.is_match(value)),
            TextSearch::Tokens(tokens) => {
                let values: Vec<String> = flat.values().map(|v| v.to_lowercase()).collect();
                tokens
                    .iter()
                    .all(|token| values.iter().any(|value| value.contains(token.as_str())))
            }
        }
    }
}

/// Returns true if the entry satisfies the query.
#[must_use]
pub fn matches(entry: &LogEntry, query: &SearchQuery) -> bool {
    Matcher::new(query).matches(entry)
}

/// Returns true if every filtered property of `flat` holds an allowed value.
///
/// A property missing from the entry is compared as the empty string. An
/// empty list of allowed values never matches.
#[must_use]
pub fn matches_filters(flat: &FlatView, filters: &SearchFilters) -> bool {
    filters.iter().all(|(property, allowed)| {
        let value = flat.get(property).map_or("", String::as_str);
        allowed.iter().any(|candidate| candidate == value)
    })
}

/// Returns true if the free-text term matches the flat view.
#[must_use]
pub fn matches_search(flat: &FlatView, term: &str, regexp: bool) -> bool {
    let query = SearchQuery::new().with_search_term(term).with_regexp(regexp);
    Matcher::new(&query).matches_text(flat)
}

/// Returns the entries that satisfy the query, preserving order.
#[must_use]
pub fn filter_batch(entries: &[LogEntry], query: &SearchQuery) -> Vec<LogEntry> {
    let matcher = Matcher::new(query);
    if matcher.accepts_all() {
        return entries.to_vec();
    }
    entries
        .iter()
        .filter(|entry| matcher.matches(entry))
        .cloned()
        .collect()
}

/// Compiles a case-insensitive search pattern.
///
/// # Errors
///
/// Returns [`LogError::InvalidPattern`] if the pattern does not compile.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| LogError::InvalidPattern(e.to_string()))
}

/// Splits a term on Unicode whitespace into lowercase tokens.
fn tokenize(term: &str) -> Vec<String> {
    term.split_whitespace().map(str::to_lowercase).collect()
}
