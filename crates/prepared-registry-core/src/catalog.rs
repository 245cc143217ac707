// crates/prepared-registry-core/src/catalog.rs
// ============================================================================
// Module: Query Catalog
// Description: Named SQL text registered during application initialization.
// Purpose: Map logical query names to the SQL text that registries prepare.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The query catalog maps a [`QueryName`] to the [`QueryText`] registered for
//! it. Modules that own queries call [`QueryCatalog::add`] while the
//! application initializes; statement registries read the catalog afterwards.
//! The catalog is an explicit value shared as `Arc<QueryCatalog>` instead of
//! hidden process-wide state.
//!
//! Registration never fails. Re-registering a name replaces its text (last
//! write wins) and reports a `query_overwritten` event to the audit sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;

use crate::audit::NoopAuditSink;
use crate::audit::RegistryAuditEvent;
use crate::audit::RegistryAuditKind;
use crate::audit::RegistryAuditSink;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Logical name of a registered query.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryName(String);

impl QueryName {
    /// Creates a new query name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for QueryName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for QueryName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for QueryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for QueryName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Raw SQL text registered for a query.
///
/// # Invariants
/// - Immutable once constructed; clones share the same allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryText(Arc<str>);

impl QueryText {
    /// Creates query text from any string-like value.
    #[must_use]
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Returns the SQL text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for QueryText {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for QueryText {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Catalog of named SQL queries.
///
/// # Invariants
/// - Each name maps to exactly one text; later registrations replace earlier ones.
/// - Entries are never removed.
pub struct QueryCatalog {
    /// Registered entries keyed by query name.
    entries: RwLock<BTreeMap<QueryName, QueryText>>,
    /// Sink receiving duplicate registration diagnostics.
    audit: Arc<dyn RegistryAuditSink>,
}

impl QueryCatalog {
    /// Creates an empty catalog that discards diagnostics.
    #[must_use]
    pub fn new() -> Self {
        Self::with_audit(Arc::new(NoopAuditSink))
    }

    /// Creates an empty catalog reporting duplicate registrations to `audit`.
    #[must_use]
    pub fn with_audit(audit: Arc<dyn RegistryAuditSink>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            audit,
        }
    }

    /// Registers `text` under `name`, replacing any previous text.
    ///
    /// Returns the text that was replaced, if the name was already registered.
    pub fn add(&self, name: impl Into<QueryName>, text: impl Into<QueryText>) -> Option<QueryText> {
        let name = name.into();
        let text = text.into();
        let previous = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries.insert(name.clone(), text.clone())
        };
        if let Some(previous) = &previous {
            let detail = if previous == &text { "text unchanged" } else { "text replaced" };
            self.audit.record(&RegistryAuditEvent::new(
                RegistryAuditKind::QueryOverwritten,
                Some(&name),
                Some(detail.to_string()),
            ));
        }
        previous
    }

    /// Registers every `(name, text)` pair in iteration order.
    pub fn extend<I, N, T>(&self, entries: I)
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<QueryName>,
        T: Into<QueryText>,
    {
        for (name, text) in entries {
            self.add(name, text);
        }
    }

    /// Returns the text registered for `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<QueryText> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    /// Returns true when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    /// Returns the number of registered queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no queries are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<QueryName> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    /// Returns a sorted snapshot of every registered entry.
    #[must_use]
    pub fn entries(&self) -> Vec<(QueryName, QueryText)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, text)| (name.clone(), text.clone()))
            .collect()
    }
}

impl Default for QueryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCatalog").field("len", &self.len()).finish_non_exhaustive()
    }
}
