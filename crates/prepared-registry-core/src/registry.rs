// crates/prepared-registry-core/src/registry.rs
// ============================================================================
// Module: Statement Registry
// Description: Per-database cache of prepared statements keyed by query name.
// Purpose: Prepare catalog queries once and hand out shared handles.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`StatementRegistry`] owns the prepared statements created for one
//! [`Database`]. Statements are prepared eagerly at construction
//! ([`PrepareMode::Eager`]) or on first request ([`PrepareMode::Lazy`]), and
//! are reused for the lifetime of the registry.
//!
//! ## Concurrency
//! Each query name owns a slot guarded by its own mutex and condition
//! variable. The map lock is held only to resolve a slot, so preparing one
//! query never blocks callers asking for another. For a single name, the
//! first caller prepares while later callers wait for the outcome: they
//! receive the published handle, or the same error when that attempt failed.
//! Failed attempts leave the slot vacant so the next request retries.
//!
//! ## Invariants
//! - A cached handle was prepared from the catalog text present at the time.
//! - Names missing from the catalog never produce a handle.
//! - At most one handle is published per name; cached handles are never evicted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::audit::NoopAuditSink;
use crate::audit::RegistryAuditEvent;
use crate::audit::RegistryAuditKind;
use crate::audit::RegistryAuditSink;
use crate::catalog::QueryCatalog;
use crate::catalog::QueryName;
use crate::interfaces::Database;
use crate::interfaces::DatabaseError;

// ============================================================================
// SECTION: Options
// ============================================================================

/// When catalog queries are prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepareMode {
    /// Prepare every catalog entry during construction.
    #[default]
    Eager,
    /// Prepare each entry the first time it is requested.
    Lazy,
}

impl PrepareMode {
    /// Returns a stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eager => "eager",
            Self::Lazy => "lazy",
        }
    }
}

/// Construction options for a [`StatementRegistry`].
#[derive(Clone)]
pub struct RegistryOptions {
    /// Preparation mode.
    pub mode: PrepareMode,
    /// Sink receiving registry lifecycle events.
    pub audit: Arc<dyn RegistryAuditSink>,
}

impl RegistryOptions {
    /// Returns options for the given mode with a no-op audit sink.
    #[must_use]
    pub fn new(mode: PrepareMode) -> Self {
        Self {
            mode,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn RegistryAuditSink>) -> Self {
        self.audit = audit;
        self
    }
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self::new(PrepareMode::default())
    }
}

impl fmt::Debug for RegistryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryOptions").field("mode", &self.mode).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Statement registry errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Preparation and registration failures always carry the query name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The database rejected or could not prepare the query text.
    #[error("failed to prepare query {name}: {source}")]
    PreparationFailed {
        /// Query that failed to prepare.
        name: QueryName,
        /// Underlying database failure.
        #[source]
        source: DatabaseError,
    },
    /// The query name has no entry in the catalog.
    #[error("query not registered: {name}")]
    QueryNotRegistered {
        /// Requested query name.
        name: QueryName,
    },
    /// Binding a prepared statement to a transaction failed.
    #[error(transparent)]
    TransactionBindingFailed(DatabaseError),
}

impl RegistryError {
    /// Returns the query name carried by the error, if any.
    #[must_use]
    pub const fn query_name(&self) -> Option<&QueryName> {
        match self {
            Self::PreparationFailed {
                name, ..
            }
            | Self::QueryNotRegistered {
                name,
            } => Some(name),
            Self::TransactionBindingFailed(_) => None,
        }
    }

    /// Returns true when retrying the same request cannot succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::QueryNotRegistered { .. })
    }
}

// ============================================================================
// SECTION: Stats
// ============================================================================

/// Snapshot of registry activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatsSnapshot {
    /// Requests served from the cache without touching the database.
    pub cache_hits: u64,
    /// Calls made to [`Database::prepare`].
    pub preparations: u64,
    /// Preparation calls that failed.
    pub preparation_failures: u64,
    /// Requests for names missing from the catalog.
    pub not_registered: u64,
    /// Successful transaction bindings.
    pub transaction_binds: u64,
}

/// Live registry counters.
#[derive(Debug, Default)]
struct RegistryStats {
    /// Cache hit counter.
    cache_hits: AtomicU64,
    /// Preparation call counter.
    preparations: AtomicU64,
    /// Failed preparation counter.
    preparation_failures: AtomicU64,
    /// Unregistered name counter.
    not_registered: AtomicU64,
    /// Transaction binding counter.
    transaction_binds: AtomicU64,
}

impl RegistryStats {
    /// Increments a counter.
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter.
    fn snapshot(&self) -> RegistryStatsSnapshot {
        RegistryStatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            preparations: self.preparations.load(Ordering::Relaxed),
            preparation_failures: self.preparation_failures.load(Ordering::Relaxed),
            not_registered: self.not_registered.load(Ordering::Relaxed),
            transaction_binds: self.transaction_binds.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// SECTION: Slots
// ============================================================================

/// Preparation state of a single query name.
enum SlotState<S> {
    /// No handle and no preparation in flight.
    Vacant,
    /// A caller is preparing the statement.
    Preparing,
    /// Handle published to the cache.
    Ready(Arc<S>),
}

/// Mutable slot contents guarded by the slot mutex.
struct SlotInner<S> {
    /// Current preparation state.
    state: SlotState<S>,
    /// Number of preparation attempts started for this slot.
    attempt: u64,
    /// Most recent failed attempt and its error.
    last_failure: Option<(u64, RegistryError)>,
}

/// Cache entry for one query name.
struct StatementSlot<S> {
    /// Slot contents.
    inner: Mutex<SlotInner<S>>,
    /// Signalled whenever a preparation attempt settles.
    settled: Condvar,
}

impl<S> StatementSlot<S> {
    /// Creates a vacant slot.
    const fn vacant() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: SlotState::Vacant,
                attempt: 0,
                last_failure: None,
            }),
            settled: Condvar::new(),
        }
    }

    /// Locks the slot, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, SlotInner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the published handle, if any.
    fn ready(&self) -> Option<Arc<S>> {
        match &self.lock().state {
            SlotState::Ready(statement) => Some(Arc::clone(statement)),
            SlotState::Vacant | SlotState::Preparing => None,
        }
    }

    /// Publishes `statement`, replacing any previous handle.
    fn publish(&self, statement: Arc<S>) {
        self.lock().state = SlotState::Ready(statement);
        self.settled.notify_all();
    }
}

/// Returns a slot to vacant if its preparer unwinds before settling.
struct PreparingGuard<'a, S> {
    /// Slot being prepared.
    slot: &'a StatementSlot<S>,
    /// False once the attempt settled normally.
    armed: bool,
}

impl<S> Drop for PreparingGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.slot.lock();
            if matches!(inner.state, SlotState::Preparing) {
                inner.state = SlotState::Vacant;
            }
            drop(inner);
            self.slot.settled.notify_all();
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Cache of prepared statements for one database handle.
///
/// # Invariants
/// - Every cached handle was prepared by `database`.
/// - Cached handles are shared (`Arc`) and never replaced except by [`Self::prepare_all`].
pub struct StatementRegistry<D: Database> {
    /// Database used to prepare statements.
    database: Arc<D>,
    /// Catalog supplying query text.
    catalog: Arc<QueryCatalog>,
    /// Per-name slots.
    slots: Mutex<HashMap<QueryName, Arc<StatementSlot<D::Statement>>>>,
    /// Lifecycle event sink.
    audit: Arc<dyn RegistryAuditSink>,
    /// Activity counters.
    stats: RegistryStats,
}

impl<D: Database> StatementRegistry<D> {
    /// Creates a registry and prepares every catalog entry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PreparationFailed`] naming the first query that
    /// failed; no registry is returned in that case.
    pub fn new(database: Arc<D>, catalog: Arc<QueryCatalog>) -> Result<Self, RegistryError> {
        Self::open(database, catalog, RegistryOptions::new(PrepareMode::Eager))
    }

    /// Creates a registry that prepares entries on first request.
    #[must_use]
    pub fn lazy(database: Arc<D>, catalog: Arc<QueryCatalog>) -> Self {
        Self::empty(database, catalog, Arc::new(NoopAuditSink))
    }

    /// Creates a registry with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PreparationFailed`] when eager preparation fails.
    pub fn open(
        database: Arc<D>,
        catalog: Arc<QueryCatalog>,
        options: RegistryOptions,
    ) -> Result<Self, RegistryError> {
        let registry = Self::empty(database, catalog, options.audit);
        if options.mode == PrepareMode::Eager {
            registry.prepare_all()?;
            registry.audit.record(&RegistryAuditEvent::new(
                RegistryAuditKind::RegistryReady,
                None,
                Some(format!("{} statements", registry.len())),
            ));
        }
        Ok(registry)
    }

    /// Builds a registry with an empty cache sized for the current catalog.
    fn empty(
        database: Arc<D>,
        catalog: Arc<QueryCatalog>,
        audit: Arc<dyn RegistryAuditSink>,
    ) -> Self {
        let capacity = catalog.len();
        Self {
            database,
            catalog,
            slots: Mutex::new(HashMap::with_capacity(capacity)),
            audit,
            stats: RegistryStats::default(),
        }
    }

    /// Prepares every catalog entry and publishes the results.
    ///
    /// Handles are staged until every entry has prepared; on failure nothing
    /// is published and the cache is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PreparationFailed`] for the first failing query.
    pub fn prepare_all(&self) -> Result<(), RegistryError> {
        let entries = self.catalog.entries();
        let mut staged = Vec::with_capacity(entries.len());
        for (name, text) in entries {
            RegistryStats::bump(&self.stats.preparations);
            match self.database.prepare(text.as_str()) {
                Ok(statement) => staged.push((name, Arc::new(statement))),
                Err(source) => {
                    RegistryStats::bump(&self.stats.preparation_failures);
                    return Err(RegistryError::PreparationFailed {
                        name,
                        source,
                    });
                }
            }
        }
        for (name, statement) in staged {
            self.slot_or_insert(&name).publish(statement);
            self.record_prepared(&name, PrepareMode::Eager);
        }
        Ok(())
    }

    /// Returns the prepared statement for `name`, preparing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::QueryNotRegistered`] when the catalog has no
    /// entry for `name`, or [`RegistryError::PreparationFailed`] when
    /// preparation fails. Failures are not cached.
    pub fn get(&self, name: &str) -> Result<Arc<D::Statement>, RegistryError> {
        let slot = match self.slot(name) {
            Some(slot) => slot,
            None => {
                if !self.catalog.contains(name) {
                    RegistryStats::bump(&self.stats.not_registered);
                    return Err(RegistryError::QueryNotRegistered {
                        name: QueryName::from(name),
                    });
                }
                self.slot_or_insert(&QueryName::from(name))
            }
        };
        self.resolve(&QueryName::from(name), &slot)
    }

    /// Returns the statement for `name` bound to `transaction`.
    ///
    /// The base statement stays cached and unbound.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::get`], or
    /// [`RegistryError::TransactionBindingFailed`] carrying the database error
    /// unchanged.
    pub fn get_tx<'tx>(
        &self,
        transaction: &'tx D::Transaction,
        name: &str,
    ) -> Result<D::BoundStatement<'tx>, RegistryError> {
        let statement = self.get(name)?;
        let bound = self
            .database
            .bind_to_transaction(transaction, &statement)
            .map_err(RegistryError::TransactionBindingFailed)?;
        RegistryStats::bump(&self.stats.transaction_binds);
        Ok(bound)
    }

    /// Returns true when a handle for `name` is cached.
    #[must_use]
    pub fn is_cached(&self, name: &str) -> bool {
        self.slot(name).is_some_and(|slot| slot.ready().is_some())
    }

    /// Returns the names with cached handles in sorted order.
    #[must_use]
    pub fn cached_names(&self) -> Vec<QueryName> {
        let mut names: Vec<QueryName> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, slot)| slot.ready().is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Returns the number of cached handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.ready().is_some())
            .count()
    }

    /// Returns true when no handles are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the catalog backing this registry.
    #[must_use]
    pub const fn catalog(&self) -> &Arc<QueryCatalog> {
        &self.catalog
    }

    /// Returns the database backing this registry.
    #[must_use]
    pub const fn database(&self) -> &Arc<D> {
        &self.database
    }

    /// Returns a snapshot of activity counters.
    #[must_use]
    pub fn stats(&self) -> RegistryStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the slot for `name` when one exists.
    fn slot(&self, name: &str) -> Option<Arc<StatementSlot<D::Statement>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    /// Returns the slot for `name`, inserting a vacant one when missing.
    fn slot_or_insert(&self, name: &QueryName) -> Arc<StatementSlot<D::Statement>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots.entry(name.clone()).or_insert_with(|| Arc::new(StatementSlot::vacant())),
        )
    }

    /// Resolves a slot to a handle, preparing or waiting as needed.
    fn resolve(
        &self,
        name: &QueryName,
        slot: &StatementSlot<D::Statement>,
    ) -> Result<Arc<D::Statement>, RegistryError> {
        let mut inner = slot.lock();
        loop {
            if let SlotState::Ready(statement) = &inner.state {
                RegistryStats::bump(&self.stats.cache_hits);
                return Ok(Arc::clone(statement));
            }
            if matches!(inner.state, SlotState::Vacant) {
                break;
            }
            let awaited = inner.attempt;
            inner = slot
                .settled
                .wait_while(inner, |current| {
                    matches!(current.state, SlotState::Preparing) && current.attempt == awaited
                })
                .unwrap_or_else(PoisonError::into_inner);
            if !matches!(inner.state, SlotState::Ready(_))
                && let Some((attempt, error)) = &inner.last_failure
                && *attempt == awaited
            {
                return Err(error.clone());
            }
        }

        inner.attempt += 1;
        let attempt = inner.attempt;
        inner.state = SlotState::Preparing;
        drop(inner);

        let mut guard = PreparingGuard {
            slot,
            armed: true,
        };
        let outcome = self.prepare_one(name);
        let mut inner = slot.lock();
        guard.armed = false;
        let mut published = false;
        let result = match outcome {
            Ok(statement) => {
                if let SlotState::Ready(existing) = &inner.state {
                    Ok(Arc::clone(existing))
                } else {
                    let statement = Arc::new(statement);
                    inner.state = SlotState::Ready(Arc::clone(&statement));
                    published = true;
                    Ok(statement)
                }
            }
            Err(error) => {
                inner.last_failure = Some((attempt, error.clone()));
                if let SlotState::Ready(existing) = &inner.state {
                    Ok(Arc::clone(existing))
                } else {
                    inner.state = SlotState::Vacant;
                    Err(error)
                }
            }
        };
        drop(inner);
        slot.settled.notify_all();
        if published {
            self.record_prepared(name, PrepareMode::Lazy);
        }
        result
    }

    /// Prepares the current catalog text for `name`.
    fn prepare_one(&self, name: &QueryName) -> Result<D::Statement, RegistryError> {
        let Some(text) = self.catalog.lookup(name.as_str()) else {
            RegistryStats::bump(&self.stats.not_registered);
            return Err(RegistryError::QueryNotRegistered {
                name: name.clone(),
            });
        };
        RegistryStats::bump(&self.stats.preparations);
        self.database.prepare(text.as_str()).map_err(|source| {
            RegistryStats::bump(&self.stats.preparation_failures);
            RegistryError::PreparationFailed {
                name: name.clone(),
                source,
            }
        })
    }

    /// Emits a `statement_prepared` audit event.
    fn record_prepared(&self, name: &QueryName, mode: PrepareMode) {
        self.audit.record(&RegistryAuditEvent::new(
            RegistryAuditKind::StatementPrepared,
            Some(name),
            Some(mode.as_str().to_string()),
        ));
    }
}

impl<D: Database> fmt::Debug for StatementRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementRegistry")
            .field("catalog", &self.catalog)
            .field("cached", &self.len())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::DatabaseError;
    use super::PrepareMode;
    use super::QueryName;
    use super::RegistryError;

    #[test]
    fn registry_error_exposes_query_name() {
        let error = RegistryError::PreparationFailed {
            name: QueryName::from("bad"),
            source: DatabaseError::Rejected("near \"SELEC\": syntax error".to_string()),
        };
        assert_eq!(error.query_name().map(QueryName::as_str), Some("bad"));
        assert!(!error.is_permanent());
        assert!(error.to_string().contains("bad"));

        let missing = RegistryError::QueryNotRegistered {
            name: QueryName::from("missing"),
        };
        assert!(missing.is_permanent());
        assert_eq!(missing.to_string(), "query not registered: missing");
    }

    #[test]
    fn transaction_binding_error_is_transparent() {
        let source = DatabaseError::Transaction("transaction already finished".to_string());
        let error = RegistryError::TransactionBindingFailed(source.clone());
        assert_eq!(error.to_string(), source.to_string());
        assert!(error.query_name().is_none());
    }

    #[test]
    fn prepare_mode_labels_are_stable() {
        assert_eq!(PrepareMode::Eager.as_str(), "eager");
        assert_eq!(PrepareMode::Lazy.as_str(), "lazy");
        assert_eq!(PrepareMode::default(), PrepareMode::Eager);
    }
}
