// crates/prepared-registry-core/tests/common/mod.rs
// ============================================================================
// Module: Registry Test Support
// Description: In-memory database double for registry tests.
// Purpose: Count preparations and inject failures deterministically.
// ============================================================================

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers.")]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use prepared_registry_core::Database;
use prepared_registry_core::DatabaseError;
use prepared_registry_core::RegistryAuditEvent;
use prepared_registry_core::RegistryAuditSink;

/// Leading keywords the fake accepts as valid SQL.
const ACCEPTED_KEYWORDS: [&str; 5] = ["SELECT", "INSERT", "UPDATE", "DELETE", "WITH"];

/// Statement produced by [`FakeDatabase`].
#[derive(Debug)]
pub struct FakeStatement {
    pub id: u64,
    pub sql: String,
}

/// Transaction context accepted by [`FakeDatabase`].
#[derive(Debug)]
pub struct FakeTransaction {
    pub id: u64,
    pub active: bool,
}

impl FakeTransaction {
    pub const fn active(id: u64) -> Self {
        Self {
            id,
            active: true,
        }
    }

    pub const fn finished(id: u64) -> Self {
        Self {
            id,
            active: false,
        }
    }
}

/// Statement bound to a [`FakeTransaction`].
#[derive(Debug)]
pub struct FakeBoundStatement<'tx> {
    pub statement: Arc<FakeStatement>,
    pub transaction: &'tx FakeTransaction,
}

/// Database double that validates the leading keyword of SQL text.
#[derive(Default)]
pub struct FakeDatabase {
    prepare_calls: AtomicUsize,
    calls_by_sql: Mutex<BTreeMap<String, usize>>,
    next_id: AtomicU64,
    fail_next: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps inside every `prepare` call to widen race windows.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Makes the next `count` preparations fail with a connection error.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, sql: &str) -> usize {
        self.calls_by_sql.lock().unwrap().get(sql).copied().unwrap_or(0)
    }
}

impl Database for FakeDatabase {
    type Statement = FakeStatement;
    type Transaction = FakeTransaction;
    type BoundStatement<'tx> = FakeBoundStatement<'tx>;

    fn prepare(&self, sql: &str) -> Result<Self::Statement, DatabaseError> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls_by_sql.lock().unwrap().entry(sql.to_string()).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| remaining.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DatabaseError::Connection("connection reset".to_string()));
        }
        let keyword = sql.split_whitespace().next().unwrap_or_default().to_ascii_uppercase();
        if !ACCEPTED_KEYWORDS.contains(&keyword.as_str()) {
            return Err(DatabaseError::Rejected(format!("near \"{keyword}\": syntax error")));
        }
        Ok(FakeStatement {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            sql: sql.to_string(),
        })
    }

    fn bind_to_transaction<'tx>(
        &self,
        transaction: &'tx Self::Transaction,
        statement: &Arc<Self::Statement>,
    ) -> Result<Self::BoundStatement<'tx>, DatabaseError> {
        if !transaction.active {
            return Err(DatabaseError::Transaction(format!(
                "transaction {} is not active",
                transaction.id
            )));
        }
        Ok(FakeBoundStatement {
            statement: Arc::clone(statement),
            transaction,
        })
    }
}

/// Audit sink capturing events in memory.
#[derive(Default)]
pub struct CaptureAuditSink {
    events: Mutex<Vec<RegistryAuditEvent>>,
}

impl CaptureAuditSink {
    pub fn events(&self) -> Vec<RegistryAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl RegistryAuditSink for CaptureAuditSink {
    fn record(&self, event: &RegistryAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
