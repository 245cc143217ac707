// crates/prepared-registry-core/src/audit.rs
// ============================================================================
// Module: Registry Audit Logging
// Description: Structured audit events for catalog and registry activity.
// Purpose: Emit JSON line diagnostics without a logging framework dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events describe catalog and registry lifecycle activity: duplicate
//! query registration, statement preparation, and registry readiness. Sinks
//! decide where events go; deployments can route them into any logging
//! pipeline by implementing [`RegistryAuditSink`].
//!
//! Failures are returned to callers and are never reported through sinks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::catalog::QueryName;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit event classification.
///
/// # Invariants
/// - Variants are stable for log labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryAuditKind {
    /// A catalog registration replaced existing text for a name.
    QueryOverwritten,
    /// A statement was prepared and published to a registry cache.
    StatementPrepared,
    /// Eager construction prepared every catalog entry.
    RegistryReady,
}

impl RegistryAuditKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueryOverwritten => "query_overwritten",
            Self::StatementPrepared => "statement_prepared",
            Self::RegistryReady => "registry_ready",
        }
    }
}

/// Registry audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event classification.
    pub kind: RegistryAuditKind,
    /// Query name when the event concerns a single query.
    pub query_name: Option<String>,
    /// Free-form detail label.
    pub detail: Option<String>,
}

impl RegistryAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(kind: RegistryAuditKind, query_name: Option<&QueryName>, detail: Option<String>) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "prepared_registry_audit",
            timestamp_ms,
            kind,
            query_name: query_name.map(|name| name.as_str().to_string()),
            detail,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for catalog and registry events.
pub trait RegistryAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &RegistryAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl RegistryAuditSink for StderrAuditSink {
    fn record(&self, event: &RegistryAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RegistryAuditSink for FileAuditSink {
    fn record(&self, event: &RegistryAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl RegistryAuditSink for NoopAuditSink {
    fn record(&self, _event: &RegistryAuditEvent) {}
}
