// crates/prepared-registry-core/src/lib.rs
// ============================================================================
// Module: Prepared Registry Core
// Description: Query catalog and prepared statement registry.
// Purpose: Prepare named SQL once per database and reuse the handles.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Applications register named SQL text in a [`QueryCatalog`] during
//! initialization, then build a [`StatementRegistry`] over a [`Database`]
//! handle. The registry prepares each query once (eagerly or on first use)
//! and hands out shared statement handles by name, optionally bound to a
//! transaction.
//!
//! Invariants:
//! - Names missing from the catalog always fail with
//!   [`RegistryError::QueryNotRegistered`].
//! - Failed preparations are reported to the caller and never cached.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod catalog;
pub mod interfaces;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RegistryAuditEvent;
pub use audit::RegistryAuditKind;
pub use audit::RegistryAuditSink;
pub use audit::StderrAuditSink;
pub use catalog::QueryCatalog;
pub use catalog::QueryName;
pub use catalog::QueryText;
pub use interfaces::Database;
pub use interfaces::DatabaseError;
pub use registry::PrepareMode;
pub use registry::RegistryError;
pub use registry::RegistryOptions;
pub use registry::RegistryStatsSnapshot;
pub use registry::StatementRegistry;
