// crates/prepared-registry-sqlite/src/lib.rs
// ============================================================================
// Module: Prepared Registry SQLite
// Description: SQLite backend for the prepared statement registry.
// Purpose: Provide a pooled rusqlite database implementing the registry seam.
// Dependencies: prepared-registry-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteDatabase`] implements [`prepared_registry_core::Database`] over a
//! fixed pool of `SQLite` connections. Statements are validated when the
//! registry prepares them and executed through per-connection statement
//! caches. Transactions reserve one connection until commit or rollback.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod database;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use database::QueryRows;
pub use database::SqliteDatabase;
pub use database::SqliteDatabaseConfig;
pub use database::SqliteDatabaseError;
pub use database::SqliteJournalMode;
pub use database::SqliteStatement;
pub use database::SqliteSyncMode;
pub use database::SqliteTransaction;
pub use database::SqliteTxStatement;
pub use rusqlite::types::Value;
