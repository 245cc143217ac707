// crates/prepared-registry-core/src/interfaces.rs
// ============================================================================
// Module: Database Interface
// Description: Backend-agnostic contract for preparing and binding statements.
// Purpose: Define the collaborator surface the statement registry relies on.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The registry never talks to a driver directly. A [`Database`]
//! implementation compiles SQL text into a prepared statement and derives
//! transaction-scoped handles from existing statements. Connection setup,
//! pooling, and statement invalidation on close belong to the implementation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Database collaborator errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages come from the driver and never embed bound parameter values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// The database rejected the SQL text (syntax error, unknown table, ...).
    #[error("statement rejected: {0}")]
    Rejected(String),
    /// Connectivity, locking, or I/O failure.
    #[error("database connection error: {0}")]
    Connection(String),
    /// Transaction state prevented the operation.
    #[error("transaction error: {0}")]
    Transaction(String),
}

// ============================================================================
// SECTION: Database
// ============================================================================

/// Database handle capable of preparing statements and binding them to transactions.
pub trait Database: Send + Sync {
    /// Prepared statement produced by [`Database::prepare`].
    type Statement: Send + Sync;
    /// Active transaction context.
    type Transaction;
    /// Statement bound to a transaction for the lifetime of the borrow.
    type BoundStatement<'tx>
    where
        Self::Transaction: 'tx;

    /// Compiles SQL text into a prepared statement.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the text is rejected or the database is unreachable.
    fn prepare(&self, sql: &str) -> Result<Self::Statement, DatabaseError>;

    /// Derives a handle that executes `statement` inside `transaction`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the transaction cannot accept the statement.
    fn bind_to_transaction<'tx>(
        &self,
        transaction: &'tx Self::Transaction,
        statement: &Arc<Self::Statement>,
    ) -> Result<Self::BoundStatement<'tx>, DatabaseError>;
}
