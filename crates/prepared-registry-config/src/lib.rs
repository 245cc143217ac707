// crates/prepared-registry-config/src/lib.rs
// ============================================================================
// Module: Prepared Registry Config Library
// Description: Configuration model, validation, and registry bootstrap.
// Purpose: Single source of truth for prepared-registry.toml semantics.
// Dependencies: prepared-registry-core, prepared-registry-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `prepared-registry-config` loads a TOML file describing the database, the
//! preparation mode, the audit sink, and the named queries, validates it
//! fail-closed, and wires the pieces into a ready [`StatementRegistry`].
//!
//! [`StatementRegistry`]: prepared_registry_core::StatementRegistry

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
