// crates/prepared-registry-core/tests/proptest_catalog.rs
// ============================================================================
// Module: Catalog Property-Based Tests
// Description: Property tests for catalog overwrite and registry caching.
// Purpose: Check last-write-wins and prepare-once across arbitrary inputs.
// ============================================================================

//! Property-based tests for catalog and registry invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use prepared_registry_core::QueryCatalog;
use prepared_registry_core::StatementRegistry;
use proptest::prelude::*;

use crate::common::FakeDatabase;

fn registrations() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[a-e]", "SELECT [a-z0-9 ]{0,12}"), 0 .. 24)
}

proptest! {
    #[test]
    fn catalog_keeps_the_last_registration(entries in registrations()) {
        let catalog = QueryCatalog::new();
        let mut expected = BTreeMap::new();
        for (name, text) in &entries {
            catalog.add(name.as_str(), text.as_str());
            expected.insert(name.clone(), text.clone());
        }
        prop_assert_eq!(catalog.len(), expected.len());
        for (name, text) in &expected {
            let stored = catalog.lookup(name).unwrap();
            prop_assert_eq!(stored.as_str(), text.as_str());
        }
    }

    #[test]
    fn lazy_registry_prepares_each_name_once(
        entries in registrations(),
        requests in prop::collection::vec("[a-g]", 0 .. 32),
    ) {
        let catalog = Arc::new(QueryCatalog::new());
        catalog.extend(entries.iter().map(|(name, text)| (name.as_str(), text.as_str())));
        let database = Arc::new(FakeDatabase::new());
        let registry = StatementRegistry::lazy(Arc::clone(&database), Arc::clone(&catalog));

        let mut first_handles = BTreeMap::new();
        for name in &requests {
            match registry.get(name) {
                Ok(statement) => {
                    let expected = catalog.lookup(name).unwrap();
                    prop_assert_eq!(statement.sql.as_str(), expected.as_str());
                    let first = first_handles.entry(name.clone()).or_insert_with(|| Arc::clone(&statement));
                    prop_assert!(Arc::ptr_eq(first, &statement));
                }
                Err(error) => {
                    prop_assert!(!catalog.contains(name));
                    prop_assert!(error.is_permanent());
                }
            }
        }
        prop_assert_eq!(database.prepare_calls(), first_handles.len());
    }
}
