// crates/prepared-registry-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for prepared-registry-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::path::Path;

use prepared_registry_config::ConfigError;
use prepared_registry_config::RegistryConfig;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Parses a TOML string without validation.
pub fn config_from_toml(toml_str: &str) -> Result<RegistryConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config pointing at `database_path`.
pub fn minimal_config(database_path: &Path) -> Result<RegistryConfig, toml::de::Error> {
    config_from_toml(&format!("[database]\npath = {:?}\n", database_path.display().to_string()))
}

/// Asserts that `result` failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
