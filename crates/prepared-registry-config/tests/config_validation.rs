//! Config validation tests for prepared-registry-config.
// crates/prepared-registry-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate parsing, defaults, and fail-closed limits.
// Purpose: Ensure malformed registry configuration is rejected before use.
// =============================================================================

use std::fs;
use std::path::PathBuf;

use prepared_registry_config::AuditSinkKind;
use prepared_registry_config::ConfigError;
use prepared_registry_config::QueryEntry;
use prepared_registry_config::RegistryConfig;
use prepared_registry_core::PrepareMode;
use prepared_registry_sqlite::SqliteJournalMode;
use prepared_registry_sqlite::SqliteSyncMode;
use tempfile::TempDir;

mod common;

use common::TestResult;
use common::assert_invalid;

const FULL_CONFIG: &str = r#"
[database]
path = "data/app.db"
busy_timeout_ms = 250
journal_mode = "delete"
sync_mode = "normal"
pool_size = 2

[registry]
mode = "lazy"

[audit]
sink = "stderr"

[[queries]]
name = "find_user"
sql = "SELECT id, name FROM users WHERE id = ?1"

[[queries]]
name = "insert_user"
sql = "INSERT INTO users (id, name) VALUES (?1, ?2)"
"#;

#[test]
fn full_config_parses_every_section() -> TestResult {
    let config = RegistryConfig::from_toml_str(FULL_CONFIG).map_err(|err| err.to_string())?;
    if config.database.path != PathBuf::from("data/app.db")
        || config.database.busy_timeout_ms != 250
        || config.database.journal_mode != SqliteJournalMode::Delete
        || config.database.sync_mode != SqliteSyncMode::Normal
        || config.database.pool_size != 2
    {
        return Err(format!("unexpected database section: {:?}", config.database));
    }
    if config.registry.mode != PrepareMode::Lazy || config.audit.sink != AuditSinkKind::Stderr {
        return Err("unexpected registry or audit section".to_string());
    }
    let names: Vec<&str> = config.queries.iter().map(|entry| entry.name.as_str()).collect();
    if names != ["find_user", "insert_user"] {
        return Err(format!("unexpected query names: {names:?}"));
    }
    Ok(())
}

#[test]
fn minimal_config_applies_defaults() -> TestResult {
    let config = RegistryConfig::from_toml_str("[database]\npath = \"app.db\"\n")
        .map_err(|err| err.to_string())?;
    if config.registry.mode != PrepareMode::Eager
        || config.audit.sink != AuditSinkKind::None
        || config.database.pool_size != 4
        || config.database.statement_cache_capacity != 64
        || config.database.busy_timeout_ms != 5_000
        || config.database.journal_mode != SqliteJournalMode::Wal
        || !config.queries.is_empty()
    {
        return Err(format!("unexpected defaults: {config:?}"));
    }
    Ok(())
}

#[test]
fn missing_database_section_is_a_parse_error() -> TestResult {
    match RegistryConfig::from_toml_str("[registry]\nmode = \"lazy\"\n") {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {other:?}")),
    }
}

#[test]
fn unknown_mode_is_a_parse_error() -> TestResult {
    match RegistryConfig::from_toml_str("[database]\npath = \"app.db\"\n[registry]\nmode = \"sometimes\"\n")
    {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {other:?}")),
    }
}

#[test]
fn duplicate_query_names_are_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let mut config = common::minimal_config(&dir.path().join("app.db")).map_err(|err| err.to_string())?;
    config.queries = vec![
        QueryEntry {
            name: "find_user".to_string(),
            sql: "SELECT 1".to_string(),
        },
        QueryEntry {
            name: "find_user".to_string(),
            sql: "SELECT 2".to_string(),
        },
    ];
    assert_invalid(config.validate(), "duplicate query name: find_user")
}

#[test]
fn blank_query_name_and_sql_are_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let mut config = common::minimal_config(&dir.path().join("app.db")).map_err(|err| err.to_string())?;
    config.queries = vec![QueryEntry {
        name: "  ".to_string(),
        sql: "SELECT 1".to_string(),
    }];
    assert_invalid(config.validate(), "queries.name must be non-empty")?;
    config.queries = vec![QueryEntry {
        name: "find_user".to_string(),
        sql: "\n".to_string(),
    }];
    assert_invalid(config.validate(), "queries.sql must be non-empty: find_user")
}

#[test]
fn overlong_query_name_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let mut config = common::minimal_config(&dir.path().join("app.db")).map_err(|err| err.to_string())?;
    config.queries = vec![QueryEntry {
        name: "q".repeat(200),
        sql: "SELECT 1".to_string(),
    }];
    assert_invalid(config.validate(), "queries.name exceeds max length")
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    assert_invalid(
        RegistryConfig::from_toml_str("[database]\npath = \"app.db\"\n[audit]\nsink = \"file\"\n"),
        "audit.path is required for the file sink",
    )?;
    assert_invalid(
        RegistryConfig::from_toml_str(
            "[database]\npath = \"app.db\"\n[audit]\nsink = \"stderr\"\npath = \"audit.log\"\n",
        ),
        "audit.path is only valid for the file sink",
    )
}

#[test]
fn database_limits_are_enforced() -> TestResult {
    assert_invalid(
        RegistryConfig::from_toml_str("[database]\npath = \"app.db\"\npool_size = 0\n"),
        "pool_size out of range",
    )?;
    assert_invalid(
        RegistryConfig::from_toml_str("[database]\npath = \"app.db\"\nstatement_cache_capacity = 0\n"),
        "statement_cache_capacity must be greater than zero",
    )
}

#[test]
fn directory_database_path_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let config = common::minimal_config(dir.path()).map_err(|err| err.to_string())?;
    assert_invalid(config.validate(), "database path must be a file")
}

#[test]
fn load_reads_and_validates_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("prepared-registry.toml");
    fs::write(&path, FULL_CONFIG).map_err(|err| err.to_string())?;
    let config = RegistryConfig::load(&path).map_err(|err| err.to_string())?;
    if config.queries.len() != 2 {
        return Err("expected two queries".to_string());
    }
    Ok(())
}

#[test]
fn load_rejects_oversized_and_non_utf8_files() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let oversized = dir.path().join("big.toml");
    fs::write(&oversized, vec![b'#'; 1024 * 1024 + 1]).map_err(|err| err.to_string())?;
    assert_invalid(RegistryConfig::load(&oversized), "config file exceeds size limit")?;

    let binary = dir.path().join("binary.toml");
    fs::write(&binary, [0xff_u8, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    assert_invalid(RegistryConfig::load(&binary), "config file must be utf-8")
}

#[test]
fn load_reports_missing_file_as_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    match RegistryConfig::load(&dir.path().join("missing.toml")) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {other:?}")),
    }
}
