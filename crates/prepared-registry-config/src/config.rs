// crates/prepared-registry-config/src/config.rs
// ============================================================================
// Module: Prepared Registry Configuration
// Description: Configuration loading, validation, and registry bootstrap.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: prepared-registry-core, prepared-registry-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! A typical file:
//!
//! ```toml
//! [database]
//! path = "app.db"
//!
//! [registry]
//! mode = "eager"
//!
//! [audit]
//! sink = "stderr"
//!
//! [[queries]]
//! name = "find_user"
//! sql = "SELECT id, name FROM users WHERE id = ?1"
//! ```
//!
//! [`bootstrap`] turns a validated config into a ready statement registry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use prepared_registry_core::DatabaseError;
use prepared_registry_core::FileAuditSink;
use prepared_registry_core::NoopAuditSink;
use prepared_registry_core::PrepareMode;
use prepared_registry_core::QueryCatalog;
use prepared_registry_core::QueryName;
use prepared_registry_core::QueryText;
use prepared_registry_core::RegistryAuditSink;
use prepared_registry_core::RegistryError;
use prepared_registry_core::RegistryOptions;
use prepared_registry_core::StatementRegistry;
use prepared_registry_core::StderrAuditSink;
use prepared_registry_sqlite::SqliteDatabase;
use prepared_registry_sqlite::SqliteDatabaseConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum config file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured queries.
pub(crate) const MAX_QUERIES: usize = 4096;
/// Maximum query name length in bytes.
pub(crate) const MAX_QUERY_NAME_LENGTH: usize = 128;
/// Maximum query text length in bytes.
pub(crate) const MAX_QUERY_SQL_LENGTH: usize = 64 * 1024;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level registry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// `SQLite` database settings.
    pub database: SqliteDatabaseConfig,
    /// Registry behavior.
    #[serde(default)]
    pub registry: RegistrySettings,
    /// Audit sink selection.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Named queries registered in the catalog.
    #[serde(default)]
    pub queries: Vec<QueryEntry>,
}

/// Registry behavior settings.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RegistrySettings {
    /// When statements are prepared.
    #[serde(default)]
    pub mode: PrepareMode,
}

/// Audit sink kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Discard audit events.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
}

/// Audit sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path, required for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates sink-specific fields.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

/// Named query entry.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryEntry {
    /// Query name used for lookups.
    pub name: String,
    /// SQL text.
    pub sql: String,
}

impl QueryEntry {
    /// Validates the entry's name and text.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("queries.name must be non-empty".to_string()));
        }
        if self.name.len() > MAX_QUERY_NAME_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "queries.name exceeds max length: {}",
                self.name
            )));
        }
        if self.sql.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("queries.sql must be non-empty: {}", self.name)));
        }
        if self.sql.len() > MAX_QUERY_SQL_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "queries.sql exceeds max length: {}",
                self.name
            )));
        }
        Ok(())
    }
}

impl RegistryConfig {
    /// Loads configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        self.audit.validate()?;
        if self.queries.len() > MAX_QUERIES {
            return Err(ConfigError::Invalid("too many queries configured".to_string()));
        }
        let mut seen = BTreeSet::new();
        for entry in &self.queries {
            entry.validate()?;
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate query name: {}", entry.name)));
            }
        }
        Ok(())
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit log file cannot be opened.
    pub fn build_audit_sink(&self) -> Result<Arc<dyn RegistryAuditSink>, ConfigError> {
        match (self.audit.sink, &self.audit.path) {
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::File, Some(path)) => {
                let sink = FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
        }
    }

    /// Builds a catalog holding every configured query.
    #[must_use]
    pub fn build_catalog(&self, audit: Arc<dyn RegistryAuditSink>) -> Arc<QueryCatalog> {
        let catalog = QueryCatalog::with_audit(audit);
        catalog.extend(self.queries.iter().map(|entry| (entry.name.as_str(), entry.sql.as_str())));
        Arc::new(catalog)
    }
}

// ============================================================================
// SECTION: Bootstrap
// ============================================================================

/// Opens the database and builds a registry from `config`.
///
/// `extra` entries are registered after the configured queries, replacing
/// configured text for the same name. The per-connection statement cache is
/// grown to hold every catalog entry.
///
/// # Errors
///
/// Returns [`ConfigError`] when validation fails, the database cannot be
/// opened, or eager preparation fails.
pub fn bootstrap<I, N, T>(
    config: &RegistryConfig,
    extra: I,
) -> Result<StatementRegistry<SqliteDatabase>, ConfigError>
where
    I: IntoIterator<Item = (N, T)>,
    N: Into<QueryName>,
    T: Into<QueryText>,
{
    config.validate()?;
    let audit = config.build_audit_sink()?;
    let catalog = config.build_catalog(Arc::clone(&audit));
    catalog.extend(extra);
    let mut database_config = config.database.clone();
    database_config.statement_cache_capacity =
        database_config.statement_cache_capacity.max(catalog.len());
    let database = SqliteDatabase::open(database_config).map_err(DatabaseError::from)?;
    let options = RegistryOptions::new(config.registry.mode).with_audit(audit);
    Ok(StatementRegistry::open(Arc::new(database), catalog, options)?)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading, validation, or bootstrap errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Database could not be opened.
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// Registry construction failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates the config path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
