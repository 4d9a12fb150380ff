//! Configuration module for the governance spine.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, defaults, and a builder pattern for
//! programmatic use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the governance spine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub database: DatabaseConfig,
    pub audit: AuditConfig,
    pub versions: VersionsConfig,
    pub transactions: TransactionsConfig,
    pub logging: LoggingConfig,
}

/// Durable store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Audit trail settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Entity types whose mutations are recorded by the middleware.
    pub audited_entities: Vec<String>,
    /// Field names stripped from records before they are logged.
    pub excluded_fields: Vec<String>,
    /// Individual mutations per request and entity type logged before suppression.
    pub batch_threshold: u32,
    /// Lifetime of a batch counter, in milliseconds.
    pub batch_window_ms: u64,
    /// Strings longer than this are truncated in logged records.
    pub max_string_length: usize,
    /// Number of entity ids kept in a batch summary's metadata.
    pub batch_id_sample_size: usize,
    /// Capacity of the background audit queue.
    pub queue_capacity: usize,
}

/// Version snapshot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionsConfig {
    /// Entity types that get version snapshots.
    pub versioned_entities: Vec<String>,
    /// Per-type number of versions kept; `-1` keeps every version.
    pub retention: BTreeMap<String, i64>,
    /// Cap used for types without an entry in `retention`.
    pub default_retention: i64,
    /// Attempts at claiming the next version number before giving up.
    pub allocation_retries: u32,
}

/// Transaction wrapper settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionsConfig {
    /// Longest wait for a transaction to begin, in milliseconds.
    pub max_wait_ms: u64,
    /// Longest time the operations may run, in milliseconds.
    pub timeout_ms: u64,
    /// Attempts made by the retrying wrapper.
    pub max_retries: u32,
    /// Base delay between retries, in milliseconds (multiplied by the attempt).
    pub retry_delay_ms: u64,
    /// Items per chunk in batch transactions.
    pub batch_size: usize,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl GovernanceConfig {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GovernanceConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`GovernanceConfig::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/govspine/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("govspine")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Entity types audited when no configuration overrides the list.
pub const DEFAULT_AUDITED_ENTITIES: &[&str] = &[
    "Project",
    "Building",
    "AssemblyPart",
    "ProductionLog",
    "QCInspection",
    "WeldingInspection",
    "DimensionalInspection",
    "NDTInspection",
    "WPS",
    "ITP",
    "DocumentSubmission",
    "RFIRequest",
    "NCRReport",
    "Task",
    "User",
    "WorkOrder",
    "WorkOrderPart",
];

/// Fields never written into an audit record.
pub const DEFAULT_EXCLUDED_FIELDS: &[&str] = &[
    "createdAt",
    "updatedAt",
    "password",
    "passwordHash",
    "token",
    "refreshToken",
    "created_at",
    "updated_at",
    "password_hash",
    "refresh_token",
];

/// Entity types that get version snapshots by default.
pub const DEFAULT_VERSIONED_ENTITIES: &[&str] = &["Project", "Building", "QCInspection", "WPS", "ITP"];

/// Retention value meaning "keep every version".
pub const KEEP_ALL_VERSIONS: i64 = -1;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("govspine");
        Self {
            path: data_dir.join("governance.db"),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            audited_entities: strings(DEFAULT_AUDITED_ENTITIES),
            excluded_fields: strings(DEFAULT_EXCLUDED_FIELDS),
            batch_threshold: 10,
            batch_window_ms: 5_000,
            max_string_length: 1_000,
            batch_id_sample_size: 100,
            queue_capacity: 1_024,
        }
    }
}

impl Default for VersionsConfig {
    fn default() -> Self {
        let retention = [
            ("Project", KEEP_ALL_VERSIONS),
            ("Building", 50),
            ("QCInspection", KEEP_ALL_VERSIONS),
            ("WPS", KEEP_ALL_VERSIONS),
            ("ITP", KEEP_ALL_VERSIONS),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            versioned_entities: strings(DEFAULT_VERSIONED_ENTITIES),
            retention,
            default_retention: 30,
            allocation_retries: 5,
        }
    }
}

impl Default for TransactionsConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 10_000,
            timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            batch_size: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl AuditConfig {
    /// Whether mutations of `entity_type` are recorded
    pub fn is_audited(&self, entity_type: &str) -> bool {
        self.audited_entities.iter().any(|e| e == entity_type)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }
}

impl VersionsConfig {
    pub fn is_versioned(&self, entity_type: &str) -> bool {
        self.versioned_entities.iter().any(|e| e == entity_type)
    }

    /// Cap for `entity_type`, falling back to the default cap
    pub fn retention_for(&self, entity_type: &str) -> i64 {
        self.retention
            .get(entity_type)
            .copied()
            .unwrap_or(self.default_retention)
    }
}

impl TransactionsConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"audit.batch_threshold"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn must_be_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl GovernanceConfig {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- database ---
        if self.database.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "database.path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- audit ---
        let audit = &self.audit;
        must_be_positive(&mut errors, "audit.batch_threshold", audit.batch_threshold.into());
        must_be_positive(&mut errors, "audit.batch_window_ms", audit.batch_window_ms);
        must_be_positive(&mut errors, "audit.max_string_length", audit.max_string_length as u64);
        must_be_positive(&mut errors, "audit.queue_capacity", audit.queue_capacity as u64);

        // --- versions ---
        let versions = &self.versions;
        for (entity_type, cap) in &versions.retention {
            if *cap < KEEP_ALL_VERSIONS {
                errors.push(ValidationError {
                    field: format!("versions.retention.{entity_type}"),
                    message: format!("must be -1 (keep all) or a non-negative count, got {cap}"),
                });
            }
        }
        if versions.default_retention < KEEP_ALL_VERSIONS {
            errors.push(ValidationError {
                field: "versions.default_retention".into(),
                message: format!(
                    "must be -1 (keep all) or a non-negative count, got {}",
                    versions.default_retention
                ),
            });
        }
        must_be_positive(
            &mut errors,
            "versions.allocation_retries",
            versions.allocation_retries.into(),
        );

        // --- transactions ---
        let tx = &self.transactions;
        must_be_positive(&mut errors, "transactions.max_wait_ms", tx.max_wait_ms);
        must_be_positive(&mut errors, "transactions.timeout_ms", tx.timeout_ms);
        must_be_positive(&mut errors, "transactions.max_retries", tx.max_retries.into());
        must_be_positive(&mut errors, "transactions.batch_size", tx.batch_size as u64);

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for constructing a [`GovernanceConfig`] programmatically.
///
/// Starts from [`GovernanceConfig::default`] and lets callers override
/// individual fields.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: GovernanceConfig,
}

impl ConfigBuilder {
    /// Create a new builder pre-populated with default values.
    pub fn new() -> Self {
        Self {
            config: GovernanceConfig::default(),
        }
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database.path = path.into();
        self
    }

    pub fn audited_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.audit.audited_entities = entities.into_iter().map(Into::into).collect();
        self
    }

    pub fn audit_batch_threshold(mut self, threshold: u32) -> Self {
        self.config.audit.batch_threshold = threshold;
        self
    }

    pub fn audit_batch_window(mut self, window: Duration) -> Self {
        self.config.audit.batch_window_ms = window.as_millis() as u64;
        self
    }

    pub fn audit_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.audit.queue_capacity = capacity;
        self
    }

    pub fn version_retention(mut self, entity_type: impl Into<String>, cap: i64) -> Self {
        self.config.versions.retention.insert(entity_type.into(), cap);
        self
    }

    pub fn default_version_retention(mut self, cap: i64) -> Self {
        self.config.versions.default_retention = cap;
        self
    }

    pub fn transaction_max_wait(mut self, max_wait: Duration) -> Self {
        self.config.transactions.max_wait_ms = max_wait.as_millis() as u64;
        self
    }

    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.config.transactions.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn transaction_max_retries(mut self, retries: u32) -> Self {
        self.config.transactions.max_retries = retries;
        self
    }

    pub fn transaction_retry_delay(mut self, delay: Duration) -> Self {
        self.config.transactions.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn transaction_batch_size(mut self, size: usize) -> Self {
        self.config.transactions.batch_size = size;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    /// Consume the builder and return the finished [`GovernanceConfig`].
    pub fn build(self) -> GovernanceConfig {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<GovernanceConfig, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
