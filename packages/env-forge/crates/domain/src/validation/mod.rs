//! Data model for plugin validation runs. The orchestrator that executes
//! them lives in the `application` crate.

mod classify;

pub use classify::{enhance_error, FailureCause};

use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// Plugins assumed essential when neither the environment nor the config
/// file says otherwise.
pub const DEFAULT_CRITICAL_PLUGINS: &[&str] = &["tool-shell", "tool-git", "pkg-core"];

/// Tunables for one validation run.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub verify_checksums: bool,
    pub verify_signatures: bool,
    /// Bounded worker pool size for the parallel phase.
    pub concurrency: usize,
    /// Abort the whole run on the first failed critical plugin.
    pub fail_on_critical: bool,
    pub critical_plugins: BTreeSet<String>,
    /// Deadline applied to each plugin individually.
    pub per_plugin_timeout: Duration,
    /// Downgrade checksum/signature failures to logged warnings.
    pub allow_insecure_plugins: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            verify_signatures: true,
            concurrency: default_concurrency(),
            fail_on_critical: false,
            critical_plugins: BTreeSet::new(),
            per_plugin_timeout: Duration::from_secs(30),
            allow_insecure_plugins: false,
        }
    }
}

pub fn default_concurrency() -> usize {
    num_cpus::get().clamp(1, 4)
}

/// Resolve the critical plugin set from explicit inputs, highest
/// precedence first: environment value, config file entry, built-in
/// defaults. Computed once at startup and passed into
/// [`ValidationConfig`]; nothing reads the environment after this.
pub fn resolve_critical_plugins(
    env_value: Option<&str>,
    config_value: Option<&[String]>,
    defaults: &[&str],
) -> BTreeSet<String> {
    if let Some(raw) = env_value {
        let set: BTreeSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if !set.is_empty() {
            return set;
        }
    }

    if let Some(list) = config_value {
        if !list.is_empty() {
            return list.iter().cloned().collect();
        }
    }

    defaults.iter().map(|s| s.to_string()).collect()
}

/// Outcome for a single plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub plugin: String,
    pub is_valid: bool,
    pub checksum_valid: bool,
    pub signature_valid: bool,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl ValidationResult {
    pub fn valid(plugin: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            plugin: plugin.into(),
            is_valid: true,
            checksum_valid: true,
            signature_valid: true,
            error: None,
            elapsed,
        }
    }

    pub fn invalid(plugin: impl Into<String>, error: String, elapsed: Duration) -> Self {
        Self {
            plugin: plugin.into(),
            is_valid: false,
            checksum_valid: false,
            signature_valid: false,
            error: Some(error),
            elapsed,
        }
    }
}

/// Aggregate report for a run. `results` preserves input order.
#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub total_plugins: usize,
    pub valid_plugins: usize,
    pub invalid_plugins: usize,
    pub critical_failures: usize,
    pub results: Vec<ValidationResult>,
    pub errors: Vec<String>,
    pub elapsed: Duration,
}

impl ValidationSummary {
    pub fn all_valid(&self) -> bool {
        self.invalid_plugins == 0 && self.critical_failures == 0
    }
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("plugin '{0}' is not installed; add it with 'env-forge plugin add {0}'")]
    NotInstalled(String),

    #[error("checksum mismatch for '{plugin}': artifact does not match the registry record")]
    ChecksumMismatch { plugin: String },

    #[error("signature verification failed for '{plugin}': {reason}")]
    SignatureInvalid { plugin: String, reason: String },

    #[error("validation of '{0}' timed out")]
    Timeout(String),

    #[error("validation of '{0}' was cancelled")]
    Cancelled(String),

    #[error("could not read artifact for '{plugin}': {reason}")]
    Artifact { plugin: String, reason: String },
}
