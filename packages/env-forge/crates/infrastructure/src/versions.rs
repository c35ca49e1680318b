use crate::state::write_atomic;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// An immutable checkpoint of configuration history.
///
/// Ids are strictly monotonic. The history is durable and independent of
/// undo state: undoing an operation never rewrites the versions that
/// operation produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Version {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub changes: Vec<String>,
}

/// Append-only changelog store backed by a single JSON file.
pub struct VersionStore {
    file: PathBuf,
}

impl VersionStore {
    pub fn new(file: PathBuf) -> Self {
        Self { file }
    }

    pub fn append(&self, message: impl Into<String>, changes: Vec<String>) -> Result<Version> {
        let mut versions = self.list()?;
        let id = versions.last().map(|v| v.id + 1).unwrap_or(1);

        let version = Version {
            id,
            timestamp: Utc::now(),
            message: message.into(),
            changes,
        };
        versions.push(version.clone());

        let raw = serde_json::to_vec_pretty(&versions)?;
        write_atomic(&self.file, &raw)
            .with_context(|| format!("failed to write {}", self.file.display()))?;

        debug!(version = id, "version recorded");
        Ok(version)
    }

    pub fn list(&self) -> Result<Vec<Version>> {
        if !self.file.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("corrupt version history {}", self.file.display()))
    }

    pub fn latest(&self) -> Result<Option<Version>> {
        Ok(self.list()?.into_iter().last())
    }
}
