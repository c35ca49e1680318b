use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// A point-in-time snapshot of the files one operation is about to touch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Backup {
    pub id: String,
    pub target: String,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<BackupEntry>,
}

/// One snapshotted file. `stored` is relative to the backup directory;
/// a file that did not exist at snapshot time is recorded as absent so
/// restore can remove whatever the operation created there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupEntry {
    pub original: PathBuf,
    pub stored: Option<String>,
}

/// File snapshot/restore under `<state root>/backups/<id>/`.
///
/// Backups are never deleted: undo takes a fresh snapshot instead of
/// discarding old ones, so history only grows.
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create backup directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Snapshot `paths` on behalf of `target`.
    pub fn snapshot(&self, target: &str, paths: &[PathBuf]) -> Result<Backup> {
        let id = Uuid::new_v4().to_string();
        let backup_dir = self.dir.join(&id);
        fs::create_dir_all(backup_dir.join("files"))
            .with_context(|| format!("failed to create backup {}", id))?;

        let mut entries = Vec::with_capacity(paths.len());
        for (index, original) in paths.iter().enumerate() {
            if original.is_file() {
                let stored = format!("files/{index:04}");
                fs::copy(original, backup_dir.join(&stored)).with_context(|| {
                    format!("failed to snapshot {}", original.display())
                })?;
                entries.push(BackupEntry {
                    original: original.clone(),
                    stored: Some(stored),
                });
            } else {
                entries.push(BackupEntry {
                    original: original.clone(),
                    stored: None,
                });
            }
        }

        let backup = Backup {
            id,
            target: target.to_string(),
            created_at: Utc::now(),
            entries,
        };
        let manifest = serde_json::to_string_pretty(&backup)?;
        fs::write(backup_dir.join("manifest.json"), manifest)
            .with_context(|| format!("failed to write manifest for backup {}", backup.id))?;

        debug!(backup = %backup.id, target = %target, files = backup.entries.len(), "snapshot taken");
        Ok(backup)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.dir.join(id).join("manifest.json").is_file()
    }

    pub fn load(&self, id: &str) -> Result<Backup> {
        let manifest = self.dir.join(id).join("manifest.json");
        let raw = fs::read_to_string(&manifest)
            .with_context(|| format!("failed to read manifest for backup {}", id))?;
        serde_json::from_str(&raw).with_context(|| format!("corrupt manifest for backup {}", id))
    }

    /// Restore every entry to its original location. Any failure aborts
    /// with the error; callers revert using their own pre-restore
    /// snapshot, so state is never left partially restored.
    pub fn restore(&self, backup: &Backup) -> Result<()> {
        let backup_dir = self.dir.join(&backup.id);
        for entry in &backup.entries {
            match &entry.stored {
                Some(stored) => {
                    if let Some(parent) = entry.original.parent() {
                        fs::create_dir_all(parent).with_context(|| {
                            format!("failed to recreate {}", parent.display())
                        })?;
                    }
                    fs::copy(backup_dir.join(stored), &entry.original).with_context(|| {
                        format!("failed to restore {}", entry.original.display())
                    })?;
                }
                None => {
                    if entry.original.exists() {
                        fs::remove_file(&entry.original).with_context(|| {
                            format!("failed to remove {}", entry.original.display())
                        })?;
                    }
                }
            }
        }
        debug!(backup = %backup.id, "restored");
        Ok(())
    }

    pub(crate) fn paths_of(backup: &Backup) -> Vec<PathBuf> {
        backup.entries.iter().map(|e| e.original.clone()).collect()
    }
}
