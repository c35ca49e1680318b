use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-user state root owning everything env-forge persists: the app
/// repository, plugin metadata, the mutation journal, backups and the
/// version history.
#[derive(Debug, Clone)]
pub struct StateRoot {
    root: PathBuf,
}

impl StateRoot {
    pub fn at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory {}", root.display()))?;
        Ok(Self { root })
    }

    /// Default per-user location, e.g. `~/.local/share/env-forge` on Linux.
    pub fn default_location() -> Result<Self> {
        let base = dirs::data_local_dir().context("could not determine the user data directory")?;
        Self::at(base.join("env-forge"))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn journal_file(&self) -> PathBuf {
        self.root.join("journal.jsonl")
    }

    pub fn versions_file(&self) -> PathBuf {
        self.root.join("versions.json")
    }

    pub fn apps_file(&self) -> PathBuf {
        self.root.join("apps.json")
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("plugins")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join("journal.lock")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }
}

/// Write via a sibling temp file and rename, so readers never observe a
/// half-written state file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
