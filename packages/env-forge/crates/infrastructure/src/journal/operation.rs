use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Init,
    Install,
    Remove,
    ConfigEdit,
    Undo,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::Init => "init",
            OperationKind::Install => "install",
            OperationKind::Remove => "remove",
            OperationKind::ConfigEdit => "config-edit",
            OperationKind::Undo => "undo",
        };
        f.write_str(s)
    }
}

/// A recorded, reversible unit of state mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub id: Uuid,
    pub kind: OperationKind,
    pub timestamp: DateTime<Utc>,
    pub target: String,
    pub description: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Snapshot taken before the mutation; without one the operation
    /// cannot be undone.
    #[serde(default)]
    pub backup_id: Option<String>,

    /// Whether the governed mutation finished.
    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub undone: bool,

    #[serde(default)]
    pub undo_risks: Vec<String>,
}

impl Operation {
    pub fn is_undoable(&self) -> bool {
        self.backup_id.is_some() && !self.undone
    }

    /// First hex characters of the id, enough to name an operation in
    /// reports and to address it from the command line.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("journal I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt journal entry: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("journal is locked by another process ({0})")]
    Locked(String),

    #[error("no operation with id {0}")]
    UnknownOperation(Uuid),
}

/// Undo failures are hard errors, surfaced to the caller verbatim: the
/// user asked for a corrective state change, and a silent no-op would be
/// worse than failing.
#[derive(Error, Debug)]
pub enum UndoError {
    #[error("nothing to undo")]
    NothingToUndo,

    #[error("no operation matches id '{0}'")]
    UnknownId(String),

    #[error("id '{0}' is ambiguous: it matches {1} operations")]
    AmbiguousId(String, usize),

    #[error("operation {0} has no backup to restore from")]
    NoBackup(String),

    #[error("backup {0} could not be read: {1}")]
    CorruptBackup(String, String),

    #[error("operation {0} was already undone")]
    AlreadyUndone(String),

    #[error("operation {0} is not the most recent mutation; pass force to undo it anyway")]
    NotLatest(String),

    #[error("restore failed: {0}")]
    RestoreFailed(String),

    #[error(transparent)]
    Journal(#[from] JournalError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoResult {
    pub operation_id: Uuid,
    /// Backup the configuration was restored from.
    pub restored_from: String,
    /// Fresh pre-undo snapshot; restoring it reverses the undo.
    pub new_backup_id: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoSummary {
    pub total_operations: usize,
    pub undoable: usize,
    pub undone: usize,
    pub last_operation: Option<String>,
}
