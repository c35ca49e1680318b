//! The mutation journal: an append-only record of every state mutation
//! with enough metadata to undo it. Recording is best-effort; undo is
//! all-or-nothing.

mod lock;
mod operation;

pub use lock::StateLock;
pub use operation::{
    JournalError, Operation, OperationKind, UndoError, UndoResult, UndoSummary,
};

use crate::backup::BackupManager;
use crate::state::{write_atomic, StateRoot};
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

pub struct MutationJournal {
    file: PathBuf,
    lock_path: PathBuf,
    backups: BackupManager,
}

impl MutationJournal {
    pub fn open(root: &StateRoot) -> Result<Self> {
        Ok(Self {
            file: root.journal_file(),
            lock_path: root.lock_file(),
            backups: BackupManager::new(root.backups_dir())?,
        })
    }

    // --- write path ---

    /// Record a mutation about to happen, snapshotting `paths` first.
    ///
    /// Best-effort by design: losing undo metadata must never block the
    /// user's primary action, so every failure is logged as a warning
    /// and `None` returned.
    pub fn record_operation(
        &self,
        kind: OperationKind,
        description: impl Into<String>,
        target: &str,
        metadata: BTreeMap<String, Value>,
        paths: &[PathBuf],
    ) -> Option<Operation> {
        match self.try_record(kind, description.into(), target, metadata, paths) {
            Ok(op) => Some(op),
            Err(err) => {
                warn!(target = %target, error = %err, "could not record operation; continuing without undo metadata");
                None
            }
        }
    }

    fn try_record(
        &self,
        kind: OperationKind,
        description: String,
        target: &str,
        metadata: BTreeMap<String, Value>,
        paths: &[PathBuf],
    ) -> Result<Operation, JournalError> {
        let _lock = StateLock::acquire(self.lock_path.clone())?;

        let (backup_id, undo_risks) = match self.backups.snapshot(target, paths) {
            Ok(backup) => (Some(backup.id), Vec::new()),
            Err(err) => {
                warn!(target = %target, error = %err, "snapshot failed; operation will not be undoable");
                (None, vec![format!("no backup captured: {err}")])
            }
        };

        let op = Operation {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            target: target.to_string(),
            description,
            metadata,
            backup_id,
            completed: false,
            undone: false,
            undo_risks,
        };
        self.append_entry(&op)?;
        info!(operation = %op.short_id(), kind = %op.kind, target = %target, "operation recorded");
        Ok(op)
    }

    /// Mark an operation's governed mutation as completed. Best-effort,
    /// like recording.
    pub fn update_operation(&self, id: &Uuid) {
        let result = self.mutate_entry(id, |op| op.completed = true);
        if let Err(err) = result {
            warn!(operation = %id, error = %err, "could not mark operation completed");
        }
    }

    // --- read path ---

    pub fn load_operations(&self) -> Result<Vec<Operation>, JournalError> {
        if !self.file.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.file)?;
        let mut ops = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            ops.push(serde_json::from_str(line)?);
        }
        Ok(ops)
    }

    pub fn get_operation_details(&self, id: &Uuid) -> Result<Option<Operation>, JournalError> {
        Ok(self.load_operations()?.into_iter().find(|op| &op.id == id))
    }

    /// Undoable operations, most recent first.
    pub fn get_undoable_operations(&self, limit: usize) -> Result<Vec<Operation>, JournalError> {
        Ok(self
            .load_operations()?
            .into_iter()
            .rev()
            .filter(Operation::is_undoable)
            .take(limit)
            .collect())
    }

    pub fn can_undo(&self) -> bool {
        self.get_undoable_operations(1)
            .map(|ops| !ops.is_empty())
            .unwrap_or(false)
    }

    /// Aggregate journal status. A pure read: calling it twice without an
    /// intervening mutation returns identical counts.
    pub fn get_undo_summary(&self) -> Result<UndoSummary, JournalError> {
        let ops = self.load_operations()?;
        Ok(UndoSummary {
            total_operations: ops.len(),
            undoable: ops.iter().filter(|op| op.is_undoable()).count(),
            undone: ops.iter().filter(|op| op.undone).count(),
            last_operation: ops.last().map(|op| op.description.clone()),
        })
    }

    // --- undo ---

    pub fn undo_last(&self, force: bool) -> Result<UndoResult, UndoError> {
        let target = self
            .get_undoable_operations(1)?
            .into_iter()
            .next()
            .ok_or(UndoError::NothingToUndo)?;
        self.undo_resolved(target.id, force)
    }

    /// Undo by id, accepting any unambiguous prefix of the hex form.
    pub fn undo_operation(&self, id_prefix: &str, force: bool) -> Result<UndoResult, UndoError> {
        let needle = id_prefix.trim().to_lowercase().replace('-', "");
        if needle.is_empty() {
            return Err(UndoError::UnknownId(id_prefix.to_string()));
        }

        let ops = self.load_operations()?;
        let matches: Vec<&Operation> = ops
            .iter()
            .filter(|op| op.id.simple().to_string().starts_with(&needle))
            .collect();

        match matches.len() {
            0 => Err(UndoError::UnknownId(id_prefix.to_string())),
            1 => self.undo_resolved(matches[0].id, force),
            n => Err(UndoError::AmbiguousId(id_prefix.to_string(), n)),
        }
    }

    /// The undo protocol: verify the operation can be undone, snapshot
    /// current state as a fresh safety net, restore the original backup
    /// fully (reverting on partial failure), mark the operation undone
    /// and record the undo itself as a new operation.
    fn undo_resolved(&self, id: Uuid, force: bool) -> Result<UndoResult, UndoError> {
        let _lock = StateLock::acquire(self.lock_path.clone()).map_err(UndoError::Journal)?;

        let ops = self.load_operations()?;
        let position = ops
            .iter()
            .position(|op| op.id == id)
            .ok_or_else(|| UndoError::UnknownId(id.to_string()))?;
        let op = ops[position].clone();

        if op.undone {
            return Err(UndoError::AlreadyUndone(op.short_id()));
        }
        let backup_id = op
            .backup_id
            .clone()
            .ok_or_else(|| UndoError::NoBackup(op.short_id()))?;
        if !self.backups.exists(&backup_id) {
            return Err(UndoError::NoBackup(op.short_id()));
        }

        let mut warnings: Vec<String> = op
            .undo_risks
            .iter()
            .map(|risk| format!("{}: {}", op.short_id(), risk))
            .collect();

        // Undoing anything but the latest mutation can clash with the
        // operations that came after it.
        let newer: Vec<&Operation> = ops[position + 1..]
            .iter()
            .filter(|other| !other.undone)
            .collect();
        if !newer.is_empty() {
            if !force {
                return Err(UndoError::NotLatest(op.short_id()));
            }
            for other in &newer {
                warnings.push(format!(
                    "newer operation {} ({}) may conflict with this undo",
                    other.short_id(),
                    other.description
                ));
            }
        }

        let original = self
            .backups
            .load(&backup_id)
            .map_err(|err| UndoError::CorruptBackup(backup_id.clone(), err.to_string()))?;

        // Pre-undo safety net over the same paths, as they are now.
        let paths = BackupManager::paths_of(&original);
        let pre_undo = self
            .backups
            .snapshot(&op.target, &paths)
            .map_err(|err| UndoError::RestoreFailed(format!("pre-undo snapshot failed: {err}")))?;

        if let Err(err) = self.backups.restore(&original) {
            // Roll the partial restore back so state is never left torn.
            match self.backups.restore(&pre_undo) {
                Ok(()) => return Err(UndoError::RestoreFailed(err.to_string())),
                Err(revert_err) => {
                    return Err(UndoError::RestoreFailed(format!(
                        "{err}; reverting the partial restore also failed: {revert_err}"
                    )))
                }
            }
        }

        let mut ops = ops;
        ops[position].undone = true;

        let mut metadata = BTreeMap::new();
        metadata.insert("undoes".to_string(), Value::String(op.id.to_string()));
        let undo_op = Operation {
            id: Uuid::new_v4(),
            kind: OperationKind::Undo,
            timestamp: Utc::now(),
            target: op.target.clone(),
            description: format!("undo of '{}' ({})", op.description, op.short_id()),
            metadata,
            backup_id: Some(pre_undo.id.clone()),
            completed: true,
            undone: false,
            undo_risks: Vec::new(),
        };
        ops.push(undo_op);
        self.write_all(&ops)?;

        info!(operation = %op.short_id(), restored_from = %backup_id, "undo complete");
        Ok(UndoResult {
            operation_id: op.id,
            restored_from: backup_id,
            new_backup_id: pre_undo.id,
            warnings,
        })
    }

    // --- storage ---

    fn append_entry(&self, op: &Operation) -> Result<(), JournalError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file)?;
        let line = serde_json::to_string(op)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn mutate_entry(
        &self,
        id: &Uuid,
        mutate: impl FnOnce(&mut Operation),
    ) -> Result<(), JournalError> {
        let _lock = StateLock::acquire(self.lock_path.clone())?;
        let mut ops = self.load_operations()?;
        let op = ops
            .iter_mut()
            .find(|op| &op.id == id)
            .ok_or(JournalError::UnknownOperation(*id))?;
        mutate(op);
        self.write_all(&ops)
    }

    fn write_all(&self, ops: &[Operation]) -> Result<(), JournalError> {
        let mut raw = String::new();
        for op in ops {
            raw.push_str(&serde_json::to_string(op)?);
            raw.push('\n');
        }
        write_atomic(&self.file, raw.as_bytes())?;
        Ok(())
    }

}
