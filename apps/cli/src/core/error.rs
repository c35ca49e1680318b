use application::RemovalError;
use domain::ports::PortError;
use infrastructure::journal::{JournalError, UndoError};

/// Render a top-level failure with a themed, actionable suggestion where
/// one exists.
pub fn render(err: &anyhow::Error) {
    eprintln!("\n{} {}", console::style("Error:").red().bold(), err);
    for cause in err.chain().skip(1) {
        eprintln!("{} {}", console::style("  cause:").dim(), cause);
    }
    if let Some(s) = suggestion(err) {
        eprintln!("{} {}", console::style("  help:").dim(), s);
    }
}

fn suggestion(err: &anyhow::Error) -> Option<String> {
    if let Some(removal) = err.downcast_ref::<RemovalError>() {
        return match removal {
            RemovalError::Blocked { .. } => Some(
                "Resolve the listed conflicts, pass a matching policy flag, or use --force."
                    .to_string(),
            ),
            RemovalError::NotInstalled(_) => {
                Some("Run 'env-forge history' to see what is installed.".to_string())
            }
            _ => None,
        };
    }

    if let Some(undo) = err.downcast_ref::<UndoError>() {
        return match undo {
            UndoError::NotLatest(_) => {
                Some("Pass --force to undo past newer operations.".to_string())
            }
            UndoError::AmbiguousId(..) => {
                Some("Use more characters of the id shown by 'env-forge history'.".to_string())
            }
            UndoError::NothingToUndo | UndoError::NoBackup(_) => {
                Some("Only journaled operations with a backup can be undone.".to_string())
            }
            _ => None,
        };
    }

    if let Some(journal) = err.downcast_ref::<JournalError>() {
        if matches!(journal, JournalError::Locked(_)) {
            return Some("Another env-forge process is mutating state; retry shortly.".to_string());
        }
    }

    if let Some(port) = err.downcast_ref::<PortError>() {
        if matches!(port, PortError::Corrupt(_)) {
            return Some("A state file is corrupt; restore it from a backup.".to_string());
        }
    }

    None
}
