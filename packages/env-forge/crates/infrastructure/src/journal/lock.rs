use super::operation::JournalError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Cross-process guard for journal mutations. The lock file is created
/// with `create_new`, so exactly one process holds it at a time; it is
/// removed again on drop.
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    pub fn acquire(path: PathBuf) -> Result<Self, JournalError> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = write!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder =
                    std::fs::read_to_string(&path).unwrap_or_else(|_| "unknown".to_string());
                Err(JournalError::Locked(format!("pid {holder}")))
            }
            Err(err) => Err(JournalError::Io(err)),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
