use crate::state::{write_atomic, StateRoot};
use domain::entities::app::AppDescriptor;
use domain::ports::{AppRepository, PortError};
use std::fs;
use std::path::PathBuf;

/// Installed-app records persisted as pretty JSON under the state root.
pub struct StateFileAppRepository {
    file: PathBuf,
}

impl StateFileAppRepository {
    pub fn new(root: &StateRoot) -> Self {
        Self {
            file: root.apps_file(),
        }
    }

    fn load(&self) -> Result<Vec<AppDescriptor>, PortError> {
        if !self.file.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.file)?;
        serde_json::from_str(&raw)
            .map_err(|err| PortError::Corrupt(format!("{}: {err}", self.file.display())))
    }

    fn store(&self, apps: &[AppDescriptor]) -> Result<(), PortError> {
        let raw = serde_json::to_vec_pretty(apps)
            .map_err(|err| PortError::Corrupt(err.to_string()))?;
        write_atomic(&self.file, &raw)?;
        Ok(())
    }
}

impl AppRepository for StateFileAppRepository {
    fn get_app(&self, name: &str) -> Result<Option<AppDescriptor>, PortError> {
        Ok(self.load()?.into_iter().find(|app| app.name == name))
    }

    fn list_apps(&self) -> Result<Vec<AppDescriptor>, PortError> {
        self.load()
    }

    fn upsert_app(&self, app: &AppDescriptor) -> Result<(), PortError> {
        let mut apps = self.load()?;
        match apps.iter_mut().find(|a| a.name == app.name) {
            Some(existing) => *existing = app.clone(),
            None => apps.push(app.clone()),
        }
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        self.store(&apps)
    }

    fn remove_app(&self, name: &str) -> Result<(), PortError> {
        let mut apps = self.load()?;
        apps.retain(|a| a.name != name);
        self.store(&apps)
    }
}
