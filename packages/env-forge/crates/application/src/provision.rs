use anyhow::{bail, Result};
use domain::entities::app::AppDescriptor;
use domain::ports::AppRepository;
use infrastructure::journal::{MutationJournal, OperationKind};
use infrastructure::VersionStore;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::validation::PluginValidationService;
use tokio_util::sync::CancellationToken;

/// Drives the install flow: validate the plugins an app requires, then
/// mutate the app repository under journal governance.
pub struct ProvisionService {
    apps: Arc<dyn AppRepository>,
    validation: PluginValidationService,
    journal: Arc<MutationJournal>,
    versions: Arc<VersionStore>,
}

impl ProvisionService {
    pub fn new(
        apps: Arc<dyn AppRepository>,
        validation: PluginValidationService,
        journal: Arc<MutationJournal>,
        versions: Arc<VersionStore>,
    ) -> Self {
        Self {
            apps,
            validation,
            journal,
            versions,
        }
    }

    /// Install `app`. Required plugins are validated first; an invalid
    /// plugin aborts the install before any state changes.
    pub async fn install_app(
        &self,
        app: &AppDescriptor,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !app.plugins.is_empty() {
            let summary = self.validation.validate_plugins(&app.plugins, cancel).await?;
            if !summary.all_valid() {
                bail!(
                    "cannot install {}: {} of {} required plugin(s) failed validation:\n  {}",
                    app.name,
                    summary.invalid_plugins.max(summary.critical_failures),
                    summary.total_plugins,
                    summary.errors.join("\n  ")
                );
            }
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("app".to_string(), json!(app.name));
        metadata.insert("plugins".to_string(), json!(app.plugins));
        let operation = self.journal.record_operation(
            OperationKind::Install,
            format!("install {}", app.name),
            &app.name,
            metadata,
            &app.config_files,
        );

        self.apps.upsert_app(app)?;

        if let Some(op) = &operation {
            self.journal.update_operation(&op.id);
        }
        if let Err(err) = self.versions.append(
            format!("install {}", app.name),
            vec![format!("added app {}", app.name)],
        ) {
            warn!(app = %app.name, error = %err, "could not append version history");
        }

        info!(app = %app.name, "installed");
        Ok(())
    }
}
