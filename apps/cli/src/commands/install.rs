use anyhow::{Context, Result};
use clap::Parser;
use domain::entities::app::AppDescriptor;
use std::path::PathBuf;

use crate::commands::spinner;
use crate::core::context::CliContext;

#[derive(Parser, Debug)]
pub struct InstallCommand {
    /// Path to the app manifest (JSON)
    #[arg(long, short, default_value = "app.json")]
    pub manifest: PathBuf,

    /// Count failed checksums/signatures as warnings instead of failures
    #[arg(long)]
    pub allow_insecure: bool,
}

impl InstallCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let raw = std::fs::read_to_string(&self.manifest)
            .with_context(|| format!("failed to read manifest {}", self.manifest.display()))?;
        let app: AppDescriptor = serde_json::from_str(&raw)
            .with_context(|| format!("invalid manifest {}", self.manifest.display()))?;

        let mut config = ctx.validation_config();
        config.fail_on_critical = true;
        config.allow_insecure_plugins |= self.allow_insecure;

        let pb = spinner(format!("Validating plugins for {}...", app.name));
        let result = ctx
            .provision_service(config)
            .install_app(&app, ctx.cancellation())
            .await;
        pb.finish_and_clear();
        result?;

        println!("{} installed {}", console::style("✓").green().bold(), app.name);
        Ok(())
    }
}
