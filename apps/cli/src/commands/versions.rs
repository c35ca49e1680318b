use anyhow::Result;
use clap::Parser;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use crate::core::context::CliContext;

#[derive(Parser, Debug)]
pub struct VersionsCommand {
    /// Most recent versions to show
    #[arg(long, short, default_value_t = 20)]
    pub limit: usize,
}

impl VersionsCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let mut versions = ctx.versions.list()?;
        versions.reverse();
        versions.truncate(self.limit);

        if versions.is_empty() {
            println!("No versions recorded yet.");
            return Ok(());
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["Version", "When", "Message", "Changes"]);
        for version in &versions {
            table.add_row(vec![
                format!("v{}", version.id),
                version.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                version.message.clone(),
                version.changes.join("; "),
            ]);
        }
        println!("{table}");
        Ok(())
    }
}
