use anyhow::{bail, Result};
use clap::Parser;

use crate::commands::spinner;
use crate::core::context::CliContext;

#[derive(Parser, Debug)]
pub struct ValidateCommand {
    /// Plugins to validate; the report keeps this order
    #[arg(required = true)]
    pub plugins: Vec<String>,

    /// Abort on the first failed critical plugin
    #[arg(long)]
    pub fail_on_critical: bool,

    /// Count failed checksums/signatures as warnings instead of failures
    #[arg(long)]
    pub allow_insecure: bool,

    /// Skip checksum verification
    #[arg(long)]
    pub no_checksums: bool,

    /// Skip signature verification
    #[arg(long)]
    pub no_signatures: bool,

    /// Worker pool size for non-critical plugins
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl ValidateCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let mut config = ctx.validation_config();
        config.fail_on_critical = self.fail_on_critical;
        config.allow_insecure_plugins |= self.allow_insecure;
        config.verify_checksums = !self.no_checksums;
        config.verify_signatures = !self.no_signatures;
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency.max(1);
        }

        let service = ctx.validation_service(config);
        let pb = spinner(format!("Validating {} plugin(s)...", self.plugins.len()));
        let summary = service
            .validate_plugins(&self.plugins, ctx.cancellation())
            .await?;
        pb.finish_and_clear();

        for result in &summary.results {
            let mark = if result.is_valid {
                console::style("✓").green().bold()
            } else {
                console::style("✗").red().bold()
            };
            let mut flags = Vec::new();
            if !result.checksum_valid {
                flags.push("checksum");
            }
            if !result.signature_valid {
                flags.push("signature");
            }
            let suffix = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            println!(
                "{} {} ({} ms){}",
                mark,
                result.plugin,
                result.elapsed.as_millis(),
                suffix
            );
            if let Some(err) = &result.error {
                println!("    {}", console::style(err).dim());
            }
        }

        println!(
            "\n{} valid, {} invalid, {} critical failure(s) in {} ms",
            summary.valid_plugins,
            summary.invalid_plugins,
            summary.critical_failures,
            summary.elapsed.as_millis()
        );

        if !summary.all_valid() {
            bail!("{} plugin(s) failed validation", summary.invalid_plugins);
        }
        Ok(())
    }
}
