use anyhow::{bail, Result};
use clap::Parser;
use domain::conflicts::{Conflict, RemovalPolicy, Severity};

use crate::core::context::CliContext;
use application::RemovalError;

#[derive(Parser, Debug)]
pub struct RemoveCommand {
    /// App to remove
    pub name: String,

    /// Also remove apps that depend on this one, dependents first
    #[arg(long)]
    pub cascade: bool,

    /// Stop the app's active services instead of aborting
    #[arg(long)]
    pub stop_services: bool,

    /// Keep config files under shared locations in place
    #[arg(long)]
    pub keep_config: bool,

    /// Override critical conflicts (dangerous)
    #[arg(long)]
    pub force: bool,
}

impl RemoveCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let policy = RemovalPolicy {
            cascade: self.cascade,
            stop_services: self.stop_services,
            keep_config: self.keep_config,
            force: self.force,
        };

        match ctx.removal_service().remove(&self.name, policy) {
            Ok(outcome) => {
                for app in &outcome.removed {
                    println!("{} removed {}", console::style("✓").green().bold(), app);
                }
                for conflict in &outcome.forced_conflicts {
                    println!(
                        "{} forced past: {}",
                        console::style("!").red().bold(),
                        conflict.description
                    );
                }
                for warning in &outcome.warnings {
                    println!("{} {}", console::style("warning:").yellow(), warning);
                }
                Ok(())
            }
            Err(RemovalError::Blocked { app, conflicts }) => {
                render_conflicts(&conflicts);
                bail!(
                    "aborted: removal of '{}' is blocked by {} conflict(s)",
                    app,
                    conflicts.len()
                )
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// One line per conflict with its remediation, grouped by severity.
fn render_conflicts(conflicts: &[Conflict]) {
    let mut ordered: Vec<&Conflict> = conflicts.iter().collect();
    ordered.sort_by_key(|c| c.severity);

    for conflict in ordered {
        let badge = match conflict.severity {
            Severity::Critical => console::style("critical").red().bold(),
            Severity::Warning => console::style("warning ").yellow(),
            Severity::Info => console::style("info    ").dim(),
        };
        println!(
            "  {} [{}] {}\n           {}",
            badge,
            conflict.kind,
            conflict.description,
            console::style(&conflict.resolution).dim()
        );
    }
}
