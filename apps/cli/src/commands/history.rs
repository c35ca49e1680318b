use anyhow::Result;
use clap::Parser;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use crate::core::context::CliContext;

#[derive(Parser, Debug)]
pub struct HistoryCommand {
    /// Most recent operations to show
    #[arg(long, short, default_value_t = 10)]
    pub limit: usize,

    /// Only operations that can still be undone
    #[arg(long)]
    pub undoable: bool,
}

impl HistoryCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let ops = if self.undoable {
            ctx.journal.get_undoable_operations(self.limit)?
        } else {
            let mut all = ctx.journal.load_operations()?;
            all.reverse();
            all.truncate(self.limit);
            all
        };

        if ops.is_empty() {
            println!("No operations recorded yet.");
            return Ok(());
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["Id", "Kind", "Target", "When", "Undoable", "Description"]);
        for op in &ops {
            table.add_row(vec![
                op.short_id(),
                op.kind.to_string(),
                op.target.clone(),
                op.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                if op.is_undoable() { "yes" } else { "no" }.to_string(),
                op.description.clone(),
            ]);
        }
        println!("{table}");

        let summary = ctx.journal.get_undo_summary()?;
        println!(
            "{} operation(s) total, {} undoable, {} undone",
            summary.total_operations, summary.undoable, summary.undone
        );
        Ok(())
    }
}
