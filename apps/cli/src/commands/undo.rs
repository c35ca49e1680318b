use anyhow::Result;
use clap::Parser;

use crate::core::context::CliContext;

#[derive(Parser, Debug)]
pub struct UndoCommand {
    /// Operation id (any unambiguous prefix); defaults to the most
    /// recent undoable operation
    #[arg(long)]
    pub id: Option<String>,

    /// Undo even when newer operations exist
    #[arg(long)]
    pub force: bool,
}

impl UndoCommand {
    pub async fn execute(self, ctx: &CliContext) -> Result<()> {
        let result = match &self.id {
            Some(prefix) => ctx.journal.undo_operation(prefix, self.force)?,
            None => ctx.journal.undo_last(self.force)?,
        };

        println!(
            "{} restored from backup {}",
            console::style("✓").green().bold(),
            result.restored_from
        );
        println!(
            "  pre-undo state saved as backup {} (undo this undo to get it back)",
            result.new_backup_id
        );
        for warning in &result.warnings {
            println!("{} {}", console::style("warning:").yellow(), warning);
        }
        Ok(())
    }
}
