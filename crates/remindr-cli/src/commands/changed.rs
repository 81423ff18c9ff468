use clap::Subcommand;
use remindr_core::ReminderStore;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum ChangedAction {
    /// Print whether reminders changed since the last clear
    Check,
    /// Reset the changed flag
    Clear,
}

pub fn run(action: ChangedAction) -> CliResult {
    let store = ReminderStore::open()?;
    match action {
        ChangedAction::Check => {
            print_json(&serde_json::json!({ "changed": store.is_dirty()? }))?;
        }
        ChangedAction::Clear => {
            store.clear_dirty()?;
            print_json(&serde_json::json!({ "changed": false }))?;
        }
    }
    Ok(())
}
