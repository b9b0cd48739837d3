//! Clear command - remove cache entries

use crate::cache::{EntryStore, StoredEntry};
use crate::cli::args::ClearArgs;
use crate::config::Config;
use crate::error::OnceAgainResult;
use crate::ui::{self, UiContext};
use console::style;
use tracing::debug;

/// Execute the clear command
pub async fn execute(args: ClearArgs, config: &Config) -> OnceAgainResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let store = EntryStore::new(&config.cache.root);

    let targets = select(store.list()?, args.name.as_deref());
    if targets.is_empty() {
        ui::step_info(&ctx, "No cache entries to clear");
        return Ok(());
    }

    println!("This will remove {} cache entr(ies):", targets.len());
    for entry in &targets {
        println!("  {} {}", style("•").red(), entry.file_name());
    }
    println!();

    if !ui::confirm(&ctx, "Remove these entries?", false).await? {
        ui::step_warn(&ctx, "Aborted, nothing removed");
        return Ok(());
    }

    let mut removed = 0;
    for entry in &targets {
        debug!("Removing cache entry {}", entry.path.display());
        if store.remove(&entry.path)? {
            removed += 1;
        }
    }

    ui::step_ok(&ctx, &format!("Removed {} cache entr(ies)", removed));
    Ok(())
}

fn select(entries: Vec<StoredEntry>, name: Option<&str>) -> Vec<StoredEntry> {
    match name {
        Some(name) => {
            let stored = EntryStore::stored_name(name);
            entries
                .into_iter()
                .filter(|e| e.qualified_name == stored)
                .collect()
        }
        None => entries,
    }
}
