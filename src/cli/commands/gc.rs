//! Gc command - remove expired and unreadable cache entries

use crate::cache::{EntryStore, StoredEntry};
use crate::cli::args::GcArgs;
use crate::config::Config;
use crate::error::{OnceAgainError, OnceAgainResult};
use crate::ui::{self, UiContext};
use console::style;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Why an entry is collected
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reason {
    Expired,
    Unreadable(String),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::Unreadable(reason) => write!(f, "unreadable: {}", reason),
        }
    }
}

/// Execute the gc command
pub async fn execute(args: GcArgs, config: &Config) -> OnceAgainResult<()> {
    let ctx = UiContext::detect();
    let store = EntryStore::new(&config.cache.root);

    let max_age = match args.older_than {
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.cache.ttl(),
    };
    let max_age = max_age
        .map(chrono::Duration::from_std)
        .transpose()
        .map_err(|e| OnceAgainError::User(format!("Age limit out of range: {}", e)))?;

    let mut doomed = vec![];
    for entry in store.list()? {
        if let Some(reason) = collect_reason(&store, &entry, max_age)? {
            doomed.push((entry, reason));
        }
    }

    if doomed.is_empty() {
        ui::step_info(&ctx, "No expired or unreadable cache entries");
        return Ok(());
    }

    println!("Found {} cache entr(ies) to remove:", doomed.len());
    for (entry, reason) in &doomed {
        println!(
            "  {} {} ({})",
            style("•").red(),
            entry.file_name(),
            style(reason).dim()
        );
    }

    if args.dry_run {
        println!();
        println!("Dry run - no entries removed.");
        return Ok(());
    }

    let mut removed = 0;
    for (entry, _) in &doomed {
        debug!("Removing cache entry {}", entry.path.display());
        if store.remove(&entry.path)? {
            removed += 1;
        }
    }

    println!();
    ui::step_ok(&ctx, &format!("Removed {} cache entr(ies)", removed));
    Ok(())
}

fn collect_reason(
    store: &EntryStore,
    entry: &StoredEntry,
    max_age: Option<chrono::Duration>,
) -> OnceAgainResult<Option<Reason>> {
    match store.inspect(&entry.path) {
        Ok(_) => {}
        Err(OnceAgainError::CorruptEntry { reason, .. }) => {
            return Ok(Some(Reason::Unreadable(reason)))
        }
        // Removed by someone else since listing
        Err(OnceAgainError::EntryNotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    }

    Ok(match max_age {
        Some(max_age) if entry.is_older_than(max_age) => Some(Reason::Expired),
        _ => None,
    })
}
