//! Show command - display one cache entry

use crate::cache::EntryStore;
use crate::cli::args::ShowArgs;
use crate::cli::commands::list::{format_age, format_size};
use crate::config::Config;
use crate::error::{OnceAgainError, OnceAgainResult};
use crate::ui::{self, UiContext};
use chrono::{DateTime, Utc};
use console::style;
use std::fs;

/// Execute the show command
pub async fn execute(args: ShowArgs, config: &Config) -> OnceAgainResult<()> {
    let store = EntryStore::new(&config.cache.root);
    let path = store.locate(&args.entry);
    let entry = store.inspect(&path)?;

    let meta = fs::metadata(&path)
        .map_err(|e| OnceAgainError::io(format!("reading metadata of {}", path.display()), e))?;
    let modified = store.last_modified(&path)?;
    let age = Utc::now() - DateTime::<Utc>::from(modified);

    let ctx = UiContext::detect();
    ui::section(&ctx, &entry.qualified_name);
    ui::key_value(&ctx, "File", &path.display().to_string());
    ui::key_value(&ctx, "Version", &entry.version);
    ui::key_value(
        &ctx,
        "Created",
        &entry.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    ui::key_value(&ctx, "Age", &format_age(age));
    ui::key_value(&ctx, "Size", &format_size(meta.len()));

    println!();
    println!("{}", style("Arguments").bold());
    if entry.positional.is_empty() && entry.keyword.is_empty() {
        println!("  {}", style("(none)").dim());
    }
    for (i, value) in entry.positional.iter().enumerate() {
        println!("  {} {}", style(format!("[{}]", i)).dim(), value);
    }
    for (key, value) in &entry.keyword {
        println!("  {} {}", style(format!("{}=", key)).dim(), value);
    }

    println!();
    println!("{}", style("Result").bold());
    println!("{}", serde_json::to_string_pretty(&entry.result)?);

    Ok(())
}
