//! List command - show cache entries

use crate::cache::{EntryStore, StoredEntry};
use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::Config;
use crate::error::OnceAgainResult;
use crate::ui::{self, UiContext};
use chrono::{Duration, Utc};
use console::style;

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> OnceAgainResult<()> {
    let store = EntryStore::new(&config.cache.root);
    let entries = store.list()?;

    if entries.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(
                    &ctx,
                    &format!("No cache entries in {}", store.root().display()),
                );
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => print_plain(&entries),
    }

    Ok(())
}

fn print_table(entries: &[StoredEntry]) {
    let width = entries
        .iter()
        .map(|e| e.qualified_name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    println!(
        "{:<width$} {:<16} {:>10} {:>8}",
        style("NAME").bold(),
        style("KEY").bold(),
        style("SIZE").bold(),
        style("AGE").bold(),
        width = width
    );
    println!("{}", "-".repeat(width + 37));

    let mut total = 0;
    for entry in entries {
        total += entry.size;
        println!(
            "{:<width$} {:<16} {:>10} {:>8}",
            entry.qualified_name,
            style(entry.key.as_str()).dim(),
            format_size(entry.size),
            format_age(Utc::now() - entry.modified),
            width = width
        );
    }

    println!();
    println!("{} entr(ies), {}", entries.len(), format_size(total));
}

fn print_json(entries: &[StoredEntry]) -> OnceAgainResult<()> {
    #[derive(serde::Serialize)]
    struct EntryJson {
        file: String,
        qualified_name: String,
        key: String,
        size: u64,
        modified: String,
    }

    let json_entries: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            file: e.path.display().to_string(),
            qualified_name: e.qualified_name.clone(),
            key: e.key.to_string(),
            size: e.size,
            modified: e.modified.to_rfc3339(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_entries)?);
    Ok(())
}

fn print_plain(entries: &[StoredEntry]) {
    for entry in entries {
        println!("{}", entry.file_name());
    }
}

/// Compact age such as `45s`, `12m`, `3h` or `8d`
pub(crate) fn format_age(age: Duration) -> String {
    let secs = age.num_seconds().max(0);
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86400),
    }
}

/// Human-readable byte count
pub(crate) fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    match bytes {
        b if b >= MIB => format!("{:.1} MiB", b as f64 / MIB as f64),
        b if b >= KIB => format!("{:.1} KiB", b as f64 / KIB as f64),
        b => format!("{} B", b),
    }
}
