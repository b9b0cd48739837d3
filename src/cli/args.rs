//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// once-again - inspect and maintain a result cache
///
/// Entries are written by programs using the once_again library; this tool
/// lists, shows and prunes them.
#[derive(Parser, Debug)]
#[command(name = "once-again")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ONCE_AGAIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .once-again.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Cache directory (overrides cache.root)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List cache entries
    List(ListArgs),

    /// Show one cache entry
    ///
    /// Fails with "Corrupt cache entry" when the file is not valid JSON or was
    /// written by another format version. `gc` removes such entries.
    Show(ShowArgs),

    /// Remove cache entries
    Clear(ClearArgs),

    /// Remove expired and unreadable entries
    ///
    /// Unreadable entries are the ones `show` reports as corrupt. They are
    /// removed regardless of age.
    Gc(GcArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Entry file name (extension optional) or path
    pub entry: String,
}

/// Arguments for the clear command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Only remove entries of this qualified name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the gc command
#[derive(Parser, Debug)]
pub struct GcArgs {
    /// Remove entries older than N seconds (default: cache.ttl_secs)
    #[arg(long)]
    pub older_than: Option<u64>,

    /// Dry run - show what would be removed
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}

/// Output format for list command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
