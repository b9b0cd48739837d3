//! Command-line interface for the once-again binary

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
