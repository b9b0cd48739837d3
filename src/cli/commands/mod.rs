//! CLI command implementations

pub mod clear;
pub mod completions;
pub mod config;
pub mod gc;
pub mod list;
pub mod show;

pub use clear::execute as clear;
pub use completions::execute as completions;
pub use config::execute as config;
pub use gc::execute as gc;
pub use list::execute as list;
pub use show::execute as show;
