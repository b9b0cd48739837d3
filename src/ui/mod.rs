//! Terminal output for the once-again binary
//!
//! Styled steps via `cliclack` on a terminal, plain `[OK]`/`[WARN]` lines
//! when piped or running in CI.

mod context;
mod output;
mod prompts;

pub use context::UiContext;
pub use output::{
    key_value, section, step_info, step_ok, step_ok_detail, step_warn, step_warn_hint,
};
pub use prompts::confirm;
