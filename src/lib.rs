//! once-again - reproducible function calls
//!
//! Memoizes results of deterministic computations on disk. A call is keyed
//! by the callable's qualified name and a fingerprint of its canonicalized
//! arguments; a later call with equal arguments returns the stored result
//! without running the computation again.
//!
//! ```rust,ignore
//! use once_again::{Function, Memo};
//!
//! fn f(args: &(i64, i64), kw: &[(&str, i64); 2]) -> Result<i64, once_again::OnceAgainError> {
//!     Ok(args.0 * args.1 + kw[0].1 * kw[1].1)
//! }
//!
//! let memo = Memo::new("cache");
//! let result = memo.call(&Function::new(f), &(10, 20), &[("c", 30), ("d", 4)])?;
//! assert_eq!(result, 320);
//! ```

pub mod cache;
pub mod callable;
pub mod cli;
pub mod config;
pub mod error;
pub mod memo;
pub mod ui;

pub use cache::{Canonical, CanonicalArgs, Keywords, Positional};
pub use callable::{
    Callable, CallableIdentity, CallableKind, ClassMethod, Function, Method, Resolved,
    StaticMethod,
};
pub use error::{OnceAgainError, OnceAgainResult};
pub use memo::Memo;
