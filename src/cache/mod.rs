//! Persistent result cache
//!
//! Results are content-addressed by the canonical form of the call arguments.
//!
//! # Lookup
//!
//! - Arguments rendered to canonical text (receiver first for bound callables)
//! - Text hashed with SHA256, last 16 hex chars used as the key
//! - Entry file `{qualified_name}.{key}.cache` under the cache root
//! - Stored arguments compared exactly before a result is reused
//!
//! Results holding NaN or infinite floats are returned but never stored.
//!
//! # Entry States
//!
//! | State | Action |
//! |-------|--------|
//! | Missing | invoke, store |
//! | Corrupt / other version | invoke, overwrite |
//! | Expired / argument mismatch | invoke, overwrite |
//! | Usable | return stored result |

pub mod canonical;
pub mod entry;
pub mod finite;
pub mod fingerprint;
pub mod policy;

pub use canonical::{Canonical, CanonicalArgs, Keywords, Positional};
pub use entry::{
    CacheEntry, EntryStore, StoredEntry, ENTRY_EXTENSION, ENTRY_FORMAT_VERSION, MAX_NAME_LEN,
};
pub use finite::{check_finite, NonFinite};
pub use fingerprint::{fingerprint, CacheKey, FINGERPRINT_LEN};
pub use policy::{Validity, ValidityPolicy};
