//! Cache validity policy
//!
//! An entry is reused only when all checks pass, in this order:
//!
//! | Check | Failure |
//! |-------|---------|
//! | format version equals the current one | `VersionMismatch` |
//! | age within the ttl (if any) | `Expired` |
//! | stored arguments equal the requested ones | `ArgumentMismatch` |
//!
//! The last check guards against fingerprint collisions, since the key is a
//! truncated hash.

use crate::cache::canonical::CanonicalArgs;
use crate::cache::entry::{CacheEntry, ENTRY_FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Outcome of checking an entry against a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// The stored result may be returned
    Usable,
    /// Written by another format version
    VersionMismatch,
    /// Older than the ttl
    Expired,
    /// Same fingerprint, different arguments
    ArgumentMismatch,
}

impl Validity {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Usable)
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Usable => "usable",
            Self::VersionMismatch => "version mismatch",
            Self::Expired => "expired",
            Self::ArgumentMismatch => "argument mismatch",
        };
        write!(f, "{}", name)
    }
}

/// Decides whether a stored entry can stand in for a fresh call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityPolicy {
    ttl: Option<Duration>,
}

impl ValidityPolicy {
    /// Policy with an optional time-to-live (`None` = never expires)
    pub fn new(ttl: Option<Duration>) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Whether an entry modified at `modified` is still within the ttl at `now`
    ///
    /// A modification time in the future counts as age zero.
    pub fn is_fresh(&self, modified: SystemTime, now: SystemTime) -> bool {
        match self.ttl {
            None => true,
            Some(ttl) => now
                .duration_since(modified)
                .map(|age| age <= ttl)
                .unwrap_or(true),
        }
    }

    /// Check `entry` against the requested arguments
    pub fn assess<R>(
        &self,
        entry: &CacheEntry<R>,
        requested: &CanonicalArgs,
        modified: SystemTime,
        now: SystemTime,
    ) -> Validity {
        if entry.version != ENTRY_FORMAT_VERSION {
            return Validity::VersionMismatch;
        }
        if !self.is_fresh(modified, now) {
            return Validity::Expired;
        }
        if !entry.matches_args(requested) {
            return Validity::ArgumentMismatch;
        }
        Validity::Usable
    }

    pub fn is_usable<R>(
        &self,
        entry: &CacheEntry<R>,
        requested: &CanonicalArgs,
        modified: SystemTime,
        now: SystemTime,
    ) -> bool {
        self.assess(entry, requested, modified, now).is_usable()
    }
}
