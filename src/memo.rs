//! Memoized calls
//!
//! [`Memo`] ties the pieces together: resolve the callable, fingerprint the
//! arguments, consult the stored entry, and either return the stored result
//! or invoke the callable and persist what it returns.
//!
//! Errors returned by the callable pass through untouched and leave the cache
//! alone. Failures to read an entry only mean the call is recomputed; failures
//! to write one are logged and the fresh result is still returned.

use crate::cache::{
    fingerprint, CacheEntry, CanonicalArgs, EntryStore, Keywords, Positional, Validity,
    ValidityPolicy,
};
use crate::callable::{Callable, CallableIdentity};
use crate::config::Config;
use crate::error::OnceAgainResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Reproducible call runner bound to one cache directory
#[derive(Debug, Clone)]
pub struct Memo {
    store: EntryStore,
    policy: ValidityPolicy,
    verbose: bool,
}

impl Memo {
    /// Cache results under `cache_root`; entries never expire
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            store: EntryStore::new(cache_root),
            policy: ValidityPolicy::default(),
            verbose: false,
        }
    }

    /// Build from the `[cache]` and `[general]` configuration sections
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache.root.clone())
            .with_ttl(config.cache.ttl())
            .with_verbose(config.general.verbose)
    }

    /// Recompute entries older than `ttl` (`None` = never expire)
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.policy = ValidityPolicy::new(ttl);
        self
    }

    /// Report cache decisions at info level instead of debug
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.policy.ttl()
    }

    /// Call `callable` with `args` and `kwargs`, reusing a stored result when valid
    ///
    /// Results that cannot be stored (non-finite floats, I/O failures) are
    /// returned anyway and recomputed on the next call.
    pub fn call<C, A, K>(&self, callable: &C, args: &A, kwargs: &K) -> Result<C::Output, C::Error>
    where
        C: Callable<A, K>,
        A: Positional,
        K: Keywords,
        C::Output: Serialize + DeserializeOwned,
        C::Error: From<crate::error::OnceAgainError>,
    {
        let resolved = callable.resolve()?;
        let requested = CanonicalArgs::collect(resolved.prepended.clone(), args, kwargs)?;
        let path = self.path_of(&resolved.identity, &requested);
        self.store.ensure_root()?;

        if let Some(result) = self.lookup(&resolved.identity, &path, &requested) {
            return Ok(result);
        }

        let result = resolved.invoke(args, kwargs)?;

        let entry = CacheEntry::new(&resolved.identity.qualified_name, &requested, &result);
        if let Err(e) = self.store.store(&path, &entry) {
            warn!(
                "Failed to store cache entry for {}: {}",
                resolved.identity.qualified_name, e
            );
        }

        Ok(result)
    }

    /// Where the entry for this call lives, whether or not it exists
    pub fn entry_path<C, A, K>(&self, callable: &C, args: &A, kwargs: &K) -> OnceAgainResult<PathBuf>
    where
        C: Callable<A, K>,
        A: Positional,
        K: Keywords,
    {
        let resolved = callable.resolve()?;
        let requested = CanonicalArgs::collect(resolved.prepended.clone(), args, kwargs)?;
        Ok(self.path_of(&resolved.identity, &requested))
    }

    /// Delete the entry for this call, returning whether one existed
    pub fn invalidate<C, A, K>(&self, callable: &C, args: &A, kwargs: &K) -> OnceAgainResult<bool>
    where
        C: Callable<A, K>,
        A: Positional,
        K: Keywords,
    {
        let path = self.entry_path(callable, args, kwargs)?;
        self.store.remove(&path)
    }

    fn path_of(&self, identity: &CallableIdentity, requested: &CanonicalArgs) -> PathBuf {
        self.store
            .path_for(&identity.qualified_name, &fingerprint(requested))
    }

    fn lookup<R: DeserializeOwned>(
        &self,
        identity: &CallableIdentity,
        path: &Path,
        requested: &CanonicalArgs,
    ) -> Option<R> {
        if !self.store.exists(path) {
            self.report(format_args!(
                "No cache exists for {}, running",
                identity.qualified_name
            ));
            return None;
        }

        let entry = match self.store.load::<R>(path) {
            Ok(entry) => entry,
            Err(e) if e.is_cache_miss() => {
                self.report(format_args!(
                    "Cache for {} cannot be used ({}), re-running",
                    identity.qualified_name, e
                ));
                return None;
            }
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        let modified = match self.store.last_modified(path) {
            Ok(modified) => modified,
            Err(e) => {
                debug!("Cache entry {} vanished: {}", path.display(), e);
                return None;
            }
        };

        match self
            .policy
            .assess(&entry, requested, modified, SystemTime::now())
        {
            Validity::Usable => {
                self.report(format_args!(
                    "Cache exists for {}, loading it from {}",
                    identity.qualified_name,
                    path.display()
                ));
                Some(entry.result)
            }
            validity => {
                self.report(format_args!(
                    "Cache for {} is invalid ({}), re-running",
                    identity.qualified_name, validity
                ));
                None
            }
        }
    }

    fn report(&self, message: fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}
