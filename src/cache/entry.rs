//! File-backed cache entries
//!
//! One JSON file per (callable, argument set) pair, named
//! `{qualified_name}.{fingerprint}.cache` directly under the cache root.
//! Qualified names longer than [`MAX_NAME_LEN`] bytes are cut and suffixed
//! with `~` and a hash of the full name to stay within filesystem limits.
//! Writes go to a hidden temporary sibling first and are renamed into place,
//! so a reader sees either the previous entry or the new one.

use crate::cache::canonical::CanonicalArgs;
use crate::cache::finite::check_finite;
use crate::cache::fingerprint::CacheKey;
use crate::error::{OnceAgainError, OnceAgainResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use uuid::Uuid;

/// Format tag written into every entry; bump when serialization or canonical forms change
pub const ENTRY_FORMAT_VERSION: &str = "v01";

/// File extension of cache entries
pub const ENTRY_EXTENSION: &str = "cache";

/// Longest qualified name used verbatim in an entry file name, in bytes
pub const MAX_NAME_LEN: usize = 160;

/// Hex chars of the name hash appended to shortened names
const NAME_HASH_LEN: usize = 16;

/// A persisted call result together with the arguments that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<R> {
    /// Format tag, see [`ENTRY_FORMAT_VERSION`]
    pub version: String,

    /// Qualified name of the callable
    pub qualified_name: String,

    /// Canonical positional arguments (receiver first for bound callables)
    pub positional: Vec<String>,

    /// Canonical keyword arguments
    pub keyword: BTreeMap<String, String>,

    /// When the result was computed
    pub created_at: DateTime<Utc>,

    /// The callable's return value
    pub result: R,
}

impl<R> CacheEntry<R> {
    /// Create an entry in the current format
    pub fn new(qualified_name: &str, args: &CanonicalArgs, result: R) -> Self {
        Self {
            version: ENTRY_FORMAT_VERSION.to_string(),
            qualified_name: qualified_name.to_string(),
            positional: args.positional.clone(),
            keyword: args.keyword.clone(),
            created_at: Utc::now(),
            result,
        }
    }

    /// Whether the stored arguments are exactly `args`
    pub fn matches_args(&self, args: &CanonicalArgs) -> bool {
        self.positional == args.positional && self.keyword == args.keyword
    }
}

#[derive(Deserialize)]
struct EntryHeader {
    version: String,
}

/// An entry file found in the cache directory
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Full path of the entry file
    pub path: PathBuf,
    /// Qualified name parsed from the file name (shortened form for long names)
    pub qualified_name: String,
    /// Fingerprint parsed from the file name
    pub key: CacheKey,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

impl StoredEntry {
    /// Check if the entry was last written more than `max_age` ago
    pub fn is_older_than(&self, max_age: chrono::Duration) -> bool {
        Utc::now() - self.modified > max_age
    }

    /// File name without the directory
    pub fn file_name(&self) -> String {
        EntryStore::file_name(&self.qualified_name, &self.key)
    }
}

/// Cache entry store rooted at one directory
#[derive(Debug, Clone)]
pub struct EntryStore {
    root: PathBuf,
}

impl EntryStore {
    /// Create a store for the given cache directory (not created until first use)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The form of `qualified_name` used in file names
    ///
    /// Names up to [`MAX_NAME_LEN`] bytes are returned unchanged.
    pub fn stored_name(qualified_name: &str) -> Cow<'_, str> {
        if qualified_name.len() <= MAX_NAME_LEN {
            return Cow::Borrowed(qualified_name);
        }

        let digest = hex::encode(Sha256::digest(qualified_name.as_bytes()));
        let mut cut = MAX_NAME_LEN - NAME_HASH_LEN - 1;
        while !qualified_name.is_char_boundary(cut) {
            cut -= 1;
        }
        Cow::Owned(format!(
            "{}~{}",
            &qualified_name[..cut],
            &digest[..NAME_HASH_LEN]
        ))
    }

    /// File name of the entry for a (qualified name, key) pair
    pub fn file_name(qualified_name: &str, key: &CacheKey) -> String {
        format!(
            "{}.{}.{}",
            Self::stored_name(qualified_name),
            key,
            ENTRY_EXTENSION
        )
    }

    /// Split an entry file name back into qualified name and key
    pub fn parse_file_name(file_name: &str) -> Option<(String, CacheKey)> {
        let stem = file_name.strip_suffix(&format!(".{}", ENTRY_EXTENSION))?;
        let (name, key) = stem.rsplit_once('.')?;
        if name.is_empty() || name.starts_with('.') {
            return None;
        }
        Some((name.to_string(), CacheKey::parse(key)?))
    }

    /// Deterministic path of an entry
    pub fn path_for(&self, qualified_name: &str, key: &CacheKey) -> PathBuf {
        self.root.join(Self::file_name(qualified_name, key))
    }

    /// Create the cache directory if it does not exist yet
    pub fn ensure_root(&self) -> OnceAgainResult<()> {
        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(OnceAgainError::CacheDirectoryConflict(self.root.clone())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&self.root).map_err(|e| {
                    OnceAgainError::io(
                        format!("creating cache directory {}", self.root.display()),
                        e,
                    )
                })?;
                debug!("Created cache directory {}", self.root.display());
                Ok(())
            }
            Err(e) => Err(OnceAgainError::io(
                format!("inspecting cache directory {}", self.root.display()),
                e,
            )),
        }
    }

    /// Whether an entry file exists at `path`
    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Modification time of the entry at `path`
    pub fn last_modified(&self, path: &Path) -> OnceAgainResult<SystemTime> {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|e| not_found_or_io(path, "reading modification time of", e))
    }

    /// Load the entry at `path`
    ///
    /// Fails with `CorruptEntry` when the file was written by another format
    /// version or does not deserialize into `CacheEntry<R>`.
    pub fn load<R: DeserializeOwned>(&self, path: &Path) -> OnceAgainResult<CacheEntry<R>> {
        let bytes = fs::read(path).map_err(|e| not_found_or_io(path, "reading", e))?;

        let header: EntryHeader = serde_json::from_slice(&bytes)
            .map_err(|e| OnceAgainError::corrupt(path, e.to_string()))?;
        if header.version != ENTRY_FORMAT_VERSION {
            return Err(OnceAgainError::corrupt(
                path,
                format!(
                    "format version {}, expected {}",
                    header.version, ENTRY_FORMAT_VERSION
                ),
            ));
        }

        serde_json::from_slice(&bytes).map_err(|e| OnceAgainError::corrupt(path, e.to_string()))
    }

    /// Load an entry without knowing the result type
    pub fn inspect(&self, path: &Path) -> OnceAgainResult<CacheEntry<serde_json::Value>> {
        self.load(path)
    }

    /// Write `entry` to `path`, replacing any previous entry
    ///
    /// Fails with `UnstorableResult`, leaving any previous entry in place, when
    /// the result holds a NaN or infinite float.
    pub fn store<R: Serialize>(&self, path: &Path, entry: &CacheEntry<R>) -> OnceAgainResult<()> {
        check_finite(&entry.result).map_err(|e| OnceAgainError::UnstorableResult {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let bytes = serde_json::to_vec(entry)?;

        let file_name = path
            .file_name()
            .ok_or_else(|| OnceAgainError::User(format!("Invalid entry path: {}", path.display())))?;
        let tmp = path.with_file_name(format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            Uuid::new_v4().simple()
        ));

        fs::write(&tmp, &bytes)
            .map_err(|e| OnceAgainError::io(format!("writing {}", tmp.display()), e))?;

        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(OnceAgainError::io(
                format!("replacing cache entry {}", path.display()),
                e,
            ));
        }

        debug!("Stored cache entry {}", path.display());
        Ok(())
    }

    /// Remove the entry at `path`, returning whether a file was deleted
    pub fn remove(&self, path: &Path) -> OnceAgainResult<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(OnceAgainError::io(
                format!("removing cache entry {}", path.display()),
                e,
            )),
        }
    }

    /// List all entries under the cache root, sorted by name
    pub fn list(&self) -> OnceAgainResult<Vec<StoredEntry>> {
        if !self.root.is_dir() {
            return Ok(vec![]);
        }

        let dir = fs::read_dir(&self.root).map_err(|e| {
            OnceAgainError::io(format!("reading cache directory {}", self.root.display()), e)
        })?;

        let mut entries = vec![];
        for item in dir {
            let item = item.map_err(|e| OnceAgainError::io("reading cache directory entry", e))?;
            let file_name = item.file_name();
            let Some((qualified_name, key)) = Self::parse_file_name(&file_name.to_string_lossy())
            else {
                continue;
            };

            let meta = item.metadata().map_err(|e| {
                OnceAgainError::io(format!("reading metadata of {}", item.path().display()), e)
            })?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta
                .modified()
                .map_err(|e| OnceAgainError::io("reading modification time", e))?;

            entries.push(StoredEntry {
                path: item.path(),
                qualified_name,
                key,
                size: meta.len(),
                modified: DateTime::<Utc>::from(modified),
            });
        }

        entries.sort_by(|a, b| {
            a.qualified_name
                .cmp(&b.qualified_name)
                .then_with(|| a.key.cmp(&b.key))
        });
        debug!("Found {} cache entries in {}", entries.len(), self.root.display());
        Ok(entries)
    }

    /// Resolve a user-supplied entry reference: a path, or a file name under the root
    pub fn locate(&self, reference: &str) -> PathBuf {
        let candidate = PathBuf::from(reference);
        if candidate.is_file() || candidate.components().count() > 1 {
            return candidate;
        }
        let with_ext = if reference.ends_with(&format!(".{}", ENTRY_EXTENSION)) {
            reference.to_string()
        } else {
            format!("{}.{}", reference, ENTRY_EXTENSION)
        };
        self.root.join(with_ext)
    }
}

fn not_found_or_io(path: &Path, action: &str, e: std::io::Error) -> OnceAgainError {
    if e.kind() == ErrorKind::NotFound {
        OnceAgainError::EntryNotFound(path.to_path_buf())
    } else {
        OnceAgainError::io(format!("{} {}", action, path.display()), e)
    }
}
