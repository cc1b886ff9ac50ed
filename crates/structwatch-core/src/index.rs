//! In-memory entry index.
//!
//! Keyed by base name. One instance tracks files, another directories.

use crate::event::EntryKind;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Filesystem attributes used to decide whether two observations refer to
/// the same storage object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Size in bytes, files only
    pub size: Option<u64>,
    /// Last modification time
    pub modified: Option<DateTime<Utc>>,
    /// Permission bits
    pub mode: u32,
    /// Inode number (0 where the platform has none)
    pub inode: u64,
}

impl Identity {
    /// Stat `path` and capture its identity.
    pub fn probe(path: &Path, kind: EntryKind) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self::from_metadata(&metadata, kind))
    }

    pub fn from_metadata(metadata: &Metadata, kind: EntryKind) -> Self {
        let size = match kind {
            EntryKind::File => Some(metadata.len()),
            EntryKind::Dir => None,
        };

        Self {
            size,
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            mode: mode_bits(metadata),
            inode: inode(metadata),
        }
    }

    /// Inode equality plus size equality. Directories carry no size, so for
    /// them this reduces to the inode check.
    pub fn same_object(&self, other: &Identity) -> bool {
        self.inode == other.inode && self.size == other.size
    }
}

#[cfg(unix)]
fn inode(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode(_metadata: &Metadata) -> u64 {
    0
}

#[cfg(unix)]
fn mode_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.mode()
}

#[cfg(not(unix))]
fn mode_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Last known snapshot of a file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Base name, the index key
    pub name: String,
    /// Full path at last observation
    pub path: PathBuf,
    /// Containing directory at last observation
    pub parent: PathBuf,
    pub identity: Identity,
    /// Last successful index or refresh
    pub last_seen: DateTime<Utc>,
}

impl EntryRecord {
    /// Build a record for `path` from an identity that was already probed.
    ///
    /// Returns `None` for paths without a final component (`/`, `..`).
    pub fn new(path: &Path, identity: Identity) -> Option<Self> {
        let name = entry_name(path)?;
        Some(Self {
            name,
            path: path.to_path_buf(),
            parent: parent_of(path),
            identity,
            last_seen: Utc::now(),
        })
    }

    /// Stat `path` and build a record for it.
    pub fn observe(path: &Path, kind: EntryKind) -> Option<Self> {
        match Identity::probe(path, kind) {
            Ok(identity) => Self::new(path, identity),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Stat failed");
                None
            }
        }
    }
}

/// Base name used as the index key.
pub fn entry_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

pub(crate) fn parent_of(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Name-keyed index of entries of one kind.
#[derive(Debug)]
pub struct EntryIndex {
    kind: EntryKind,
    entries: HashMap<String, EntryRecord>,
}

impl EntryIndex {
    pub fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Stat `path` and record it, overwriting any entry with the same name.
    ///
    /// Returns false and records nothing when the stat fails; the entry
    /// vanished between the event and the read.
    pub fn index(&mut self, path: &Path) -> bool {
        match EntryRecord::observe(path, self.kind) {
            Some(record) => {
                self.insert(record);
                true
            }
            None => false,
        }
    }

    /// Record an already observed entry. Returns the record it replaced.
    pub fn insert(&mut self, record: EntryRecord) -> Option<EntryRecord> {
        trace!(kind = ?self.kind, name = %record.name, path = %record.path.display(), "Indexed");
        self.entries.insert(record.name.clone(), record)
    }

    pub fn lookup(&self, name: &str) -> Option<&EntryRecord> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<EntryRecord> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryRecord> {
        self.entries.values()
    }

    /// Rewrite every record lying strictly under `from` to lie under `to`.
    ///
    /// Returns the number of records rewritten.
    pub fn rebase(&mut self, from: &Path, to: &Path) -> usize {
        let mut count = 0;
        for record in self.entries.values_mut() {
            let Ok(rest) = record.path.strip_prefix(from) else {
                continue;
            };
            if rest.as_os_str().is_empty() {
                continue;
            }
            record.path = to.join(rest);
            record.parent = parent_of(&record.path);
            count += 1;
        }
        count
    }

    /// Remove and return every record whose path is not in `live`.
    ///
    /// Records under any of the `skipped` directories are left alone; their
    /// subtree could not be read, so absence proves nothing.
    pub fn sweep(&mut self, live: &HashSet<PathBuf>, skipped: &[PathBuf]) -> Vec<EntryRecord> {
        let missing: Vec<String> = self
            .entries
            .values()
            .filter(|r| !live.contains(&r.path))
            .filter(|r| !skipped.iter().any(|dir| r.path.starts_with(dir)))
            .map(|r| r.name.clone())
            .collect();

        missing
            .into_iter()
            .filter_map(|name| self.entries.remove(&name))
            .collect()
    }
}
