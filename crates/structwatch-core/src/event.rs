//! Raw watcher events in, semantic notifications out.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of raw event delivered by the watcher layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    /// File appeared
    Create,
    /// File disappeared
    Delete,
    /// Directory appeared
    CreateDir,
    /// Directory disappeared
    DeleteDir,
}

/// A raw filesystem event, already filtered by the ignore predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawKind,
    pub path: PathBuf,
}

impl RawEvent {
    pub fn new(kind: RawKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self::new(RawKind::Create, path)
    }

    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self::new(RawKind::Delete, path)
    }

    pub fn create_dir(path: impl Into<PathBuf>) -> Self {
        Self::new(RawKind::CreateDir, path)
    }

    pub fn delete_dir(path: impl Into<PathBuf>) -> Self {
        Self::new(RawKind::DeleteDir, path)
    }
}

/// Whether an entry is a file or a directory.
///
/// Files and directories are tracked in separate indexes, so a file and a
/// directory may share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// A confirmed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Create,
    Delete,
    Move,
    CreateDir,
    DeleteDir,
    MoveDir,
}

impl ChangeKind {
    pub fn created(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => ChangeKind::Create,
            EntryKind::Dir => ChangeKind::CreateDir,
        }
    }

    pub fn deleted(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => ChangeKind::Delete,
            EntryKind::Dir => ChangeKind::DeleteDir,
        }
    }

    pub fn moved(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => ChangeKind::Move,
            EntryKind::Dir => ChangeKind::MoveDir,
        }
    }

    pub fn entry_kind(self) -> EntryKind {
        match self {
            ChangeKind::Create | ChangeKind::Delete | ChangeKind::Move => EntryKind::File,
            ChangeKind::CreateDir | ChangeKind::DeleteDir | ChangeKind::MoveDir => EntryKind::Dir,
        }
    }
}

/// Structured notification fired once a transition is final.
///
/// `from` and `to` are the containing directories: a creation carries only
/// `to`, a deletion only `from`, a move both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: ChangeKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<PathBuf>,
}

impl Notification {
    pub fn created(kind: EntryKind, name: &str, parent: &Path) -> Self {
        Self {
            kind: ChangeKind::created(kind),
            name: name.to_string(),
            from: None,
            to: Some(parent.to_path_buf()),
        }
    }

    pub fn deleted(kind: EntryKind, name: &str, parent: &Path) -> Self {
        Self {
            kind: ChangeKind::deleted(kind),
            name: name.to_string(),
            from: Some(parent.to_path_buf()),
            to: None,
        }
    }

    pub fn moved(kind: EntryKind, name: &str, from: &Path, to: &Path) -> Self {
        Self {
            kind: ChangeKind::moved(kind),
            name: name.to_string(),
            from: Some(from.to_path_buf()),
            to: Some(to.to_path_buf()),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind.entry_kind() {
            EntryKind::File => "File",
            EntryKind::Dir => "Directory",
        };
        match (&self.from, &self.to) {
            (Some(from), Some(to)) => write!(
                f,
                "{what} moved: {} ({} -> {})",
                self.name,
                display_dir(from),
                display_dir(to)
            ),
            (None, Some(to)) => write!(f, "{what} created: {} (in {})", self.name, display_dir(to)),
            (Some(from), None) => {
                write!(f, "{what} deleted: {} (from {})", self.name, display_dir(from))
            }
            (None, None) => write!(f, "{what} changed: {}", self.name),
        }
    }
}

fn display_dir(path: &Path) -> String {
    if path.as_os_str().is_empty() || path == Path::new(".") {
        "root".to_string()
    } else {
        path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_mapping() {
        assert_eq!(ChangeKind::created(EntryKind::Dir), ChangeKind::CreateDir);
        assert_eq!(ChangeKind::moved(EntryKind::File), ChangeKind::Move);
        assert_eq!(ChangeKind::DeleteDir.entry_kind(), EntryKind::Dir);
    }

    #[test]
    fn test_notification_display() {
        let n = Notification::moved(EntryKind::File, "a.txt", Path::new("/x"), Path::new("/y"));
        assert_eq!(n.to_string(), "File moved: a.txt (/x -> /y)");

        let n = Notification::created(EntryKind::Dir, "src", Path::new("."));
        assert_eq!(n.to_string(), "Directory created: src (in root)");
    }

    #[test]
    fn test_notification_serializes_without_missing_paths() {
        let n = Notification::deleted(EntryKind::File, "a.txt", Path::new("/x"));
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, r#"{"kind":"delete","name":"a.txt","from":"/x"}"#);
    }
}
