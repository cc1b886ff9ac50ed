//! File system watcher feeding the engine.
//!
//! Wraps the platform backend from `notify` and reduces its events to the
//! four raw kinds the engine understands. Renames are split into a removal
//! and a creation; pairing them back up is the engine's job.

use crate::error::EngineError;
use crate::event::RawEvent;
use crate::scanner::Ignored;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Recursive watch on one directory. Events stop when this is dropped.
pub struct FsWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    /// Start watching `root`, pushing filtered raw events into `tx`.
    pub fn watch(root: &Path, ignored: Ignored, tx: mpsc::Sender<RawEvent>) -> Result<Self, EngineError> {
        if !root.is_dir() {
            return Err(EngineError::NotFound(root.to_path_buf()));
        }

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for raw in convert_event(&event) {
                        if ignored(&raw.path) {
                            continue;
                        }
                        if let Err(e) = tx.blocking_send(raw) {
                            error!(error = %e, "Failed to forward watcher event");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Watcher error"),
            }
        })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        info!(path = %root.display(), "Started watching");

        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Reduce a backend event to raw events.
fn convert_event(event: &Event) -> Vec<RawEvent> {
    let raw: Vec<RawEvent> = match &event.kind {
        EventKind::Create(CreateKind::Folder) => {
            event.paths.iter().map(RawEvent::create_dir).collect()
        }
        EventKind::Create(_) => event.paths.iter().map(|p| appeared(p)).collect(),
        EventKind::Remove(RemoveKind::Folder) => {
            event.paths.iter().map(RawEvent::delete_dir).collect()
        }
        EventKind::Remove(_) => event.paths.iter().map(RawEvent::delete).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => event.paths.iter().map(RawEvent::delete).collect(),
            RenameMode::To => event.paths.iter().map(|p| appeared(p)).collect(),
            RenameMode::Both => match event.paths.as_slice() {
                [from, to, ..] => vec![RawEvent::delete(from), appeared(to)],
                _ => Vec::new(),
            },
            RenameMode::Any | RenameMode::Other => event
                .paths
                .iter()
                .map(|p| {
                    if p.exists() {
                        appeared(p)
                    } else {
                        RawEvent::delete(p)
                    }
                })
                .collect(),
        },
        // Content, metadata and access changes are not tracked.
        _ => Vec::new(),
    };

    for r in &raw {
        debug!(kind = ?r.kind, path = %r.path.display(), "Watcher event");
    }
    raw
}

fn appeared(path: &Path) -> RawEvent {
    if path.is_dir() {
        RawEvent::create_dir(path)
    } else {
        RawEvent::create(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawKind;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        Event {
            kind,
            paths,
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_convert_create_file() {
        let raw = convert_event(&event(
            EventKind::Create(CreateKind::File),
            vec![PathBuf::from("/nonexistent/test.rs")],
        ));
        assert_eq!(raw, vec![RawEvent::create("/nonexistent/test.rs")]);
    }

    #[test]
    fn test_convert_create_folder() {
        let raw = convert_event(&event(
            EventKind::Create(CreateKind::Folder),
            vec![PathBuf::from("/nonexistent/src")],
        ));
        assert_eq!(raw[0].kind, RawKind::CreateDir);
    }

    #[test]
    fn test_convert_create_any_checks_path_type() {
        let temp_dir = tempdir().unwrap();
        let raw = convert_event(&event(
            EventKind::Create(CreateKind::Any),
            vec![temp_dir.path().to_path_buf()],
        ));
        assert_eq!(raw[0].kind, RawKind::CreateDir);
    }

    #[test]
    fn test_convert_remove() {
        let raw = convert_event(&event(
            EventKind::Remove(RemoveKind::Folder),
            vec![PathBuf::from("/nonexistent/src")],
        ));
        assert_eq!(raw[0].kind, RawKind::DeleteDir);

        let raw = convert_event(&event(
            EventKind::Remove(RemoveKind::Any),
            vec![PathBuf::from("/nonexistent/src")],
        ));
        assert_eq!(raw[0].kind, RawKind::Delete);
    }

    #[test]
    fn test_convert_rename_both_splits() {
        let raw = convert_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec![PathBuf::from("/nonexistent/x/a.txt"), PathBuf::from("/nonexistent/y/a.txt")],
        ));
        assert_eq!(
            raw,
            vec![
                RawEvent::delete("/nonexistent/x/a.txt"),
                RawEvent::create("/nonexistent/y/a.txt"),
            ]
        );
    }

    #[test]
    fn test_convert_rename_any_checks_existence() {
        let temp_dir = tempdir().unwrap();
        let present = temp_dir.path().join("here.txt");
        fs::write(&present, "x").unwrap();
        let absent = temp_dir.path().join("gone.txt");

        let raw = convert_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            vec![present.clone(), absent.clone()],
        ));
        assert_eq!(raw, vec![RawEvent::create(&present), RawEvent::delete(&absent)]);
    }

    #[test]
    fn test_convert_ignores_content_changes() {
        let raw = convert_event(&event(
            EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)),
            vec![PathBuf::from("test.rs")],
        ));
        assert!(raw.is_empty());

        let raw = convert_event(&event(
            EventKind::Access(notify::event::AccessKind::Read),
            vec![PathBuf::from("test.rs")],
        ));
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn test_watch_missing_root_fails() {
        let temp_dir = tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let ignored: Ignored = Arc::new(|_: &Path| false);

        let result = FsWatcher::watch(&temp_dir.path().join("missing"), ignored, tx);
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_watch_existing_root() {
        let temp_dir = tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let ignored: Ignored = Arc::new(|_: &Path| false);

        let watcher = FsWatcher::watch(temp_dir.path(), ignored, tx).unwrap();
        assert_eq!(watcher.root(), temp_dir.path());
    }
}
