//! Event router: drives the correlators from raw events, expiries and scans.

use crate::config::EngineConfig;
use crate::correlator::{CreateOutcome, Correlator, RemoveOutcome};
use crate::event::{EntryKind, Notification, RawEvent, RawKind};
use crate::index::entry_name;
use crate::ledger::{Expiry, ExpiryQueue, Ticket};
use crate::scanner::LiveTree;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Owns both correlators and the expiry queue. Synchronous; the engine
/// supplies the clock.
#[derive(Debug)]
pub struct EventRouter {
    files: Correlator,
    dirs: Correlator,
    expiries: ExpiryQueue,
    expiry_delay: Duration,
    next_ticket: Ticket,
}

impl EventRouter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            files: Correlator::new(EntryKind::File, config.move_timeout()),
            dirs: Correlator::new(EntryKind::Dir, config.move_timeout()),
            expiries: ExpiryQueue::new(),
            expiry_delay: config.expiry_delay(),
            next_ticket: 1,
        }
    }

    pub fn files(&self) -> &Correlator {
        &self.files
    }

    pub fn dirs(&self) -> &Correlator {
        &self.dirs
    }

    fn correlator(&self, kind: EntryKind) -> &Correlator {
        match kind {
            EntryKind::File => &self.files,
            EntryKind::Dir => &self.dirs,
        }
    }

    fn correlator_mut(&mut self, kind: EntryKind) -> &mut Correlator {
        match kind {
            EntryKind::File => &mut self.files,
            EntryKind::Dir => &mut self.dirs,
        }
    }

    /// Number of removals still waiting for a creation or their expiry.
    pub fn pending(&self) -> usize {
        self.files.ledger().len() + self.dirs.ledger().len()
    }

    /// Earliest scheduled expiry check.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.expiries.next_deadline()
    }

    /// Feed one raw event. Returns the transitions it confirmed.
    pub fn route(&mut self, event: &RawEvent, now: Instant) -> Vec<Notification> {
        trace!(kind = ?event.kind, path = %event.path.display(), "Raw event");
        match event.kind {
            RawKind::Create => self.created(EntryKind::File, &event.path, now),
            RawKind::CreateDir => self.created(EntryKind::Dir, &event.path, now),
            RawKind::Delete => self.removed(EntryKind::File, &event.path, now),
            RawKind::DeleteDir => self.removed(EntryKind::Dir, &event.path, now),
        }
    }

    fn created(&mut self, kind: EntryKind, path: &Path, now: Instant) -> Vec<Notification> {
        match self.correlator_mut(kind).on_created(path, now) {
            CreateOutcome::Created(record) => {
                vec![Notification::created(kind, &record.name, &record.parent)]
            }
            CreateOutcome::Moved { previous, current } => {
                if kind == EntryKind::Dir {
                    let files = self.files.index_mut().rebase(&previous.path, &current.path);
                    let dirs = self.dirs.index_mut().rebase(&previous.path, &current.path);
                    debug!(
                        from = %previous.path.display(),
                        to = %current.path.display(),
                        files,
                        dirs,
                        "Rebased moved directory contents"
                    );
                }
                vec![Notification::moved(
                    kind,
                    &current.name,
                    &previous.parent,
                    &current.parent,
                )]
            }
            CreateOutcome::Refreshed | CreateOutcome::Unconfirmed => Vec::new(),
        }
    }

    fn removed(&mut self, kind: EntryKind, path: &Path, now: Instant) -> Vec<Notification> {
        // Backends cannot always tell a removed file from a removed directory.
        let other = match kind {
            EntryKind::File => EntryKind::Dir,
            EntryKind::Dir => EntryKind::File,
        };
        let kind = if !self.correlator(kind).tracks(path) && self.correlator(other).tracks(path) {
            other
        } else {
            kind
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        match self.correlator_mut(kind).on_removed(path, now, ticket) {
            RemoveOutcome::Deferred { ticket } => {
                let name = entry_name(path).unwrap_or_default();
                self.expiries.schedule(
                    now + self.expiry_delay,
                    Expiry {
                        kind,
                        name,
                        ticket,
                    },
                );
                Vec::new()
            }
            RemoveOutcome::Untracked => {
                trace!(path = %path.display(), "Removal of untracked path");
                Vec::new()
            }
        }
    }

    /// Run every expiry check due at `now`. Unresolved removals become
    /// deletions.
    pub fn expire_due(&mut self, now: Instant) -> Vec<Notification> {
        let mut notes = Vec::new();
        for expiry in self.expiries.pop_due(now) {
            if let Some(pending) = self
                .correlator_mut(expiry.kind)
                .on_expired(&expiry.name, expiry.ticket)
            {
                notes.push(Notification::deleted(
                    expiry.kind,
                    &pending.record.name,
                    &pending.record.parent,
                ));
            }
        }
        notes
    }

    /// Drop every indexed entry missing from `live`, reporting each as
    /// deleted. Bypasses the ledger.
    pub fn reconcile(&mut self, live: &LiveTree) -> Vec<Notification> {
        let mut notes = Vec::new();
        for record in self.files.index_mut().sweep(&live.files, &live.skipped) {
            notes.push(Notification::deleted(EntryKind::File, &record.name, &record.parent));
        }
        for record in self.dirs.index_mut().sweep(&live.dirs, &live.skipped) {
            notes.push(Notification::deleted(EntryKind::Dir, &record.name, &record.parent));
        }
        notes
    }

    /// Index a walked tree without reporting anything.
    pub fn prime(&mut self, live: &LiveTree) {
        let (dirs, files) = live.sorted();
        for dir in dirs {
            self.dirs.index_mut().index(dir);
        }
        for file in files {
            self.files.index_mut().index(file);
        }
    }

    /// Index a walked subtree as new entries, reporting each creation.
    pub fn adopt(&mut self, live: &LiveTree, now: Instant) -> Vec<Notification> {
        let (dirs, files) = live.sorted();
        let mut notes = Vec::new();
        for dir in dirs {
            notes.extend(self.created(EntryKind::Dir, dir, now));
        }
        for file in files {
            notes.extend(self.created(EntryKind::File, file, now));
        }
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeKind;
    use std::fs;
    use tempfile::tempdir;

    fn router() -> EventRouter {
        EventRouter::new(&EngineConfig::default())
    }

    #[test]
    fn test_delete_waits_for_expiry() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, "a").unwrap();

        let mut router = router();
        let now = Instant::now();
        router.route(&RawEvent::create(&path), now);
        fs::remove_file(&path).unwrap();

        assert!(router.route(&RawEvent::delete(&path), now).is_empty());
        assert_eq!(router.pending(), 1);
        assert!(router.expire_due(now + Duration::from_millis(349)).is_empty());

        let notes = router.expire_due(now + Duration::from_millis(350));
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, ChangeKind::Delete);
        assert_eq!(notes[0].from.as_deref(), Some(temp_dir.path()));
        assert_eq!(router.pending(), 0);
    }

    #[test]
    fn test_delete_event_falls_back_to_directory_index() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("assets");
        fs::create_dir(&dir).unwrap();

        let mut router = router();
        let now = Instant::now();
        router.route(&RawEvent::create_dir(&dir), now);
        fs::remove_dir(&dir).unwrap();

        router.route(&RawEvent::delete(&dir), now);
        let notes = router.expire_due(now + Duration::from_secs(1));
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, ChangeKind::DeleteDir);
    }

    #[test]
    fn test_repeated_delete_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, "a").unwrap();

        let mut router = router();
        let now = Instant::now();
        router.route(&RawEvent::create(&path), now);
        router.route(&RawEvent::delete(&path), now);
        router.route(&RawEvent::delete(&path), now);

        assert_eq!(router.expire_due(now + Duration::from_secs(1)).len(), 1);
    }

    #[test]
    fn test_second_removal_of_a_name_defers_both() {
        let temp_dir = tempdir().unwrap();
        fs::create_dir(temp_dir.path().join("x")).unwrap();
        fs::create_dir(temp_dir.path().join("y")).unwrap();
        let first = temp_dir.path().join("x/a.txt");
        let second = temp_dir.path().join("y/a.txt");
        fs::write(&first, "1").unwrap();

        let mut router = router();
        let now = Instant::now();
        router.route(&RawEvent::create(&first), now);
        fs::remove_file(&first).unwrap();
        assert!(router.route(&RawEvent::delete(&first), now).is_empty());

        fs::write(&second, "an unrelated file").unwrap();
        router.route(&RawEvent::create(&second), now);
        fs::remove_file(&second).unwrap();

        // Neither removal is reported before its own expiry.
        assert!(router.route(&RawEvent::delete(&second), now).is_empty());
        assert_eq!(router.pending(), 2);
        assert!(router.expire_due(now + Duration::from_millis(349)).is_empty());

        let notes = router.expire_due(now + Duration::from_millis(350));
        let parents: Vec<_> = notes.iter().map(|n| n.from.clone().unwrap()).collect();
        assert_eq!(parents, vec![temp_dir.path().join("x"), temp_dir.path().join("y")]);
        assert_eq!(router.pending(), 0);
    }

    #[test]
    fn test_file_and_directory_may_share_a_name() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("data");
        let file = temp_dir.path().join("sub/data");
        fs::create_dir(&dir).unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        fs::write(&file, "x").unwrap();

        let mut router = router();
        let now = Instant::now();
        router.route(&RawEvent::create_dir(&dir), now);
        router.route(&RawEvent::create(&file), now);

        assert_eq!(router.files().index().lookup("data").unwrap().path, file);
        assert_eq!(router.dirs().index().lookup("data").unwrap().path, dir);
    }

    #[test]
    fn test_prime_reports_nothing() {
        let temp_dir = tempdir().unwrap();
        fs::create_dir(temp_dir.path().join("src")).unwrap();
        fs::write(temp_dir.path().join("src/main.rs"), "fn main() {}").unwrap();

        let mut live = LiveTree::default();
        live.dirs.insert(temp_dir.path().join("src"));
        live.files.insert(temp_dir.path().join("src/main.rs"));

        let mut router = router();
        router.prime(&live);

        assert_eq!(router.files().index().len(), 1);
        assert_eq!(router.dirs().index().len(), 1);
        assert!(router.reconcile(&live).is_empty());
    }
}
