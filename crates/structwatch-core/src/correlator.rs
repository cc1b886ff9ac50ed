//! Move correlation.
//!
//! Pairs a removal with a later creation of the same name when the new
//! entry has the same inode (and, for files, the same size) and shows up
//! within the move window. This is a heuristic: inode reuse by an unrelated
//! entry inside the window would be reported as a move.

use crate::event::EntryKind;
use crate::index::{entry_name, EntryIndex, EntryRecord, Identity};
use crate::ledger::{PendingRemoval, RemovalLedger, Ticket};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Result of feeding a creation into the correlator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A genuinely new entry, now indexed
    Created(EntryRecord),
    /// The entry pairs with a pending removal
    Moved {
        previous: EntryRecord,
        current: EntryRecord,
    },
    /// Nothing observable changed: a duplicate delivery for an indexed path,
    /// or a removal and re-creation of the same object at the same path
    /// inside the move window. The latter resolves the pending removal
    /// without reporting a move from a directory onto itself.
    Refreshed,
    /// The entry could not be read; nothing was recorded
    Unconfirmed,
}

/// Result of feeding a removal into the correlator.
#[derive(Debug, Clone)]
pub enum RemoveOutcome {
    /// Moved into the ledger; an expiry must be scheduled for `ticket`
    Deferred { ticket: Ticket },
    /// The path is not tracked
    Untracked,
}

/// Index, ledger and correlation rules for one entry kind.
#[derive(Debug)]
pub struct Correlator {
    index: EntryIndex,
    ledger: RemovalLedger,
    move_timeout: Duration,
}

impl Correlator {
    pub fn new(kind: EntryKind, move_timeout: Duration) -> Self {
        Self {
            index: EntryIndex::new(kind),
            ledger: RemovalLedger::new(),
            move_timeout,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.index.kind()
    }

    pub fn index(&self) -> &EntryIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut EntryIndex {
        &mut self.index
    }

    pub fn ledger(&self) -> &RemovalLedger {
        &self.ledger
    }

    /// Handle a creation observed at `path`.
    pub fn on_created(&mut self, path: &Path, now: Instant) -> CreateOutcome {
        let Some(name) = entry_name(path) else {
            return CreateOutcome::Unconfirmed;
        };

        let Some(pending) = self.ledger.get(&name).filter(|p| !p.resolved) else {
            return self.create(path, &name, None);
        };

        let identity = match Identity::probe(path, self.kind()) {
            Ok(identity) => identity,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Move check stat failed");
                return CreateOutcome::Unconfirmed;
            }
        };

        let age = pending.age(now);
        if !pending.record.identity.same_object(&identity) || age >= self.move_timeout {
            debug!(
                name = %name,
                age_ms = age.as_millis() as u64,
                "Pending removal does not match, treating as creation"
            );
            return self.create(path, &name, Some(identity));
        }

        let Some(current) = EntryRecord::new(path, identity) else {
            return CreateOutcome::Unconfirmed;
        };
        let Some(pending) = self.ledger.resolve(&name) else {
            return CreateOutcome::Unconfirmed;
        };
        self.index.insert(current.clone());

        if pending.record.path == current.path {
            debug!(name = %name, "Entry restored in place");
            return CreateOutcome::Refreshed;
        }

        CreateOutcome::Moved {
            previous: pending.record,
            current,
        }
    }

    fn create(&mut self, path: &Path, name: &str, identity: Option<Identity>) -> CreateOutcome {
        let record = match identity {
            Some(identity) => EntryRecord::new(path, identity),
            None => EntryRecord::observe(path, self.kind()),
        };
        let Some(record) = record else {
            return CreateOutcome::Unconfirmed;
        };

        let duplicate = self.index.lookup(name).is_some_and(|r| r.path == path);
        self.index.insert(record.clone());

        if duplicate {
            CreateOutcome::Refreshed
        } else {
            CreateOutcome::Created(record)
        }
    }

    /// Handle a removal observed at `path`.
    pub fn on_removed(&mut self, path: &Path, now: Instant, ticket: Ticket) -> RemoveOutcome {
        let Some(name) = entry_name(path) else {
            return RemoveOutcome::Untracked;
        };

        if !self.index.lookup(&name).is_some_and(|r| r.path == path) {
            return RemoveOutcome::Untracked;
        }
        let Some(record) = self.index.remove(&name) else {
            return RemoveOutcome::Untracked;
        };

        self.ledger.defer(record, now, ticket);
        RemoveOutcome::Deferred { ticket }
    }

    /// Whether a removal at `path` would be tracked by this correlator.
    pub fn tracks(&self, path: &Path) -> bool {
        entry_name(path)
            .and_then(|name| self.index.lookup(&name))
            .is_some_and(|r| r.path == path)
    }

    /// Expiry check for a deferral. Returns the removal when it is now a
    /// confirmed deletion.
    pub fn on_expired(&mut self, name: &str, ticket: Ticket) -> Option<PendingRemoval> {
        self.ledger.expire(name, ticket)
    }
}
