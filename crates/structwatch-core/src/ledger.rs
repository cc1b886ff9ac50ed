//! Pending-removal ledger and its expiry queue.
//!
//! A removed entry waits here for up to the move window plus a grace period.
//! If a matching creation claims it first it is resolved as a move; otherwise
//! its expiry confirms the deletion.

use crate::event::EntryKind;
use crate::index::EntryRecord;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

/// Identifies one deferral. Expiries only act on the deferral they were
/// scheduled for.
pub type Ticket = u64;

/// An entry removed from the index, awaiting correlation or expiry.
#[derive(Debug, Clone)]
pub struct PendingRemoval {
    pub record: EntryRecord,
    pub removed_at: Instant,
    pub resolved: bool,
    pub ticket: Ticket,
}

impl PendingRemoval {
    /// Time elapsed since the removal was observed.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.removed_at)
    }
}

/// Name-keyed set of pending removals for one entry kind.
#[derive(Debug, Default)]
pub struct RemovalLedger {
    pending: HashMap<String, PendingRemoval>,
    /// Older deferrals pushed out by a newer removal of the same name. They
    /// can no longer pair with a creation and wait only for their expiry.
    displaced: HashMap<Ticket, PendingRemoval>,
}

impl RemovalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a record that was just removed from the index.
    ///
    /// An older unresolved deferral for the same name is moved aside; its
    /// own expiry still confirms it.
    pub fn defer(&mut self, record: EntryRecord, now: Instant, ticket: Ticket) {
        let entry = PendingRemoval {
            record,
            removed_at: now,
            resolved: false,
            ticket,
        };
        if let Some(old) = self.pending.insert(entry.record.name.clone(), entry) {
            if !old.resolved {
                self.displaced.insert(old.ticket, old);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&PendingRemoval> {
        self.pending.get(name)
    }

    /// Claim the pending removal for `name`.
    ///
    /// Returns it marked resolved and drops it from the ledger. A second
    /// call for the same name returns `None`.
    pub fn resolve(&mut self, name: &str) -> Option<PendingRemoval> {
        if !self.pending.get(name).is_some_and(|p| !p.resolved) {
            return None;
        }
        self.pending.remove(name).map(|mut p| {
            p.resolved = true;
            p
        })
    }

    /// Confirm the deferral identified by `ticket` as a deletion.
    ///
    /// A no-op returning `None` when the entry was resolved or removed in
    /// the meantime.
    pub fn expire(&mut self, name: &str, ticket: Ticket) -> Option<PendingRemoval> {
        let live = self
            .pending
            .get(name)
            .is_some_and(|p| p.ticket == ticket && !p.resolved);
        if live {
            self.pending.remove(name)
        } else {
            self.displaced.remove(&ticket)
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.displaced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.displaced.is_empty()
    }
}

/// A scheduled expiry check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub kind: EntryKind,
    pub name: String,
    pub ticket: Ticket,
}

/// Deadline-ordered queue of expiry checks.
///
/// Entries are never cancelled. Resolution in the ledger turns the matching
/// check into a no-op when it comes due.
#[derive(Debug, Default)]
pub struct ExpiryQueue {
    due: BTreeMap<(Instant, Ticket), Expiry>,
}

impl ExpiryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: Instant, expiry: Expiry) {
        self.due.insert((deadline, expiry.ticket), expiry);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.due.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every check due at or before `now`, oldest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<Expiry> {
        let mut fired = Vec::new();
        while let Some(entry) = self.due.first_entry() {
            if entry.key().0 > now {
                break;
            }
            fired.push(entry.remove());
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Identity;
    use std::path::Path;

    fn record(path: &str) -> EntryRecord {
        let identity = Identity {
            size: Some(3),
            modified: None,
            mode: 0o644,
            inode: 7,
        };
        EntryRecord::new(Path::new(path), identity).unwrap()
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut ledger = RemovalLedger::new();
        let now = Instant::now();
        ledger.defer(record("/x/a.txt"), now, 1);

        let first = ledger.resolve("a.txt").unwrap();
        assert!(first.resolved);
        assert!(ledger.resolve("a.txt").is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_expire_after_resolve_is_noop() {
        let mut ledger = RemovalLedger::new();
        ledger.defer(record("/x/a.txt"), Instant::now(), 1);
        ledger.resolve("a.txt");

        assert!(ledger.expire("a.txt", 1).is_none());
    }

    #[test]
    fn test_stale_ticket_does_not_expire_newer_deferral() {
        let mut ledger = RemovalLedger::new();
        let now = Instant::now();
        ledger.defer(record("/x/a.txt"), now, 1);
        ledger.resolve("a.txt");
        ledger.defer(record("/y/a.txt"), now, 2);

        assert!(ledger.expire("a.txt", 1).is_none());
        let confirmed = ledger.expire("a.txt", 2).unwrap();
        assert_eq!(confirmed.record.path, Path::new("/y/a.txt"));
    }

    #[test]
    fn test_displaced_entry_waits_for_its_own_expiry() {
        let mut ledger = RemovalLedger::new();
        let now = Instant::now();
        ledger.defer(record("/x/a.txt"), now, 1);
        ledger.defer(record("/y/a.txt"), now, 2);
        assert_eq!(ledger.len(), 2);

        // Only the newer deferral can still pair with a creation.
        assert_eq!(ledger.get("a.txt").unwrap().ticket, 2);

        let older = ledger.expire("a.txt", 1).unwrap();
        assert_eq!(older.record.path, Path::new("/x/a.txt"));
        assert!(ledger.expire("a.txt", 1).is_none());

        let newer = ledger.expire("a.txt", 2).unwrap();
        assert_eq!(newer.record.path, Path::new("/y/a.txt"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_expiry_queue_orders_by_deadline() {
        let mut queue = ExpiryQueue::new();
        let base = Instant::now();
        let expiry = |name: &str, ticket| Expiry {
            kind: EntryKind::File,
            name: name.to_string(),
            ticket,
        };

        queue.schedule(base + Duration::from_millis(200), expiry("late", 2));
        queue.schedule(base + Duration::from_millis(100), expiry("early", 1));
        assert_eq!(queue.next_deadline(), Some(base + Duration::from_millis(100)));

        assert!(queue.pop_due(base).is_empty());
        let fired = queue.pop_due(base + Duration::from_millis(150));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].name, "early");

        let fired = queue.pop_due(base + Duration::from_millis(500));
        assert_eq!(fired[0].name, "late");
        assert!(queue.is_empty());
    }
}
