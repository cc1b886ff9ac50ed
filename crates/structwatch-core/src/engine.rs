//! The engine task.
//!
//! One task owns the index, the ledger and the trigger. It reacts to raw
//! watcher events, expiry deadlines, the debounce deadline, completion of a
//! running rebuild and the periodic scan, one at a time. The rebuild itself
//! runs on a separate task so correlation carries on while it runs.

use crate::config::EngineConfig;
use crate::event::{ChangeKind, Notification, RawEvent};
use crate::router::EventRouter;
use crate::scanner::{Ignored, LiveTree, Scanner};
use crate::trigger::{DebouncedTrigger, Rebuild};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

type RebuildTask = JoinHandle<anyhow::Result<()>>;

/// Counters for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    pub files: usize,
    pub dirs: usize,
    pub pending_removals: usize,
    pub rebuilds: u64,
}

/// Reconciliation engine for one watched tree.
pub struct Engine {
    root: PathBuf,
    config: EngineConfig,
    router: EventRouter,
    trigger: DebouncedTrigger,
    scanner: Scanner,
    rebuild: Arc<dyn Rebuild>,
    notifications: broadcast::Sender<Notification>,
}

impl Engine {
    pub fn new(root: &Path, config: EngineConfig, ignored: Ignored, rebuild: Arc<dyn Rebuild>) -> Self {
        let (notifications, _) = broadcast::channel(256);
        Self {
            root: root.to_path_buf(),
            router: EventRouter::new(&config),
            trigger: DebouncedTrigger::new(config.debounce()),
            scanner: Scanner::new(root, ignored),
            config,
            rebuild,
            notifications,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Receive every confirmed transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            files: self.router.files().index().len(),
            dirs: self.router.dirs().index().len(),
            pending_removals: self.router.pending(),
            rebuilds: self.trigger.runs(),
        }
    }

    /// Index the current tree without reporting anything.
    pub async fn prime(&mut self) -> EngineStats {
        let live = self.walk(None).await;
        self.router.prime(&live);
        let stats = self.stats();
        info!(files = stats.files, dirs = stats.dirs, "Initial scan complete");
        stats
    }

    /// Ask for a rebuild after the debounce window.
    pub fn schedule_rebuild(&mut self, now: Instant) {
        self.trigger.schedule(now);
    }

    /// Route one raw event and publish what it confirms.
    ///
    /// A newly created directory is walked so entries that landed in it
    /// before the watcher saw it are indexed and reported too.
    pub async fn handle_event(&mut self, event: RawEvent, now: Instant) -> Vec<Notification> {
        let mut notes = self.router.route(&event, now);

        let created_dirs: Vec<PathBuf> = notes
            .iter()
            .filter(|n| n.kind == ChangeKind::CreateDir)
            .filter_map(|n| n.to.as_ref().map(|parent| parent.join(&n.name)))
            .collect();
        for dir in created_dirs {
            let live = self.walk(Some(dir)).await;
            if !live.is_empty() {
                notes.extend(self.router.adopt(&live, now));
            }
        }

        self.publish(&notes, now);
        notes
    }

    /// Confirm every removal whose move window has closed.
    pub fn expire_due(&mut self, now: Instant) -> Vec<Notification> {
        let notes = self.router.expire_due(now);
        self.publish(&notes, now);
        notes
    }

    /// Walk the tree and report indexed entries that vanished without an
    /// event.
    pub async fn reconcile(&mut self, now: Instant) -> Vec<Notification> {
        let live = self.walk(None).await;
        let notes = self.router.reconcile(&live);
        if notes.is_empty() {
            debug!("Reconciliation found no missed deletions");
        } else {
            info!(count = notes.len(), "Reconciliation found missed deletions");
        }
        self.publish(&notes, now);
        notes
    }

    async fn walk(&self, dir: Option<PathBuf>) -> LiveTree {
        let scanner = self.scanner.clone();
        let result = tokio::task::spawn_blocking(move || match dir {
            Some(dir) => scanner.walk_from(&dir),
            None => scanner.walk(),
        })
        .await;

        result.unwrap_or_else(|e| {
            error!(error = %e, "Walk task failed");
            // Everything counts as unreadable, so nothing is swept.
            LiveTree {
                skipped: vec![self.root.clone()],
                ..LiveTree::default()
            }
        })
    }

    fn publish(&mut self, notes: &[Notification], now: Instant) {
        if notes.is_empty() {
            return;
        }
        for note in notes {
            info!(
                kind = ?note.kind,
                name = %note.name,
                from = ?note.from,
                to = ?note.to,
                "{}",
                note
            );
            // No subscribers is fine.
            let _ = self.notifications.send(note.clone());
        }
        self.trigger.schedule(now);
    }

    fn start_rebuild(&self) -> RebuildTask {
        debug!("Starting rebuild");
        let rebuild = self.rebuild.clone();
        tokio::spawn(async move { rebuild.rebuild().await })
    }

    fn finish_rebuild(&mut self, result: Result<anyhow::Result<()>, JoinError>) {
        match result {
            Ok(Ok(())) => info!("Rebuild complete"),
            Ok(Err(e)) => error!("Rebuild failed: {:#}", e),
            Err(e) => error!(error = %e, "Rebuild task aborted"),
        }
        self.trigger.complete(Instant::now());
    }

    /// Drive the engine until the event channel closes or shutdown is
    /// signalled. A rebuild still running at that point is awaited.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<RawEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> EngineStats {
        let period = self.config.scan_interval();
        let mut scan = interval_at(Instant::now() + period, period);
        scan.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut running: Option<RebuildTask> = None;

        info!(root = %self.root.display(), "Engine running");

        loop {
            let expiry_at = self.router.next_deadline();
            let trigger_at = self.trigger.deadline();

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event, Instant::now()).await;
                    }
                    None => {
                        info!("Event channel closed");
                        break;
                    }
                },
                _ = sleep_until(expiry_at.unwrap_or_else(Instant::now)), if expiry_at.is_some() => {
                    self.expire_due(Instant::now());
                }
                _ = sleep_until(trigger_at.unwrap_or_else(Instant::now)), if trigger_at.is_some() => {
                    if self.trigger.fire(Instant::now()) {
                        running = Some(self.start_rebuild());
                    }
                }
                Some(result) = wait_for(&mut running), if running.is_some() => {
                    running = None;
                    self.finish_rebuild(result);
                }
                _ = scan.tick() => {
                    self.reconcile(Instant::now()).await;
                }
                _ = shutdown.recv() => {
                    info!("Engine shutting down");
                    break;
                }
            }
        }

        if let Some(task) = running {
            let result = task.await;
            self.finish_rebuild(result);
        }

        self.stats()
    }
}

async fn wait_for(task: &mut Option<RebuildTask>) -> Option<Result<anyhow::Result<()>, JoinError>> {
    match task {
        Some(handle) => Some(handle.await),
        None => None,
    }
}
