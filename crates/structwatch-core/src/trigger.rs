//! Debounced rebuild trigger.
//!
//! Any number of changes inside the debounce window collapse into one call of
//! the rebuild callback. A rebuild is never started while another one runs;
//! a fire during a run is remembered and replayed once the run completes.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Callback invoked once per debounced burst of changes.
///
/// Errors are logged by the engine and otherwise ignored.
#[async_trait]
pub trait Rebuild: Send + Sync + 'static {
    async fn rebuild(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Rebuild for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn rebuild(&self) -> anyhow::Result<()> {
        (self)().await
    }
}

/// Whether a rebuild is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Running,
}

/// Single-flight debounce state machine.
///
/// Pure state; the engine owns the timer and the running task and reports
/// back through [`fire`](Self::fire) and [`complete`](Self::complete).
#[derive(Debug)]
pub struct DebouncedTrigger {
    delay: Duration,
    state: TriggerState,
    deadline: Option<Instant>,
    rerun: bool,
    runs: u64,
}

impl DebouncedTrigger {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: TriggerState::Idle,
            deadline: None,
            rerun: false,
            runs: 0,
        }
    }

    /// Note a change, restarting the debounce window.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
        trace!(state = ?self.state, "Rebuild scheduled");
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn rerun_pending(&self) -> bool {
        self.rerun
    }

    /// Number of rebuilds started so far.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Advance past the deadline. Returns true when the caller must start
    /// a rebuild now.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => self.deadline = None,
            _ => return false,
        }

        match self.state {
            TriggerState::Idle => {
                self.state = TriggerState::Running;
                self.runs += 1;
                true
            }
            TriggerState::Running => {
                self.rerun = true;
                false
            }
        }
    }

    /// Report the end of a rebuild, successful or not.
    pub fn complete(&mut self, now: Instant) {
        self.state = TriggerState::Idle;
        if std::mem::take(&mut self.rerun) && self.deadline.is_none() {
            self.schedule(now);
        }
    }
}
