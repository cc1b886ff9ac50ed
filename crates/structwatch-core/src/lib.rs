//! structwatch core
//!
//! Turns raw filesystem notifications into create, delete and move events
//! for files and directories:
//! - Name-keyed index of everything under the watched root
//! - Move correlation between removals and later creations
//! - Debounced, single-flight rebuild trigger
//! - Periodic reconciliation scan for notifications the watcher dropped

mod config;
pub mod correlator;
mod engine;
mod error;
pub mod event;
mod filter;
pub mod index;
pub mod ledger;
pub mod router;
pub mod scanner;
pub mod trigger;
pub mod watcher;

pub use config::EngineConfig;
pub use engine::{Engine, EngineStats};
pub use error::EngineError;
pub use event::{ChangeKind, EntryKind, Notification, RawEvent, RawKind};
pub use filter::{PathFilter, DEFAULT_IGNORE_PATTERNS};
pub use index::{EntryIndex, EntryRecord, Identity};
pub use ledger::{PendingRemoval, RemovalLedger};
pub use scanner::{Ignored, LiveTree, Scanner};
pub use trigger::{DebouncedTrigger, Rebuild, TriggerState};
pub use watcher::FsWatcher;
