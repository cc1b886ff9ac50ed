//! Engine error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while setting up or driving the engine.
///
/// None of these are raised for the ordinary races of a live tree (an entry
/// vanishing between event and stat, an unreadable subdirectory during a
/// scan); those are logged and absorbed where they happen.
#[derive(Debug, Error)]
pub enum EngineError {
    /// File watcher error
    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Invalid ignore pattern
    #[error("Invalid ignore pattern: {0}")]
    Pattern(#[from] ignore::Error),

    /// Path not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::NotFound(PathBuf::from("/test/path"));
        assert!(err.to_string().contains("/test/path"));
    }

    #[test]
    fn test_watcher_error_conversion() {
        let err: EngineError = notify::Error::generic("inotify limit reached").into();
        assert!(matches!(err, EngineError::Watcher(_)));
        assert!(err.to_string().contains("inotify limit reached"));
    }
}
