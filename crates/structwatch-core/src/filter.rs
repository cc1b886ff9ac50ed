//! Ignore predicate built from gitignore-style patterns.

use crate::error::EngineError;
use crate::scanner::Ignored;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Patterns skipped when no others are configured.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    ".DS_Store",
    "node_modules",
    "dist",
    ".svelte-kit",
    "coverage",
    "build",
];

/// Gitignore-style path filter rooted at the watched directory.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    matcher: Gitignore,
}

impl PathFilter {
    /// Build a filter from glob patterns, relative to `root`.
    pub fn new<I, S>(root: &Path, patterns: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns {
            builder.add_line(None, pattern.as_ref())?;
        }

        Ok(Self {
            root: root.to_path_buf(),
            matcher: builder.build()?,
        })
    }

    /// Filter with [`DEFAULT_IGNORE_PATTERNS`].
    pub fn with_defaults(root: &Path) -> Result<Self, EngineError> {
        Self::new(root, DEFAULT_IGNORE_PATTERNS.iter().copied())
    }

    /// True when `path` or any of its parents matches a pattern.
    ///
    /// Paths outside the root are never ignored.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            if path.is_relative() {
                return self.matches(path);
            }
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }
        self.matches(relative)
    }

    fn matches(&self, relative: &Path) -> bool {
        let is_dir = self.root.join(relative).is_dir();
        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }

    /// Share the filter as the predicate the engine and watcher take.
    pub fn into_predicate(self) -> Ignored {
        Arc::new(move |path: &Path| self.is_ignored(path))
    }
}
