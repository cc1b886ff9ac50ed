//! Tree walker used by the initial index and the reconciliation scan.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Caller-supplied ignore predicate. Returns true for paths to skip.
pub type Ignored = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Everything a walk found, plus the subtrees it could not read.
#[derive(Debug, Default, Clone)]
pub struct LiveTree {
    pub files: HashSet<PathBuf>,
    pub dirs: HashSet<PathBuf>,
    /// Paths whose read failed. Nothing under them may be treated as gone.
    pub skipped: Vec<PathBuf>,
}

impl LiveTree {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    /// Directories then files, each sorted, so parents come before children.
    pub fn sorted(&self) -> (Vec<&PathBuf>, Vec<&PathBuf>) {
        let mut dirs: Vec<_> = self.dirs.iter().collect();
        let mut files: Vec<_> = self.files.iter().collect();
        dirs.sort();
        files.sort();
        (dirs, files)
    }
}

/// Walks the watched tree, applying the ignore predicate.
#[derive(Clone)]
pub struct Scanner {
    root: PathBuf,
    ignored: Ignored,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner").field("root", &self.root).finish()
    }
}

impl Scanner {
    pub fn new(root: &Path, ignored: Ignored) -> Self {
        Self {
            root: root.to_path_buf(),
            ignored,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the whole tree below the root. Blocking.
    pub fn walk(&self) -> LiveTree {
        self.walk_from(&self.root)
    }

    /// Walk everything below `dir`, excluding `dir` itself. Blocking.
    ///
    /// Read failures are logged and recorded in [`LiveTree::skipped`]; the
    /// rest of the walk goes on.
    pub fn walk_from(&self, dir: &Path) -> LiveTree {
        let mut tree = LiveTree::default();
        let ignored = self.ignored.clone();

        let walker = WalkDir::new(dir)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_entry(move |e| !ignored(e.path()));

        for result in walker {
            match result {
                Ok(entry) => {
                    if entry.file_type().is_dir() {
                        tree.dirs.insert(entry.into_path());
                    } else {
                        tree.files.insert(entry.into_path());
                    }
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                    warn!(path = %path.display(), error = %e, "Skipping unreadable subtree");
                    tree.skipped.push(path);
                }
            }
        }

        debug!(
            root = %dir.display(),
            files = tree.files.len(),
            dirs = tree.dirs.len(),
            skipped = tree.skipped.len(),
            "Walk complete"
        );

        tree
    }
}
