//! Project structure builder.
//!
//! Walks the watched root and produces the [`ProjectStructure`] written into
//! the output document. Root-level config, build and documentation files are
//! pulled out into their categories; everything else is nested by directory.

use crate::error::StructureError;
use crate::model::{CategoryEntry, Contents, DirectoryNode, FileNode, ProjectStructure};
use crate::options::StructureOptions;
use std::fs;
use std::path::Path;
use structwatch_core::Ignored;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Builds the structure section from the file system.
pub struct StructureBuilder<'a> {
    root: &'a Path,
    options: &'a StructureOptions,
    ignored: Ignored,
}

impl<'a> StructureBuilder<'a> {
    pub fn new(root: &'a Path, options: &'a StructureOptions, ignored: Ignored) -> Self {
        Self {
            root,
            options,
            ignored,
        }
    }

    /// Build the structure. Only a failure to read the root itself is an
    /// error; entries below it that vanish or cannot be read are skipped.
    pub fn build(&self) -> Result<ProjectStructure, StructureError> {
        fs::read_dir(self.root)?;

        let mut structure = ProjectStructure {
            root_path: self.root.display().to_string(),
            ..Default::default()
        };
        structure.file_categories.documentation.path = self.options.docs_dir.clone();

        let ignored = self.ignored.clone();
        let walker = WalkDir::new(self.root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| !ignored(e.path()));

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = ?e.path(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let path = self.relative(entry.path());
            let mut parents: Vec<String> = path.split('/').map(String::from).collect();
            let Some(name) = parents.pop() else {
                continue;
            };
            let is_dir = entry.file_type().is_dir();

            if parents.is_empty() && self.categorize(&mut structure, &name, is_dir) {
                continue;
            }

            let Some(target) = self.target(&mut structure, &parents) else {
                debug!(path = %path, "Parent not in structure, skipping");
                continue;
            };
            if is_dir {
                target.directories.insert(
                    name,
                    DirectoryNode {
                        path,
                        contents: Contents::default(),
                    },
                );
            } else {
                target.files.push(file_node(name, path));
            }
        }

        debug!(
            files = structure.contents.file_count(),
            directories = structure.contents.directories.len(),
            "Structure built"
        );

        Ok(structure)
    }

    /// Lift a root-level entry into the file categories. Returns true when
    /// the entry was taken.
    fn categorize(&self, structure: &mut ProjectStructure, name: &str, is_dir: bool) -> bool {
        let categories = &mut structure.file_categories;
        let listed = |names: &[String]| names.iter().any(|n| n == name);

        if is_dir {
            if name != self.options.docs_dir {
                return false;
            }
            categories.documentation.contents = Some(Contents::default());
        } else if listed(&self.options.config_files) {
            categories.config.push(CategoryEntry {
                path: name.to_string(),
            });
        } else if listed(&self.options.build_files) {
            categories.build.push(CategoryEntry {
                path: name.to_string(),
            });
        } else if listed(&self.options.doc_files) {
            categories
                .documentation
                .files
                .push(file_node(name.to_string(), name.to_string()));
        } else {
            return false;
        }
        true
    }

    /// Contents an entry below `parents` belongs in.
    fn target<'s>(
        &self,
        structure: &'s mut ProjectStructure,
        parents: &[String],
    ) -> Option<&'s mut Contents> {
        let (mut current, rest) = match parents.split_first() {
            Some((first, rest)) if *first == self.options.docs_dir => {
                (structure.file_categories.documentation.contents.as_mut()?, rest)
            }
            _ => (&mut structure.contents, parents),
        };
        for dir in rest {
            current = &mut current.directories.get_mut(dir)?.contents;
        }
        Some(current)
    }

    fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn file_node(name: String, path: String) -> FileNode {
    let extension = Path::new(&name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    FileNode {
        name,
        path,
        extension,
    }
}
