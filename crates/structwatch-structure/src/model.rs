//! Serialized shape of the project structure section.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A file entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    /// Extension including the leading dot, empty when there is none
    pub extension: String,
}

/// A root file listed in a category by path only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub path: String,
}

/// Directories keyed by name plus the files of one level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contents {
    #[serde(default)]
    pub directories: BTreeMap<String, DirectoryNode>,
    #[serde(default)]
    pub files: Vec<FileNode>,
}

impl Contents {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }

    /// Number of files at this level and below.
    pub fn file_count(&self) -> usize {
        self.files.len()
            + self
                .directories
                .values()
                .map(|d| d.contents.file_count())
                .sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub path: String,
    pub contents: Contents,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    pub path: String,
    #[serde(default)]
    pub files: Vec<FileNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Contents>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCategories {
    #[serde(default)]
    pub config: Vec<CategoryEntry>,
    #[serde(default)]
    pub build: Vec<CategoryEntry>,
    #[serde(default)]
    pub documentation: Documentation,
}

/// Everything written under the structure section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStructure {
    pub root_path: String,
    pub file_categories: FileCategories,
    #[serde(flatten)]
    pub contents: Contents,
}
