//! Structure generator options.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the structure document goes and how root files are categorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureOptions {
    /// Output file, relative to the watched root unless absolute
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Dotted key path of the section to replace in the output document
    #[serde(default = "default_section")]
    pub section: String,

    /// Root-level files listed under `file_categories.config`
    #[serde(default = "default_config_files")]
    pub config_files: Vec<String>,

    /// Root-level files listed under `file_categories.build`
    #[serde(default = "default_build_files")]
    pub build_files: Vec<String>,

    /// Root-level files listed under `file_categories.documentation`
    #[serde(default = "default_doc_files")]
    pub doc_files: Vec<String>,

    /// Root-level directory described as documentation contents
    #[serde(default = "default_docs_dir")]
    pub docs_dir: String,
}

fn default_output() -> PathBuf {
    PathBuf::from(".cursorrules")
}

fn default_section() -> String {
    "technical_requirements.project_structure".to_string()
}

fn default_config_files() -> Vec<String> {
    [
        ".env",
        ".prettierrc",
        "vite.config.js",
        "svelte.config.js",
        "tailwind.config.js",
        "postcss.config.cjs",
        "jsconfig.json",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_build_files() -> Vec<String> {
    vec!["package.json".to_string(), "package-lock.json".to_string()]
}

fn default_doc_files() -> Vec<String> {
    vec!["README.md".to_string()]
}

fn default_docs_dir() -> String {
    "docs".to_string()
}

impl Default for StructureOptions {
    fn default() -> Self {
        Self {
            output: default_output(),
            section: default_section(),
            config_files: default_config_files(),
            build_files: default_build_files(),
            doc_files: default_doc_files(),
            docs_dir: default_docs_dir(),
        }
    }
}

impl StructureOptions {
    /// Section key path split into its parts.
    pub fn section_keys(&self) -> Vec<&str> {
        self.section.split('.').filter(|k| !k.is_empty()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = StructureOptions::default();
        assert_eq!(options.output, PathBuf::from(".cursorrules"));
        assert_eq!(
            options.section_keys(),
            vec!["technical_requirements", "project_structure"]
        );
        assert!(options.build_files.contains(&"package.json".to_string()));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let options: StructureOptions = serde_yaml::from_str("output: docs/tree.yaml\n").unwrap();
        assert_eq!(options.output, PathBuf::from("docs/tree.yaml"));
        assert_eq!(options.docs_dir, "docs");
    }
}
