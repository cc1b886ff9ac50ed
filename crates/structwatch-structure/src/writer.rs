//! Structure document writer.
//!
//! Loads the existing output document, replaces the structure section and
//! writes the document back. Keys outside the section are left alone.

use crate::builder::StructureBuilder;
use crate::error::StructureError;
use crate::model::ProjectStructure;
use crate::options::StructureOptions;
use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use structwatch_core::{Ignored, Rebuild};
use tracing::{debug, info, warn};

/// Regenerates the structure section of one output document.
#[derive(Clone)]
pub struct StructureWriter {
    root: PathBuf,
    options: StructureOptions,
    ignored: Ignored,
}

impl std::fmt::Debug for StructureWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructureWriter")
            .field("root", &self.root)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl StructureWriter {
    pub fn new(root: impl Into<PathBuf>, options: StructureOptions, ignored: Ignored) -> Self {
        Self {
            root: root.into(),
            options,
            ignored,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output document path.
    pub fn output_path(&self) -> PathBuf {
        if self.options.output.is_absolute() {
            self.options.output.clone()
        } else {
            self.root.join(&self.options.output)
        }
    }

    /// Build the structure and write it into the output document.
    pub fn write(&self) -> Result<ProjectStructure, StructureError> {
        let keys = self.options.section_keys();
        if keys.is_empty() {
            return Err(StructureError::InvalidSection(self.options.section.clone()));
        }

        let structure = StructureBuilder::new(&self.root, &self.options, self.ignored.clone()).build()?;

        let output = self.output_path();
        let mut document = load_document(&output);
        set_section(&mut document, &keys, serde_yaml::to_value(&structure)?);

        let yaml = serde_yaml::to_string(&document)?;
        fs::write(&output, yaml)?;

        info!(
            path = %output.display(),
            files = structure.contents.file_count(),
            "Structure updated"
        );
        Ok(structure)
    }
}

#[async_trait]
impl Rebuild for StructureWriter {
    async fn rebuild(&self) -> anyhow::Result<()> {
        let writer = self.clone();
        tokio::task::spawn_blocking(move || writer.write()).await??;
        Ok(())
    }
}

/// Existing document, or an empty mapping when it is missing or unusable.
fn load_document(path: &Path) -> Value {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Creating new structure document");
            return Value::Mapping(Mapping::new());
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read structure document, starting fresh");
            return Value::Mapping(Mapping::new());
        }
    };

    match serde_yaml::from_str::<Value>(&content) {
        Ok(value @ Value::Mapping(_)) => value,
        Ok(Value::Null) => Value::Mapping(Mapping::new()),
        Ok(_) => {
            warn!(path = %path.display(), "Structure document is not a mapping, starting fresh");
            Value::Mapping(Mapping::new())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot parse structure document, starting fresh");
            Value::Mapping(Mapping::new())
        }
    }
}

/// Replace the value at `keys`, creating intermediate mappings as needed.
fn set_section(document: &mut Value, keys: &[&str], value: Value) {
    let Some((first, rest)) = keys.split_first() else {
        *document = value;
        return;
    };

    if !document.is_mapping() {
        *document = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = document {
        let key = Value::String((*first).to_string());
        if !map.contains_key(&key) {
            map.insert(key.clone(), Value::Null);
        }
        if let Some(child) = map.get_mut(&key) {
            set_section(child, rest, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn writer(root: &Path) -> StructureWriter {
        StructureWriter::new(root, StructureOptions::default(), Arc::new(|_: &Path| false))
    }

    fn read(path: &Path) -> Value {
        serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_set_section_creates_path() {
        let mut doc = Value::Mapping(Mapping::new());
        set_section(&mut doc, &["a", "b"], Value::from(1));
        assert_eq!(doc["a"]["b"], Value::from(1));
    }

    #[test]
    fn test_set_section_replaces_scalar_parent() {
        let mut doc: Value = serde_yaml::from_str("a: 5\nkeep: true\n").unwrap();
        set_section(&mut doc, &["a", "b"], Value::from("x"));
        assert_eq!(doc["a"]["b"], Value::from("x"));
        assert_eq!(doc["keep"], Value::from(true));
    }

    #[test]
    fn test_write_creates_document() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("main.js"), "").unwrap();

        let writer = writer(temp_dir.path());
        writer.write().unwrap();

        let doc = read(&writer.output_path());
        let files = &doc["technical_requirements"]["project_structure"]["files"];
        assert_eq!(files[0]["name"], Value::from("main.js"));
    }

    #[test]
    fn test_write_preserves_other_keys() {
        let temp_dir = tempdir().unwrap();
        let output = temp_dir.path().join(".cursorrules");
        fs::write(
            &output,
            "project: demo\ntechnical_requirements:\n  language: js\n  project_structure: old\n",
        )
        .unwrap();

        writer(temp_dir.path()).write().unwrap();

        let doc = read(&output);
        assert_eq!(doc["project"], Value::from("demo"));
        assert_eq!(doc["technical_requirements"]["language"], Value::from("js"));
        assert!(doc["technical_requirements"]["project_structure"].is_mapping());
    }

    #[test]
    fn test_invalid_document_is_replaced() {
        let temp_dir = tempdir().unwrap();
        let output = temp_dir.path().join(".cursorrules");
        fs::write(&output, "key: [unclosed\n").unwrap();

        writer(temp_dir.path()).write().unwrap();

        let doc = read(&output);
        assert!(doc["technical_requirements"]["project_structure"].is_mapping());
    }

    #[test]
    fn test_empty_section_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let options = StructureOptions {
            section: ".".to_string(),
            ..Default::default()
        };
        let writer = StructureWriter::new(temp_dir.path(), options, Arc::new(|_: &Path| false));
        assert!(matches!(writer.write(), Err(StructureError::InvalidSection(_))));
    }

    #[tokio::test]
    async fn test_rebuild_writes_output() {
        let temp_dir = tempdir().unwrap();
        let writer = writer(temp_dir.path());

        writer.rebuild().await.unwrap();
        assert!(writer.output_path().exists());
    }
}
