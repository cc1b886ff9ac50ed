//! Structure generator error types.

use thiserror::Error;

/// Errors that can occur while generating the structure document.
#[derive(Debug, Error)]
pub enum StructureError {
    /// I/O error while reading the tree or writing the output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Section key path is empty
    #[error("Invalid section path: {0:?}")]
    InvalidSection(String),
}
