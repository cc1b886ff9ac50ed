//! structwatch structure generator
//!
//! Writes a YAML description of the watched tree into a section of an
//! existing document. This is the rebuild action the CLI runs after changes.

mod builder;
mod error;
pub mod model;
mod options;
mod writer;

pub use builder::StructureBuilder;
pub use error::StructureError;
pub use model::{Contents, DirectoryNode, FileNode, ProjectStructure};
pub use options::StructureOptions;
pub use writer::StructureWriter;
