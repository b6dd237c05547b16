//! Project model: descriptors and the nodes built from them.

mod descriptor;
mod node;

pub use descriptor::{
    BuildSection, DESCRIPTOR_FILE, Descriptor, FilesSection, ProjectKind, ProjectSection,
};
pub use node::{NodeId, ProjectNode, Staleness, discover_files, modified, newer};
