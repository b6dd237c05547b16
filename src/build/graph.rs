//! Project graph loading.
//!
//! Descriptors are resolved recursively from the root directory into an arena of
//! [`ProjectNode`]s addressed by [`NodeId`]. The graph owns every node; edges are
//! plain indices. Projects are identified by canonical directory, so a dependency
//! shared by several parents is loaded once. Cycles are rejected while loading,
//! before any tool can run.

use crate::config::BuildConfiguration;
use crate::error::GraphError;
use crate::project::{Descriptor, NodeId, ProjectKind, ProjectNode};
use crate::toolchain::Platform;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ProjectGraph {
    nodes: Vec<ProjectNode>,
    root: NodeId,
}

/// Libraries and search directories a node contributes to a link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInputs {
    pub libraries: Vec<String>,
    pub library_dirs: Vec<PathBuf>,
}

impl LinkInputs {
    fn extend(&mut self, other: LinkInputs) {
        self.libraries.extend(other.libraries);
        self.library_dirs.extend(other.library_dirs);
    }
}

struct Loader {
    nodes: Vec<ProjectNode>,
    by_dir: HashMap<PathBuf, NodeId>,
    /// Projects currently being loaded, outermost first.
    stack: Vec<(PathBuf, String)>,
}

impl ProjectGraph {
    /// Load the project rooted at `dir` and everything it depends on.
    pub fn load(dir: &Path) -> Result<Self, GraphError> {
        let mut loader = Loader {
            nodes: Vec::new(),
            by_dir: HashMap::new(),
            stack: Vec::new(),
        };
        let root = loader.load(dir)?;
        Ok(Self {
            nodes: loader.nodes,
            root,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &ProjectNode {
        &self.nodes[id.0]
    }

    pub fn root_node(&self) -> &ProjectNode {
        self.node(self.root)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Own public directories first, then the transitive dependency directories.
    pub fn public_includes(&self, id: NodeId) -> Vec<PathBuf> {
        let node = self.node(id);
        let mut includes: Vec<PathBuf> = node.public_include_dirs().collect();
        for dep in &node.dependencies {
            includes.extend(self.public_includes(*dep));
        }
        includes
    }

    /// What linking against `id` requires: its own static library (libraries only),
    /// its extra libraries, then the same for every dependency.
    pub fn exported_libraries(
        &self,
        id: NodeId,
        config: &BuildConfiguration,
        platform: Platform,
    ) -> LinkInputs {
        let node = self.node(id);
        let mut inputs = LinkInputs::default();
        if node.kind == ProjectKind::Library {
            inputs.libraries.push(platform.static_lib_name(&node.name));
            inputs.library_dirs.push(node.lib_dir(config));
        }
        inputs.libraries.extend(node.libraries.iter().cloned());
        inputs.library_dirs.extend(node.library_dirs.iter().cloned());
        for dep in &node.dependencies {
            inputs.extend(self.exported_libraries(*dep, config, platform));
        }
        inputs
    }

    /// Link inputs for building `id` itself: never its own library.
    pub fn link_inputs(
        &self,
        id: NodeId,
        config: &BuildConfiguration,
        platform: Platform,
    ) -> LinkInputs {
        let node = self.node(id);
        let mut inputs = LinkInputs {
            libraries: node.libraries.clone(),
            library_dirs: node.library_dirs.clone(),
        };
        for dep in &node.dependencies {
            inputs.extend(self.exported_libraries(*dep, config, platform));
        }
        inputs
    }
}

impl Loader {
    fn load(&mut self, dir: &Path) -> Result<NodeId, GraphError> {
        let canonical = fs::canonicalize(dir).map_err(|_| GraphError::MissingDescriptor {
            dir: dir.to_path_buf(),
        })?;

        if let Some(pos) = self.stack.iter().position(|(d, _)| *d == canonical) {
            let mut cycle: Vec<String> = self.stack[pos..]
                .iter()
                .map(|(_, name)| name.clone())
                .collect();
            cycle.push(self.stack[pos].1.clone());
            return Err(GraphError::Cycle { cycle });
        }
        if let Some(id) = self.by_dir.get(&canonical) {
            return Ok(*id);
        }

        let descriptor = Descriptor::load(&canonical)?;
        let mut node = ProjectNode::from_descriptor(&canonical, descriptor);
        tracing::debug!(
            project = %node.name,
            dir = %canonical.display(),
            sources = node.sources.len(),
            headers = node.headers.len(),
            "loaded project descriptor"
        );

        self.stack.push((canonical.clone(), node.name.clone()));
        let mut dependencies = Vec::with_capacity(node.dependency_dirs.len());
        for dep_dir in &node.dependency_dirs {
            let dep = self.load(dep_dir)?;
            let dep_node = &self.nodes[dep.0];
            if dep_node.kind == ProjectKind::Binary {
                return Err(GraphError::BinaryDependency {
                    parent: node.name.clone(),
                    dependency: dep_node.name.clone(),
                });
            }
            dependencies.push(dep);
        }
        self.stack.pop();

        node.dependencies = dependencies;
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.by_dir.insert(canonical, id);
        Ok(id)
    }
}
