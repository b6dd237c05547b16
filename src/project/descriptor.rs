//! Project descriptors (`cproj.toml`).
//!
//! A descriptor is plain data: loading one never runs code and never touches
//! orchestrator state.
//!
//! ```toml
//! [project]
//! name = "App"
//! kind = "binary"
//! dependencies = ["../Lib"]
//!
//! [files]
//! sources = ["private/Entry.cpp"]
//!
//! [build]
//! defines = ["APP_MAIN"]
//! libraries = ["pthread"]
//! ```

use crate::error::GraphError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DESCRIPTOR_FILE: &str = "cproj.toml";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Library,
    Binary,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Descriptor {
    pub project: ProjectSection,
    #[serde(default)]
    pub files: FilesSection,
    #[serde(default)]
    pub build: BuildSection,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProjectSection {
    pub name: String,
    pub kind: ProjectKind,
    /// Dependency project directories, relative to this project.
    #[serde(default)]
    pub dependencies: Vec<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FilesSection {
    /// Explicit sources; discovered from the project tree when omitted.
    pub sources: Option<Vec<PathBuf>>,
    /// Explicit headers; discovered from the project tree when omitted.
    pub headers: Option<Vec<PathBuf>>,
    #[serde(default = "default_public")]
    pub public: Vec<PathBuf>,
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            sources: None,
            headers: None,
            public: default_public(),
            ignore: default_ignore(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct BuildSection {
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub library_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub libraries: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
}

fn default_public() -> Vec<PathBuf> {
    ["public", "inc", "include"].iter().map(PathBuf::from).collect()
}

fn default_ignore() -> Vec<String> {
    vec!["tmp".to_string(), "temp".to_string(), "ignore".to_string()]
}

impl Descriptor {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(DESCRIPTOR_FILE)
    }

    /// Read the descriptor of the project rooted at `dir`.
    pub fn load(dir: &Path) -> Result<Self, GraphError> {
        let path = Self::path_in(dir);
        if !path.is_file() {
            return Err(GraphError::MissingDescriptor {
                dir: dir.to_path_buf(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| GraphError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content, &path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, GraphError> {
        let descriptor: Descriptor =
            toml::from_str(content).map_err(|e| GraphError::InvalidDescriptor {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if descriptor.project.name.trim().is_empty() {
            return Err(GraphError::InvalidDescriptor {
                path: path.to_path_buf(),
                message: "project name must not be empty".to_string(),
            });
        }
        Ok(descriptor)
    }
}
