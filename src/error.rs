//! Error types for cbuild.
//!
//! Every failure is fatal to the current top-level command. Tool diagnostics are
//! echoed verbatim by the executor; the errors here only name what went wrong and where.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed, missing or out-of-domain build configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file does not exist: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to parse configuration '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing required option '{option}' in '{path}'")]
    MissingOption { option: &'static str, path: PathBuf },

    #[error("Invalid value '{value}' for option '{option}' in '{path}' (expected one of: {allowed})")]
    InvalidValue {
        option: &'static str,
        value: String,
        allowed: String,
        path: PathBuf,
    },

    #[error("Invalid value for {option} flags in '{path}' - must be a list of strings")]
    NotAList { option: &'static str, path: PathBuf },

    #[error("Failed to read tool registry '{path}': {message}")]
    Registry { path: PathBuf, message: String },

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tool resolution failures and tool invocations that did not produce their artifact.
#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("Unresolved paths for {toolchain} toolset: {}", tools.join(", "))]
    UnresolvedTools {
        toolchain: String,
        tools: Vec<String>,
    },

    #[error("{stage} failed: expected artifact '{artifact}' was not produced")]
    ArtifactMissing { stage: Stage, artifact: PathBuf },

    #[error("Failed to execute '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Executable '{path}' does not exist - compile the project first")]
    MissingExecutable { path: PathBuf },

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Problems with the project descriptor graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("No project descriptor in {dir}")]
    MissingDescriptor { dir: PathBuf },

    #[error("Invalid project descriptor '{path}': {message}")]
    InvalidDescriptor { path: PathBuf, message: String },

    #[error("Dependency cycle detected: {}", cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    #[error("Project '{parent}' depends on binary project '{dependency}'")]
    BinaryDependency { parent: String, dependency: String },

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The step of a node's evaluation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scan,
    Compile,
    Package,
    Link,
    Clear,
    Run,
    Debug,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scan => "scan",
            Stage::Compile => "compilation",
            Stage::Package => "packaging",
            Stage::Link => "linking",
            Stage::Clear => "clear",
            Stage::Run => "run",
            Stage::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Umbrella error returned by the orchestrator surface.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Project '{name}' is a library and cannot be {action}")]
    NotExecutable { name: String, action: &'static str },

    #[error("{stage} failed for project '{node}': {source}")]
    Stage {
        node: String,
        stage: Stage,
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Tag an error with the node and stage it came from, unless a deeper node already did.
    pub fn at(self, node: &str, stage: Stage) -> Self {
        match self {
            tagged @ BuildError::Stage { .. } => tagged,
            other => BuildError::Stage {
                node: node.to_string(),
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping stage tags.
    pub fn root_cause(&self) -> &BuildError {
        match self {
            BuildError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
