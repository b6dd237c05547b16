//! Startup probing for tool paths.
//!
//! Produces the [`ToolRegistry`] handed to the orchestrator. Two sources are supported:
//! an explicit TOML file mapping tool names to paths per toolchain, or a `PATH` search.
//!
//! ```toml
//! [llvm]
//! "clang++" = "/usr/bin/clang++"
//! llvm-ar = "/usr/bin/llvm-ar"
//! lldb = "/usr/bin/lldb"
//! ```

use super::types::{ToolRegistry, ToolVerdict, ToolchainKind};
use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default registry location: `~/.cbuild/tools.toml`.
pub fn default_registry_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cbuild")
        .join("tools.toml")
}

/// Read a registry file. Listed paths that do not exist are recorded as unresolved.
pub fn load_registry(path: &Path) -> Result<ToolRegistry, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_registry(&content, path)
}

pub fn parse_registry(content: &str, path: &Path) -> Result<ToolRegistry, ConfigError> {
    let table: BTreeMap<String, BTreeMap<String, PathBuf>> =
        toml::from_str(content).map_err(|e| ConfigError::Registry {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut registry = ToolRegistry::new();
    for (toolchain, tools) in table {
        let Some(kind) = ToolchainKind::parse(&toolchain) else {
            tracing::warn!(toolchain = %toolchain, "ignoring unknown toolchain in registry");
            continue;
        };
        for (tool, tool_path) in tools {
            let verdict = if tool_path.is_file() {
                ToolVerdict::Resolved(tool_path)
            } else {
                tracing::debug!(tool = %tool, path = %tool_path.display(), "tool path does not exist");
                ToolVerdict::Unresolved
            };
            registry = registry.with_tool(kind, &tool, verdict);
        }
    }
    Ok(registry)
}

/// Look every known tool up on `PATH`.
pub fn probe_path() -> ToolRegistry {
    let dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect())
        .unwrap_or_default();
    probe_dirs(&dirs)
}

/// Look every known tool up in `dirs`, first match wins.
pub fn probe_dirs(dirs: &[PathBuf]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for kind in ToolchainKind::ALL {
        for tool in kind.tools().names() {
            let verdict = dirs
                .iter()
                .flat_map(|dir| candidates(dir, tool))
                .find(|candidate| candidate.is_file())
                .map(ToolVerdict::Resolved)
                .unwrap_or(ToolVerdict::Unresolved);
            registry = registry.with_tool(kind, tool, verdict);
        }
    }
    registry
}

fn candidates(dir: &Path, tool: &str) -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![dir.join(format!("{tool}.exe")), dir.join(tool)]
    } else {
        vec![dir.join(tool)]
    }
}

/// Registry from `explicit`, else the default file if it exists, else a `PATH` search.
pub fn discover(explicit: Option<&Path>) -> Result<ToolRegistry, ConfigError> {
    if let Some(path) = explicit {
        return load_registry(path);
    }
    let default = default_registry_path();
    if default.exists() {
        load_registry(&default)
    } else {
        Ok(probe_path())
    }
}
