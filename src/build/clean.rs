//! Build artifact cleanup.
//!
//! Clearing removes one node's per-configuration temp, bin and lib directories.
//! Dependencies keep their outputs; they are only re-evaluated on the next compile.

use crate::config::BuildConfiguration;
use crate::error::{BuildError, Stage};
use crate::project::ProjectNode;
use colored::*;
use std::fs;
use std::path::PathBuf;

/// Remove `node`'s outputs for `config`, returning the directories that existed.
pub fn clear_node(
    node: &ProjectNode,
    config: &BuildConfiguration,
) -> Result<Vec<PathBuf>, BuildError> {
    let mut removed = Vec::new();
    for dir in [
        node.temp_dir(config),
        node.bin_dir(config),
        node.lib_dir(config),
    ] {
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .map_err(|e| BuildError::io(&dir, e).at(&node.name, Stage::Clear))?;
            tracing::debug!(project = %node.name, dir = %dir.display(), "removed");
            removed.push(dir);
        }
    }

    if removed.is_empty() {
        println!("{} Nothing to clear for {}", "!".yellow(), node.name.bold());
    } else {
        println!(
            "{} Cleared {} ({})",
            "✓".green(),
            node.name.bold(),
            config.name
        );
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Descriptor;

    #[test]
    fn test_clear_removes_only_own_partition() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let descriptor = Descriptor::parse(
            "[project]\nname = \"Core\"\nkind = \"library\"\n[files]\nsources = []\nheaders = []\n",
            &dir.join("cproj.toml"),
        )
        .unwrap();
        let node = ProjectNode::from_descriptor(dir, descriptor);
        let release = BuildConfiguration::default();
        let debug = BuildConfiguration {
            name: "Debug".into(),
            ..Default::default()
        };

        for config in [&release, &debug] {
            fs::create_dir_all(node.temp_dir(config)).unwrap();
            fs::create_dir_all(node.lib_dir(config)).unwrap();
        }

        let removed = clear_node(&node, &release).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!node.temp_dir(&release).exists());
        assert!(!node.lib_dir(&release).exists());
        assert!(node.temp_dir(&debug).exists());
        assert!(node.lib_dir(&debug).exists());

        assert!(clear_node(&node, &release).unwrap().is_empty());
    }
}
