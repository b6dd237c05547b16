use super::descriptor::{DESCRIPTOR_FILE, Descriptor, ProjectKind};
use crate::config::BuildConfiguration;
use crate::error::BuildError;
use crate::toolchain::Platform;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

const SOURCE_EXTENSIONS: [&str; 4] = ["c", "cc", "cpp", "cxx"];
const HEADER_EXTENSIONS: [&str; 4] = ["h", "hh", "hpp", "hxx"];

pub const BIN_DIR: &str = "bin";
pub const LIB_DIR: &str = "lib";
pub const TEMP_DIR: &str = "tmp";

/// Index of a node inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A buildable unit: sources, headers, dependency edges and output layout.
///
/// File lists are relative to `dir`; every filesystem access joins them onto `dir`
/// explicitly, so evaluating one node never changes how another resolves paths.
#[derive(Debug, Clone)]
pub struct ProjectNode {
    pub name: String,
    pub kind: ProjectKind,
    /// Absolute project directory.
    pub dir: PathBuf,
    pub descriptor: PathBuf,
    pub sources: Vec<PathBuf>,
    pub headers: Vec<PathBuf>,
    pub public_dirs: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub flags: Vec<String>,
    /// Dependency directories as written in the descriptor, joined onto `dir`.
    pub dependency_dirs: Vec<PathBuf>,
    /// Resolved dependency edges, filled in by the graph loader.
    pub dependencies: Vec<NodeId>,
}

/// Timestamp comparison of a node's inputs against its last successful build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Staleness {
    /// Modification time of the primary output; `None` when never built.
    pub success_time: Option<SystemTime>,
    pub api_changed: bool,
    pub src_changed: bool,
    /// The descriptor (or, for binaries, the configuration file) is newer than the output.
    pub definition_changed: bool,
}

impl ProjectNode {
    /// Build a node from its descriptor. `dir` must be absolute.
    pub fn from_descriptor(dir: &Path, descriptor: Descriptor) -> Self {
        let Descriptor {
            project,
            files,
            build,
        } = descriptor;

        let (sources, headers) = match (files.sources, files.headers) {
            (Some(sources), Some(headers)) => (sources, headers),
            (sources, headers) => {
                let (found_sources, found_headers) = discover_files(dir, &files.ignore);
                (
                    sources.unwrap_or(found_sources),
                    headers.unwrap_or(found_headers),
                )
            }
        };

        Self {
            name: project.name,
            kind: project.kind,
            dir: dir.to_path_buf(),
            descriptor: Descriptor::path_in(dir),
            sources,
            headers,
            public_dirs: files.public,
            defines: build.defines,
            include_dirs: build.include_dirs.iter().map(|p| dir.join(p)).collect(),
            library_dirs: build.library_dirs.iter().map(|p| dir.join(p)).collect(),
            libraries: build.libraries,
            flags: build.flags,
            dependency_dirs: project.dependencies.iter().map(|p| dir.join(p)).collect(),
            dependencies: Vec::new(),
        }
    }

    fn partition(&self, config: &BuildConfiguration) -> String {
        format!("{}-{}", self.name, config.name)
    }

    pub fn bin_dir(&self, config: &BuildConfiguration) -> PathBuf {
        self.dir.join(BIN_DIR).join(self.partition(config))
    }

    pub fn lib_dir(&self, config: &BuildConfiguration) -> PathBuf {
        self.dir.join(LIB_DIR).join(self.partition(config))
    }

    pub fn temp_dir(&self, config: &BuildConfiguration) -> PathBuf {
        self.dir
            .join(LIB_DIR)
            .join(TEMP_DIR)
            .join(self.partition(config))
    }

    pub fn static_library(&self, config: &BuildConfiguration, platform: Platform) -> PathBuf {
        self.lib_dir(config)
            .join(platform.static_lib_name(&self.name))
    }

    pub fn executable(&self, config: &BuildConfiguration, platform: Platform) -> PathBuf {
        self.bin_dir(config).join(platform.exe_name(&self.name))
    }

    /// The artifact whose timestamp marks the last successful build.
    pub fn primary_output(&self, config: &BuildConfiguration, platform: Platform) -> PathBuf {
        match self.kind {
            ProjectKind::Binary => self.executable(config, platform),
            ProjectKind::Library => self.static_library(config, platform),
        }
    }

    /// Object file for `source`: its relative path mirrored under the temp dir.
    pub fn object_path(&self, source: &Path, config: &BuildConfiguration) -> PathBuf {
        self.temp_dir(config)
            .join(mirror(source))
            .with_extension("o")
    }

    pub fn objects(&self, config: &BuildConfiguration) -> Vec<PathBuf> {
        self.sources
            .iter()
            .map(|s| self.object_path(s, config))
            .collect()
    }

    pub fn public_include_dirs(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.public_dirs.iter().map(|p| self.dir.join(p))
    }

    /// Compare inputs against the primary output.
    pub fn staleness(
        &self,
        config: &BuildConfiguration,
        platform: Platform,
    ) -> Result<Staleness, BuildError> {
        let output = self.primary_output(config, platform);
        let success_time = if output.exists() {
            Some(modified(&output)?)
        } else {
            None
        };

        let api_changed = self.any_newer(&self.headers, success_time)?;
        let src_changed = self.any_newer(&self.sources, success_time)?;
        let mut definition_changed = newer(&self.descriptor, success_time)?;
        if self.kind == ProjectKind::Binary
            && let Some(origin) = &config.origin
            && origin.exists()
        {
            definition_changed |= newer(origin, success_time)?;
        }

        Ok(Staleness {
            success_time,
            api_changed,
            src_changed,
            definition_changed,
        })
    }

    fn any_newer(&self, files: &[PathBuf], since: Option<SystemTime>) -> Result<bool, BuildError> {
        for file in files {
            if newer(&self.dir.join(file), since)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether `source` must be recompiled given the node-wide verdict.
    pub fn source_is_stale(
        &self,
        source: &Path,
        object: &Path,
        forced: bool,
        since: Option<SystemTime>,
    ) -> Result<bool, BuildError> {
        if forced || !object.exists() {
            return Ok(true);
        }
        newer(&self.dir.join(source), since)
    }
}

pub fn modified(path: &Path) -> Result<SystemTime, BuildError> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| BuildError::io(path, e))
}

/// `path` was modified after `since`; everything is newer than "never built".
pub fn newer(path: &Path, since: Option<SystemTime>) -> Result<bool, BuildError> {
    match since {
        None => Ok(true),
        Some(time) => Ok(modified(path)? > time),
    }
}

/// Keep a relative path inside the directory it is joined onto.
///
/// `..` becomes `__`, so `../x.cpp` and `__/x.cpp` in one node share an object path.
fn mirror(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => out.push("__"),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

/// Walk `dir` for sources and headers, skipping ignored directories, the output
/// roots and nested projects.
pub fn discover_files(dir: &Path, ignore: &[String]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut sources = Vec::new();
    let mut headers = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if ignore.iter().any(|i| *i == name) {
                return false;
            }
            if entry.depth() == 1 && (name == BIN_DIR || name == LIB_DIR) {
                let skipped = count_sources(entry.path());
                if skipped > 0 {
                    tracing::warn!(
                        dir = %entry.path().display(),
                        skipped,
                        "sources inside an output root are not discovered; list them explicitly"
                    );
                }
                return false;
            }
            !entry.path().join(DESCRIPTOR_FILE).exists()
        });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            continue;
        };
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        if SOURCE_EXTENSIONS.contains(&ext.as_str()) {
            sources.push(relative.to_path_buf());
        } else if HEADER_EXTENSIONS.contains(&ext.as_str()) {
            headers.push(relative.to_path_buf());
        }
    }

    (sources, headers)
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.as_str()))
}

/// Source files anywhere under `dir`.
fn count_sources(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_source(e.path()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn library(dir: &Path) -> ProjectNode {
        let descriptor = Descriptor::parse(
            "[project]\nname = \"Core\"\nkind = \"library\"\n",
            &dir.join(DESCRIPTOR_FILE),
        )
        .unwrap();
        ProjectNode::from_descriptor(dir, descriptor)
    }

    #[test]
    fn test_discovery_skips_ignored_outputs_and_nested_projects() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("src/a.cpp"));
        touch(&root.join("src/b.c"));
        touch(&root.join("public/a.hpp"));
        touch(&root.join("tmp/scratch.cpp"));
        touch(&root.join("lib/tmp/Core-Rel/gen.cpp"));
        touch(&root.join("bin/x.cpp"));
        touch(&root.join("vendor/dep/cproj.toml"));
        touch(&root.join("vendor/dep/dep.cpp"));
        touch(&root.join("README.md"));

        let (sources, headers) = discover_files(root, &["tmp".to_string()]);
        assert_eq!(
            sources,
            vec![PathBuf::from("src/a.cpp"), PathBuf::from("src/b.c")]
        );
        assert_eq!(headers, vec![PathBuf::from("public/a.hpp")]);
    }

    #[test]
    fn test_sources_under_output_roots_are_counted_not_discovered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("lib/net/socket.cpp"));
        touch(&root.join("lib/tmp/Core-Rel/socket.o"));
        touch(&root.join("main.cpp"));

        let (sources, _) = discover_files(root, &[]);
        assert_eq!(sources, vec![PathBuf::from("main.cpp")]);
        assert_eq!(count_sources(&root.join("lib")), 1);
        assert_eq!(count_sources(&root.join("bin")), 0);
    }

    #[test]
    fn test_output_layout() {
        let dir = tempfile::tempdir().unwrap();
        let node = library(dir.path());
        let config = BuildConfiguration {
            name: "Debi64".into(),
            ..Default::default()
        };
        assert_eq!(node.bin_dir(&config), dir.path().join("bin/Core-Debi64"));
        assert_eq!(node.lib_dir(&config), dir.path().join("lib/Core-Debi64"));
        assert_eq!(node.temp_dir(&config), dir.path().join("lib/tmp/Core-Debi64"));
        assert_eq!(
            node.static_library(&config, Platform::Linux),
            dir.path().join("lib/Core-Debi64/libCore.a")
        );
        assert_eq!(
            node.object_path(Path::new("src/util/a.cpp"), &config),
            dir.path().join("lib/tmp/Core-Debi64/src/util/a.o")
        );
        assert_eq!(
            node.object_path(Path::new("../shared/b.cpp"), &config),
            dir.path().join("lib/tmp/Core-Debi64/__/shared/b.o")
        );
    }

    #[test]
    fn test_staleness_never_built() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join(DESCRIPTOR_FILE));
        touch(&dir.path().join("src/a.cpp"));
        touch(&dir.path().join("include/a.hpp"));
        let node = library(dir.path());

        let s = node
            .staleness(&BuildConfiguration::default(), Platform::Linux)
            .unwrap();
        assert_eq!(s.success_time, None);
        assert!(s.api_changed && s.src_changed && s.definition_changed);
    }

    #[test]
    fn test_staleness_against_output_time() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let past = SystemTime::now() - Duration::from_secs(600);
        for file in [DESCRIPTOR_FILE, "src/a.cpp", "include/a.hpp"] {
            touch(&root.join(file));
            set_mtime(&root.join(file), past);
        }
        let node = library(root);
        let config = BuildConfiguration::default();
        let lib = node.static_library(&config, Platform::Linux);
        touch(&lib);

        let s = node.staleness(&config, Platform::Linux).unwrap();
        assert!(s.success_time.is_some());
        assert!(!s.api_changed && !s.src_changed && !s.definition_changed);

        set_mtime(
            &root.join("include/a.hpp"),
            SystemTime::now() + Duration::from_secs(60),
        );
        let s = node.staleness(&config, Platform::Linux).unwrap();
        assert!(s.api_changed);
        assert!(!s.src_changed);
    }

    #[test]
    fn test_missing_listed_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut node = library(dir.path());
        node.sources = vec![PathBuf::from("gone.cpp")];
        let config = BuildConfiguration::default();
        touch(&node.static_library(&config, Platform::Linux));

        let err = node.staleness(&config, Platform::Linux).unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }
}
