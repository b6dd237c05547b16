//! Toolchain adapter
//!
//! Translates a [`BuildConfiguration`] plus file sets into compiler, archiver,
//! linker and debugger invocations. Every producing call follows the same
//! discipline: create the output directory, remove any previous artifact, run the
//! tool, then require the artifact to exist. A tool that exits without leaving its
//! artifact behind is a failure, whatever it printed.

pub mod exec;
pub mod probe;
pub mod types;

pub use exec::{Executor, Invocation, ProcessExecutor, ToolOutput};
pub use types::{Platform, ToolRegistry, ToolSet, ToolVerdict, ToolchainKind};

use crate::config::{Arch, BuildConfiguration, Optimization, RegisterWidth, Standard};
use crate::error::{Stage, ToolchainError};
use std::fs;
use std::path::{Path, PathBuf};

/// Adapter for one toolchain, bound to an immutable tool registry and an executor.
#[derive(Clone, Copy)]
pub struct Toolchain<'a> {
    kind: ToolchainKind,
    registry: &'a ToolRegistry,
    executor: &'a dyn Executor,
    platform: Platform,
}

impl<'a> Toolchain<'a> {
    pub fn new(
        kind: ToolchainKind,
        registry: &'a ToolRegistry,
        executor: &'a dyn Executor,
        platform: Platform,
    ) -> Self {
        Self {
            kind,
            registry,
            executor,
            platform,
        }
    }

    pub fn kind(&self) -> ToolchainKind {
        self.kind
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Fail unless every tool this toolchain uses has a verified path.
    pub fn check_tools(&self) -> Result<(), ToolchainError> {
        let unresolved = self.registry.unresolved(self.kind);
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(ToolchainError::UnresolvedTools {
                toolchain: self.kind.to_string(),
                tools: unresolved,
            })
        }
    }

    fn tool(&self, name: &str) -> Result<&'a Path, ToolchainError> {
        self.check_tools()?;
        self.registry
            .path(self.kind, name)
            .ok_or_else(|| ToolchainError::UnresolvedTools {
                toolchain: self.kind.to_string(),
                tools: vec![name.to_string()],
            })
    }

    /// Configuration-derived flags. Values without a table entry emit nothing.
    pub fn option_flags(&self, config: &BuildConfiguration) -> Vec<&'static str> {
        let debug = match (self.kind, config.debug) {
            (_, false) => None,
            (ToolchainKind::Llvm, true) => Some("-g"),
            (ToolchainKind::Gnu, true) => Some("-ggdb"),
        };
        let optimization = match config.optimization {
            Optimization::O0 => Some("-O0"),
            Optimization::O1 => Some("-O1"),
            Optimization::O2 => Some("-O2"),
            Optimization::O3 => Some("-O3"),
            Optimization::Size => Some("-Os"),
            Optimization::Speed => Some("-Ofast"),
        };
        let std = match config.std {
            Standard::Cpp11 => Some("-std=c++11"),
            Standard::Cpp17 => Some("-std=c++17"),
            Standard::Cpp20 => Some("-std=c++20"),
            Standard::Latest => Some("-std=c++2b"),
        };
        let arch = match config.arch {
            Arch::Intel => Some("-march=native"),
            Arch::Arm => Some("-march=armv7-a"),
        };
        let register = match config.register {
            RegisterWidth::W64 => Some("-m64"),
            RegisterWidth::W32 => Some("-m32"),
        };
        [debug, optimization, std, arch, register]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn compile_command(
        &self,
        source: &Path,
        output: &Path,
        includes: &[PathBuf],
        defines: &[String],
        extra_flags: &[String],
        config: &BuildConfiguration,
    ) -> Result<Invocation, ToolchainError> {
        let compiler = self.tool(self.kind.tools().compiler)?;
        Ok(Invocation::new(compiler)
            .arg("-c")
            .arg(source.to_string_lossy())
            .arg("-o")
            .arg(output.to_string_lossy())
            .args(includes.iter().map(|dir| format!("-I{}", dir.display())))
            .args(defines.iter().map(|symbol| format!("-D{symbol}")))
            .args(self.option_flags(config))
            .args(extra_flags.iter().cloned())
            .args(config.additional_compile.iter().cloned())
            .producing(output))
    }

    /// Compile one translation unit into `output`.
    pub fn compile_object(
        &self,
        source: &Path,
        output: &Path,
        includes: &[PathBuf],
        defines: &[String],
        extra_flags: &[String],
        config: &BuildConfiguration,
    ) -> Result<(), ToolchainError> {
        let invocation =
            self.compile_command(source, output, includes, defines, extra_flags, config)?;
        self.invoke_verified(&invocation, output, Stage::Compile)
    }

    pub fn package_command(
        &self,
        objects: &[PathBuf],
        output: &Path,
    ) -> Result<Invocation, ToolchainError> {
        let archiver = self.tool(self.kind.tools().archiver)?;
        Ok(Invocation::new(archiver)
            .arg("rcs")
            .arg(output.to_string_lossy())
            .args(objects.iter().map(|o| o.to_string_lossy().into_owned()))
            .producing(output))
    }

    /// Archive `objects` into the static library `output`.
    pub fn package_objects(
        &self,
        objects: &[PathBuf],
        output: &Path,
        _config: &BuildConfiguration,
    ) -> Result<(), ToolchainError> {
        let invocation = self.package_command(objects, output)?;
        self.invoke_verified(&invocation, output, Stage::Package)
    }

    pub fn link_command(
        &self,
        objects: &[PathBuf],
        output: &Path,
        libraries: &[String],
        library_dirs: &[PathBuf],
        config: &BuildConfiguration,
    ) -> Result<Invocation, ToolchainError> {
        let linker = self.tool(self.kind.tools().linker)?;
        Ok(Invocation::new(linker)
            .args(objects.iter().map(|o| o.to_string_lossy().into_owned()))
            .arg("-o")
            .arg(output.to_string_lossy())
            .args(library_dirs.iter().map(|dir| format!("-L{}", dir.display())))
            .args(libraries.iter().map(|lib| self.platform.link_flag(lib)))
            .args(self.option_flags(config))
            .args(config.additional_link.iter().cloned())
            .producing(output))
    }

    /// Link `objects` and `libraries` into the executable `output`.
    pub fn link_objects(
        &self,
        objects: &[PathBuf],
        output: &Path,
        libraries: &[String],
        library_dirs: &[PathBuf],
        config: &BuildConfiguration,
    ) -> Result<(), ToolchainError> {
        let invocation = self.link_command(objects, output, libraries, library_dirs, config)?;
        self.invoke_verified(&invocation, output, Stage::Link)
    }

    /// Execute a built program attached to the terminal and return its exit code.
    pub fn run(&self, executable: &Path) -> Result<i32, ToolchainError> {
        self.check_tools()?;
        require_executable(executable)?;
        self.executor.attach(&Invocation::new(executable))
    }

    /// Start an interactive debugger session on `executable`.
    pub fn debug(&self, executable: &Path) -> Result<i32, ToolchainError> {
        let debugger = self.tool(self.kind.tools().debugger)?;
        require_executable(executable)?;
        self.executor
            .attach(&Invocation::new(debugger).arg(executable.to_string_lossy()))
    }

    fn invoke_verified(
        &self,
        invocation: &Invocation,
        output: &Path,
        stage: Stage,
    ) -> Result<(), ToolchainError> {
        if let Some(parent) = output.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|source| ToolchainError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        // A leftover artifact must not pass for this run's result.
        if output.exists() {
            fs::remove_file(output).map_err(|source| ToolchainError::Io {
                path: output.to_path_buf(),
                source,
            })?;
        }

        let result = self.executor.execute(invocation)?;

        if output.exists() {
            Ok(())
        } else {
            tracing::warn!(
                command = %invocation,
                code = ?result.code,
                "{} produced no artifact",
                stage
            );
            Err(ToolchainError::ArtifactMissing {
                stage,
                artifact: output.to_path_buf(),
            })
        }
    }
}

fn require_executable(executable: &Path) -> Result<(), ToolchainError> {
    if executable.exists() {
        Ok(())
    } else {
        Err(ToolchainError::MissingExecutable {
            path: executable.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records calls and optionally writes the expected artifact.
    struct Recorder {
        produce: bool,
        calls: Mutex<Vec<Invocation>>,
    }

    impl Recorder {
        fn new(produce: bool) -> Self {
            Self {
                produce,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Executor for Recorder {
        fn execute(&self, invocation: &Invocation) -> Result<ToolOutput, ToolchainError> {
            self.calls.lock().unwrap().push(invocation.clone());
            if self.produce
                && let Some(out) = &invocation.produces
            {
                fs::write(out, b"artifact").unwrap();
            }
            Ok(ToolOutput::default())
        }

        fn attach(&self, invocation: &Invocation) -> Result<i32, ToolchainError> {
            self.calls.lock().unwrap().push(invocation.clone());
            Ok(3)
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new().with_toolchain_in(ToolchainKind::Llvm, Path::new("/opt/llvm/bin"))
    }

    #[test]
    fn test_compile_command_flags() {
        let registry = registry();
        let recorder = Recorder::new(true);
        let tc = Toolchain::new(ToolchainKind::Llvm, &registry, &recorder, Platform::Linux);
        let config = BuildConfiguration {
            debug: true,
            optimization: Optimization::O2,
            additional_compile: vec!["-Wall".into()],
            ..Default::default()
        };

        let inv = tc
            .compile_command(
                Path::new("src/a.cpp"),
                Path::new("out/a.o"),
                &[PathBuf::from("/p/public"), PathBuf::from("/q/include")],
                &["NDEBUG".to_string()],
                &["-fPIC".to_string()],
                &config,
            )
            .unwrap();

        assert_eq!(inv.program, PathBuf::from("/opt/llvm/bin/clang++"));
        assert_eq!(
            inv.args,
            vec![
                "-c",
                "src/a.cpp",
                "-o",
                "out/a.o",
                "-I/p/public",
                "-I/q/include",
                "-DNDEBUG",
                "-g",
                "-O2",
                "-std=c++2b",
                "-march=native",
                "-m64",
                "-fPIC",
                "-Wall",
            ]
        );
    }

    #[test]
    fn test_debug_flag_absent_when_disabled() {
        let registry = registry();
        let recorder = Recorder::new(true);
        let tc = Toolchain::new(ToolchainKind::Llvm, &registry, &recorder, Platform::Linux);
        let flags = tc.option_flags(&BuildConfiguration::default());
        assert!(!flags.contains(&"-g"));
        assert_eq!(flags[0], "-Ofast");
    }

    #[test]
    fn test_gnu_debug_flag() {
        let registry = ToolRegistry::new().with_toolchain_in(ToolchainKind::Gnu, Path::new("/usr/bin"));
        let recorder = Recorder::new(true);
        let tc = Toolchain::new(ToolchainKind::Gnu, &registry, &recorder, Platform::Linux);
        let config = BuildConfiguration {
            toolchain: ToolchainKind::Gnu,
            debug: true,
            ..Default::default()
        };
        assert_eq!(tc.option_flags(&config)[0], "-ggdb");
    }

    #[test]
    fn test_link_command_normalizes_library_names() {
        let registry = registry();
        let recorder = Recorder::new(true);
        let tc = Toolchain::new(ToolchainKind::Llvm, &registry, &recorder, Platform::Linux);
        let inv = tc
            .link_command(
                &[PathBuf::from("main.o")],
                Path::new("bin/App"),
                &["libCore.a".into(), "Core".into(), "libm".into()],
                &[PathBuf::from("/p/lib/Core-Rel")],
                &BuildConfiguration::default(),
            )
            .unwrap();
        assert_eq!(&inv.args[..3], &["main.o", "-o", "bin/App"]);
        assert!(inv.args.contains(&"-L/p/lib/Core-Rel".to_string()));
        let l_flags: Vec<_> = inv.args.iter().filter(|a| a.starts_with("-l")).collect();
        assert_eq!(l_flags, vec!["-lCore", "-lCore", "-lm"]);
    }

    #[test]
    fn test_package_creates_dir_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry();
        let recorder = Recorder::new(true);
        let tc = Toolchain::new(ToolchainKind::Llvm, &registry, &recorder, Platform::Linux);
        let out = dir.path().join("lib").join("Core-Rel").join("libCore.a");

        tc.package_objects(&[PathBuf::from("a.o")], &out, &BuildConfiguration::default())
            .unwrap();
        assert!(out.exists());
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls[0].args[0], "rcs");
        assert_eq!(calls[0].program, PathBuf::from("/opt/llvm/bin/llvm-ar"));
    }

    #[test]
    fn test_stale_artifact_does_not_mask_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry();
        let recorder = Recorder::new(false);
        let tc = Toolchain::new(ToolchainKind::Llvm, &registry, &recorder, Platform::Linux);
        let out = dir.path().join("a.o");
        fs::write(&out, b"old").unwrap();

        let err = tc
            .compile_object(
                Path::new("a.cpp"),
                &out,
                &[],
                &[],
                &[],
                &BuildConfiguration::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ToolchainError::ArtifactMissing {
                stage: Stage::Compile,
                ..
            }
        ));
        assert!(!out.exists());
    }

    #[test]
    fn test_unresolved_tools_block_every_operation() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ToolRegistry::new()
            .with_toolchain_in(ToolchainKind::Llvm, Path::new("/opt/llvm/bin"))
            .with_tool(ToolchainKind::Llvm, "clang++", ToolVerdict::Unresolved);
        let recorder = Recorder::new(true);
        let tc = Toolchain::new(ToolchainKind::Llvm, &registry, &recorder, Platform::Linux);
        let out = dir.path().join("x").join("a.o");
        let exe = dir.path().join("App");
        fs::write(&exe, b"").unwrap();

        let config = BuildConfiguration::default();
        let compile = tc.compile_object(Path::new("a.cpp"), &out, &[], &[], &[], &config);
        let package = tc.package_objects(&[], &out, &config);
        let run = tc.run(&exe);
        let debug = tc.debug(&exe);

        for result in [compile, package] {
            match result.unwrap_err() {
                ToolchainError::UnresolvedTools { tools, .. } => assert_eq!(tools, vec!["clang++"]),
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(run.is_err());
        assert!(debug.is_err());
        assert!(!out.parent().unwrap().exists());
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_run_requires_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry();
        let recorder = Recorder::new(true);
        let tc = Toolchain::new(ToolchainKind::Llvm, &registry, &recorder, Platform::Linux);
        let exe = dir.path().join("App");

        assert!(matches!(
            tc.run(&exe).unwrap_err(),
            ToolchainError::MissingExecutable { .. }
        ));
        fs::write(&exe, b"").unwrap();
        assert_eq!(tc.run(&exe).unwrap(), 3);
        assert_eq!(tc.debug(&exe).unwrap(), 3);
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls[1].program, PathBuf::from("/opt/llvm/bin/lldb"));
    }
}
