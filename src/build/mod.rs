//! Build orchestration.
//!
//! [`Orchestrator`] is the single entry surface: it loads the project graph from a
//! root directory, binds the configured toolchain, and runs compile, recompile,
//! clear, run and debug against the root project.

mod clean;
mod core;
mod graph;

pub use clean::clear_node;
pub use core::{BuildPass, Signal};
pub use graph::{LinkInputs, ProjectGraph};

use crate::config::BuildConfiguration;
use crate::error::{BuildError, Stage};
use crate::project::ProjectKind;
use crate::toolchain::{Executor, Platform, ToolRegistry, Toolchain};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub struct Orchestrator {
    registry: ToolRegistry,
    executor: Arc<dyn Executor>,
    platform: Platform,
}

impl Orchestrator {
    /// `registry` is the startup probe's verdicts and is never modified afterwards.
    pub fn new(registry: ToolRegistry, executor: Arc<dyn Executor>) -> Self {
        Self {
            registry,
            executor,
            platform: Platform::current(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn toolchain(&self, config: &BuildConfiguration) -> Toolchain<'_> {
        Toolchain::new(
            config.toolchain,
            &self.registry,
            self.executor.as_ref(),
            self.platform,
        )
    }

    pub fn load(&self, root: &Path) -> Result<ProjectGraph, BuildError> {
        Ok(ProjectGraph::load(root)?)
    }

    /// Bring the root project and its dependencies up to date.
    pub fn compile(
        &self,
        root: &Path,
        config: &BuildConfiguration,
        forced: bool,
    ) -> Result<Signal, BuildError> {
        let graph = self.load(root)?;
        self.compile_graph(&graph, config, forced)
    }

    fn compile_graph(
        &self,
        graph: &ProjectGraph,
        config: &BuildConfiguration,
        forced: bool,
    ) -> Result<Signal, BuildError> {
        let start = Instant::now();
        let toolchain = self.toolchain(config);
        toolchain.check_tools()?;

        let root = graph.root_node();
        println!(
            "{} Building {} [{}] with {}",
            "🚀".blue(),
            root.name.bold(),
            config.name,
            toolchain.kind()
        );

        let mut pass = BuildPass::new(graph, config, toolchain);
        let signal = pass.evaluate(graph.root(), forced)?;

        println!(
            "{} Build finished in {:.2?}",
            "✓".green(),
            start.elapsed()
        );
        Ok(signal)
    }

    /// Clear the root project's outputs, then compile it with `forced` set.
    pub fn recompile(
        &self,
        root: &Path,
        config: &BuildConfiguration,
    ) -> Result<Signal, BuildError> {
        let graph = self.load(root)?;
        self.toolchain(config).check_tools()?;
        clear_node(graph.root_node(), config)?;
        self.compile_graph(&graph, config, true)
    }

    /// Remove the root project's outputs for `config`. Dependencies are untouched.
    pub fn clear(&self, root: &Path, config: &BuildConfiguration) -> Result<(), BuildError> {
        let graph = self.load(root)?;
        clear_node(graph.root_node(), config)?;
        Ok(())
    }

    /// Run the root project's executable from a previous compile; returns its exit code.
    pub fn run(&self, root: &Path, config: &BuildConfiguration) -> Result<i32, BuildError> {
        let graph = self.load(root)?;
        let executable = self.executable(&graph, config, "run")?;
        let name = &graph.root_node().name;
        println!("{} Running {}...\n", "▶".green(), name.bold());
        let code = self
            .toolchain(config)
            .run(&executable)
            .map_err(|e| BuildError::from(e).at(name, Stage::Run))?;
        tracing::info!(project = %name, code, "process exited");
        Ok(code)
    }

    /// Start the toolchain debugger on the root project's executable.
    pub fn debug(&self, root: &Path, config: &BuildConfiguration) -> Result<i32, BuildError> {
        let graph = self.load(root)?;
        let executable = self.executable(&graph, config, "debugged")?;
        let name = &graph.root_node().name;
        self.toolchain(config)
            .debug(&executable)
            .map_err(|e| BuildError::from(e).at(name, Stage::Debug))
    }

    fn executable(
        &self,
        graph: &ProjectGraph,
        config: &BuildConfiguration,
        action: &'static str,
    ) -> Result<PathBuf, BuildError> {
        let root = graph.root_node();
        match root.kind {
            ProjectKind::Binary => Ok(root.executable(config, self.platform)),
            ProjectKind::Library => Err(BuildError::NotExecutable {
                name: root.name.clone(),
                action,
            }),
        }
    }
}
