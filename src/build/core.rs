use super::graph::ProjectGraph;
use crate::config::BuildConfiguration;
use crate::error::{BuildError, Stage};
use crate::project::{NodeId, ProjectKind, ProjectNode, Staleness};
use crate::toolchain::Toolchain;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashMap;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;

/// What a node's evaluation tells its dependents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signal {
    /// A header of the node changed since its last successful build.
    pub api_changed: bool,
    /// The node's library (or one it depends on) was rebuilt in this pass.
    pub lib_changed: bool,
}

impl BitOr for Signal {
    type Output = Signal;

    fn bitor(self, rhs: Signal) -> Signal {
        Signal {
            api_changed: self.api_changed || rhs.api_changed,
            lib_changed: self.lib_changed || rhs.lib_changed,
        }
    }
}

impl BitOrAssign for Signal {
    fn bitor_assign(&mut self, rhs: Signal) {
        *self = *self | rhs;
    }
}

struct CompiledObjects {
    api_changed: bool,
    src_changed: bool,
    objects: Vec<PathBuf>,
}

/// One depth-first evaluation of a graph under one configuration.
///
/// Each node is evaluated at most once; a shared dependency hands its recorded
/// signal to every later parent.
pub struct BuildPass<'a> {
    graph: &'a ProjectGraph,
    config: &'a BuildConfiguration,
    toolchain: Toolchain<'a>,
    signals: HashMap<NodeId, Signal>,
}

impl<'a> BuildPass<'a> {
    pub fn new(
        graph: &'a ProjectGraph,
        config: &'a BuildConfiguration,
        toolchain: Toolchain<'a>,
    ) -> Self {
        Self {
            graph,
            config,
            toolchain,
            signals: HashMap::new(),
        }
    }

    /// Evaluate `id` after all of its dependencies. `forced` applies to `id` only.
    pub fn evaluate(&mut self, id: NodeId, forced: bool) -> Result<Signal, BuildError> {
        if let Some(signal) = self.signals.get(&id) {
            return Ok(*signal);
        }

        let graph = self.graph;
        let mut deps = Signal::default();
        for dep in &graph.node(id).dependencies {
            deps |= self.evaluate(*dep, false)?;
        }

        let signal = self.build_node(id, forced, deps)?;
        self.signals.insert(id, signal);
        Ok(signal)
    }

    fn build_node(&self, id: NodeId, forced: bool, deps: Signal) -> Result<Signal, BuildError> {
        let node = self.graph.node(id);
        let platform = self.toolchain.platform();

        let staleness = node
            .staleness(self.config, platform)
            .map_err(|e| e.at(&node.name, Stage::Scan))?;
        let forced = forced || staleness.definition_changed;
        tracing::debug!(
            project = %node.name,
            forced,
            api_changed = staleness.api_changed,
            src_changed = staleness.src_changed,
            dep_api_changed = deps.api_changed,
            dep_lib_changed = deps.lib_changed,
            "evaluated staleness"
        );

        // A dependency's API change reaches every source of this node.
        let compiled = self.compile_objects(id, &staleness, forced || deps.api_changed)?;

        let rebuild = compiled.src_changed
            || compiled.api_changed
            || deps.api_changed
            || deps.lib_changed
            || forced;

        if !rebuild {
            println!("{} {} up to date", "⚡".green(), node.name.bold());
            return Ok(Signal {
                api_changed: compiled.api_changed,
                lib_changed: deps.lib_changed,
            });
        }

        match node.kind {
            ProjectKind::Library => self.package(node, &compiled.objects)?,
            ProjectKind::Binary => self.link(id, &compiled.objects)?,
        }

        Ok(Signal {
            api_changed: compiled.api_changed,
            lib_changed: true,
        })
    }

    fn compile_objects(
        &self,
        id: NodeId,
        staleness: &Staleness,
        forced: bool,
    ) -> Result<CompiledObjects, BuildError> {
        let node = self.graph.node(id);
        let config = self.config;
        let invalidate_all = forced || staleness.api_changed;

        let objects = node.objects(config);
        let mut stale = Vec::new();
        for (source, object) in node.sources.iter().zip(&objects) {
            if node
                .source_is_stale(source, object, invalidate_all, staleness.success_time)
                .map_err(|e| e.at(&node.name, Stage::Scan))?
            {
                stale.push((source, object));
            }
        }

        if !stale.is_empty() {
            let mut includes = self.graph.public_includes(id);
            includes.extend(node.include_dirs.iter().cloned());
            self.compile_sources(node, &stale, &includes)?;
        }

        Ok(CompiledObjects {
            api_changed: staleness.api_changed,
            src_changed: staleness.src_changed || !stale.is_empty(),
            objects,
        })
    }

    fn compile_sources(
        &self,
        node: &ProjectNode,
        stale: &[(&PathBuf, &PathBuf)],
        includes: &[PathBuf],
    ) -> Result<(), BuildError> {
        println!(
            "{} Compiling {} ({} of {} sources)",
            "⚙".blue(),
            node.name.bold(),
            stale.len(),
            node.sources.len()
        );

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let pb = ProgressBar::new(stale.len() as u64);
        pb.set_style(style);

        let toolchain = self.toolchain;
        let config = self.config;
        stale
            .par_iter()
            .map(|(source, object)| -> Result<(), BuildError> {
                toolchain
                    .compile_object(
                        &node.dir.join(source),
                        object,
                        includes,
                        &node.defines,
                        &node.flags,
                        config,
                    )
                    .map_err(|e| BuildError::from(e).at(&node.name, Stage::Compile))?;
                let line = format!("   {} {}", "✓".green(), source.display());
                if pb.is_hidden() {
                    println!("{line}");
                } else {
                    pb.println(line);
                }
                pb.inc(1);
                Ok(())
            })
            .collect::<Result<Vec<()>, BuildError>>()?;

        pb.finish_and_clear();
        Ok(())
    }

    fn package(&self, node: &ProjectNode, objects: &[PathBuf]) -> Result<(), BuildError> {
        let library = node.static_library(self.config, self.toolchain.platform());
        self.toolchain
            .package_objects(objects, &library, self.config)
            .map_err(|e| BuildError::from(e).at(&node.name, Stage::Package))?;
        tracing::info!(project = %node.name, artifact = %library.display(), "packaged");
        println!(
            "{} Packaged {}",
            "📦".blue(),
            relative_display(node, &library)
        );
        Ok(())
    }

    fn link(&self, id: NodeId, objects: &[PathBuf]) -> Result<(), BuildError> {
        let node = self.graph.node(id);
        let platform = self.toolchain.platform();
        let executable = node.executable(self.config, platform);
        let inputs = self.graph.link_inputs(id, self.config, platform);
        self.toolchain
            .link_objects(
                objects,
                &executable,
                &inputs.libraries,
                &inputs.library_dirs,
                self.config,
            )
            .map_err(|e| BuildError::from(e).at(&node.name, Stage::Link))?;
        tracing::info!(project = %node.name, artifact = %executable.display(), "linked");
        println!(
            "{} Linked {}",
            "🔗".cyan(),
            relative_display(node, &executable)
        );
        Ok(())
    }
}

fn relative_display(node: &ProjectNode, path: &std::path::Path) -> String {
    path.strip_prefix(&node.dir)
        .unwrap_or(path)
        .display()
        .to_string()
}
