//! # cbuild - Incremental builds for C/C++ project graphs
//!
//! cbuild evaluates a graph of C/C++ projects rooted at one directory and rebuilds
//! only what timestamps say is stale, dependencies before dependents.
//!
//! ## Module Organization
//!
//! - [`build`] - Graph loading, staleness propagation and the [`build::Orchestrator`]
//! - [`config`] - Build configurations (`<name>.json`)
//! - [`project`] - Project descriptors (`cproj.toml`) and per-project layout
//! - [`toolchain`] - Tool registry, command construction and process execution
//! - [`error`] - Error types shared by every layer

/// Build orchestration and change propagation.
pub mod build;

/// Build configuration parsing and validation.
pub mod config;

/// Error types.
pub mod error;

/// Project descriptors and nodes.
pub mod project;

/// Toolchain adapters and tool discovery.
pub mod toolchain;
