//! Out-of-process tool execution.
//!
//! The adapter builds [`Invocation`]s; an [`Executor`] runs them. Output is echoed
//! verbatim and never interpreted: success is judged by the adapter from the
//! artifact on disk, not from the exit status.

use crate::error::ToolchainError;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// A single external tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Artifact the call is expected to leave behind.
    pub produces: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            produces: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn producing(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.produces = Some(artifact.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a blocking tool call. Output text has already been echoed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit status, `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

/// Runs invocations. Implementations must be shareable across compile workers.
pub trait Executor: Send + Sync {
    /// Run to completion, capturing output.
    fn execute(&self, invocation: &Invocation) -> Result<ToolOutput, ToolchainError>;

    /// Run attached to the terminal (program runs, debugger sessions); returns the exit code.
    fn attach(&self, invocation: &Invocation) -> Result<i32, ToolchainError>;
}

/// Spawns real processes with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<ToolOutput, ToolchainError> {
        tracing::debug!(command = %invocation, "executing");
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .output()
            .map_err(|source| ToolchainError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        // Diagnostics are passed through untouched.
        if !output.stdout.is_empty() {
            print!("{}", String::from_utf8_lossy(&output.stdout));
            let _ = std::io::stdout().flush();
        }
        if !output.stderr.is_empty() {
            eprint!("{}", String::from_utf8_lossy(&output.stderr));
        }
        Ok(ToolOutput {
            code: output.status.code(),
        })
    }

    fn attach(&self, invocation: &Invocation) -> Result<i32, ToolchainError> {
        tracing::debug!(command = %invocation, "attaching");
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| ToolchainError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;
        Ok(status.code().unwrap_or(-1))
    }
}
