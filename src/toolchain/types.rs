use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Supported toolchain families
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolchainKind {
    /// clang++ / llvm-ar / lldb
    Llvm,
    /// g++ / ar / gdb
    Gnu,
}

impl ToolchainKind {
    pub const ALL: [ToolchainKind; 2] = [ToolchainKind::Llvm, ToolchainKind::Gnu];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainKind::Llvm => "llvm",
            ToolchainKind::Gnu => "gnu",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }

    /// Tool names this toolchain invokes, keyed by role.
    pub fn tools(&self) -> ToolSet {
        match self {
            ToolchainKind::Llvm => ToolSet {
                compiler: "clang++",
                archiver: "llvm-ar",
                linker: "clang++",
                debugger: "lldb",
            },
            ToolchainKind::Gnu => ToolSet {
                compiler: "g++",
                archiver: "ar",
                linker: "g++",
                debugger: "gdb",
            },
        }
    }
}

impl fmt::Display for ToolchainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the executables a toolchain is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSet {
    pub compiler: &'static str,
    pub archiver: &'static str,
    pub linker: &'static str,
    pub debugger: &'static str,
}

impl ToolSet {
    /// Distinct tool names, in role order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(4);
        for name in [self.compiler, self.archiver, self.linker, self.debugger] {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Outcome of probing for a single tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolVerdict {
    Resolved(PathBuf),
    Unresolved,
}

/// Resolved tool paths per toolchain, built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    entries: BTreeMap<ToolchainKind, BTreeMap<String, ToolVerdict>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the verdict for one tool.
    pub fn with_tool(mut self, kind: ToolchainKind, tool: &str, verdict: ToolVerdict) -> Self {
        self.entries
            .entry(kind)
            .or_default()
            .insert(tool.to_string(), verdict);
        self
    }

    /// Register every tool of `kind` as resolved to `<dir>/<tool>`.
    pub fn with_toolchain_in(mut self, kind: ToolchainKind, dir: &Path) -> Self {
        for tool in kind.tools().names() {
            self = self.with_tool(kind, tool, ToolVerdict::Resolved(dir.join(tool)));
        }
        self
    }

    pub fn verdict(&self, kind: ToolchainKind, tool: &str) -> Option<&ToolVerdict> {
        self.entries.get(&kind).and_then(|tools| tools.get(tool))
    }

    pub fn path(&self, kind: ToolchainKind, tool: &str) -> Option<&Path> {
        match self.verdict(kind, tool) {
            Some(ToolVerdict::Resolved(path)) => Some(path),
            _ => None,
        }
    }

    /// Tools required by `kind` that have no verified path (absent entries count too).
    pub fn unresolved(&self, kind: ToolchainKind) -> Vec<String> {
        kind.tools()
            .names()
            .into_iter()
            .filter(|tool| self.path(kind, tool).is_none())
            .map(str::to_string)
            .collect()
    }
}

/// Target platform artifact naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn static_lib_prefix(&self) -> &'static str {
        match self {
            Platform::Windows => "",
            Platform::Linux | Platform::MacOs => "lib",
        }
    }

    pub fn static_lib_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".lib",
            Platform::Linux | Platform::MacOs => ".a",
        }
    }

    pub fn shared_lib_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".dll",
            Platform::Linux => ".so",
            Platform::MacOs => ".dylib",
        }
    }

    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            Platform::Linux | Platform::MacOs => "",
        }
    }

    /// File name of the static library built for project `name`.
    pub fn static_lib_name(&self, name: &str) -> String {
        format!(
            "{}{}{}",
            self.static_lib_prefix(),
            name,
            self.static_lib_suffix()
        )
    }

    pub fn exe_name(&self, name: &str) -> String {
        format!("{}{}", name, self.exe_suffix())
    }

    /// Reduce `libfoo.a`, `foo.lib`, `libfoo.so` or `foo` to the bare link name `foo`.
    pub fn link_name<'a>(&self, library: &'a str) -> &'a str {
        let mut name = library;
        for suffix in [self.static_lib_suffix(), self.shared_lib_suffix()] {
            if let Some(stripped) = name.strip_suffix(suffix)
                && !stripped.is_empty()
            {
                name = stripped;
                break;
            }
        }
        let prefix = self.static_lib_prefix();
        if !prefix.is_empty()
            && let Some(stripped) = name.strip_prefix(prefix)
            && !stripped.is_empty()
        {
            name = stripped;
        }
        name
    }

    /// The `-l` token for a library, whatever form it was written in.
    pub fn link_flag(&self, library: &str) -> String {
        format!("-l{}", self.link_name(library))
    }
}
