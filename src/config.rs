//! Build configurations (`<dir>/<name>.json`).
//!
//! A configuration is a named bundle of compile/link options. Every required option
//! must hold a value from its domain or loading fails; after loading the object is
//! read-only, its name doubling as the output-directory partition key.

use crate::error::ConfigError;
use crate::toolchain::ToolchainKind;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// C++ language standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standard {
    Cpp11,
    Cpp17,
    Cpp20,
    Latest,
}

impl Standard {
    pub const ALL: [Standard; 4] = [
        Standard::Cpp11,
        Standard::Cpp17,
        Standard::Cpp20,
        Standard::Latest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Standard::Cpp11 => "11",
            Standard::Cpp17 => "17",
            Standard::Cpp20 => "20",
            Standard::Latest => "latest",
        }
    }
}

/// Instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Intel,
    Arm,
}

impl Arch {
    pub const ALL: [Arch; 2] = [Arch::Intel, Arch::Arm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Intel => "intel",
            Arch::Arm => "arm",
        }
    }
}

/// Register size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWidth {
    W64,
    W32,
}

impl RegisterWidth {
    pub const ALL: [RegisterWidth; 2] = [RegisterWidth::W64, RegisterWidth::W32];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterWidth::W64 => "64",
            RegisterWidth::W32 => "32",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Optimization {
    O0,
    O1,
    O2,
    O3,
    Size,
    Speed,
}

impl Optimization {
    pub const ALL: [Optimization; 6] = [
        Optimization::O0,
        Optimization::O1,
        Optimization::O2,
        Optimization::O3,
        Optimization::Size,
        Optimization::Speed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Optimization::O0 => "0",
            Optimization::O1 => "1",
            Optimization::O2 => "2",
            Optimization::O3 => "3",
            Optimization::Size => "size",
            Optimization::Speed => "speed",
        }
    }
}

const DEBUG_VALUES: [&str; 2] = ["True", "False"];

/// A validated, named set of compilation and link options.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfiguration {
    pub name: String,
    pub toolchain: ToolchainKind,
    pub std: Standard,
    pub arch: Arch,
    pub register: RegisterWidth,
    pub debug: bool,
    pub optimization: Optimization,
    pub additional_compile: Vec<String>,
    pub additional_link: Vec<String>,
    /// File this configuration was loaded from, if any.
    pub origin: Option<PathBuf>,
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self {
            name: "Intel-64-Release".to_string(),
            toolchain: ToolchainKind::Llvm,
            std: Standard::Latest,
            arch: Arch::Intel,
            register: RegisterWidth::W64,
            debug: false,
            optimization: Optimization::Speed,
            additional_compile: Vec::new(),
            additional_link: Vec::new(),
            origin: None,
        }
    }
}

/// On-disk shape written by [`BuildConfiguration::save`].
#[derive(Serialize)]
struct ConfigFile<'a> {
    name: &'a str,
    toolchain: &'a str,
    std: &'a str,
    arch: &'a str,
    register: &'a str,
    debug: &'a str,
    optimization: &'a str,
    additional_compile: &'a [String],
    additional_link: &'a [String],
}

impl BuildConfiguration {
    /// Path of configuration `name` inside `dir`.
    pub fn file_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.json"))
    }

    /// Load and validate `<dir>/<name>.json`.
    pub fn load(dir: &Path, name: &str) -> Result<Self, ConfigError> {
        let path = Self::file_path(dir, name);
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let mut config = Self::parse(&content, &path)?;
        config.name = name.to_string();
        config.origin = Some(path);
        Ok(config)
    }

    /// Validate a JSON document. `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let Value::Object(map) = value else {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: "expected a JSON object".to_string(),
            });
        };

        let fields = Fields { map: &map, path };
        let toolchain = fields.choice("toolchain", &ToolchainKind::ALL, ToolchainKind::as_str)?;
        let std = fields.choice("std", &Standard::ALL, Standard::as_str)?;
        let arch = fields.choice("arch", &Arch::ALL, Arch::as_str)?;
        let register = fields.choice("register", &RegisterWidth::ALL, RegisterWidth::as_str)?;
        let optimization =
            fields.choice("optimization", &Optimization::ALL, Optimization::as_str)?;
        let debug = fields.debug()?;

        Ok(Self {
            name: map
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            toolchain,
            std,
            arch,
            register,
            debug,
            optimization,
            additional_compile: fields.flag_list("additional_compile")?,
            additional_link: fields.flag_list("additional_link")?,
            origin: None,
        })
    }

    /// Persist the current values as `<dir>/<name>.json`.
    pub fn save(&self, dir: &Path, name: &str) -> Result<PathBuf, ConfigError> {
        let path = Self::file_path(dir, name);
        let file = ConfigFile {
            name,
            toolchain: self.toolchain.as_str(),
            std: self.std.as_str(),
            arch: self.arch.as_str(),
            register: self.register.as_str(),
            debug: if self.debug { "True" } else { "False" },
            optimization: self.optimization.as_str(),
            additional_compile: &self.additional_compile,
            additional_link: &self.additional_link,
        };
        let content = serde_json::to_string_pretty(&file).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&path, content).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: &'a Path,
}

impl Fields<'_> {
    fn required(&self, option: &'static str) -> Result<&Value, ConfigError> {
        match self.map.get(option) {
            None | Some(Value::Null) => Err(ConfigError::MissingOption {
                option,
                path: self.path.to_path_buf(),
            }),
            Some(Value::String(s)) if s.is_empty() => Err(ConfigError::MissingOption {
                option,
                path: self.path.to_path_buf(),
            }),
            Some(value) => Ok(value),
        }
    }

    fn choice<T: Copy>(
        &self,
        option: &'static str,
        domain: &[T],
        as_str: fn(&T) -> &'static str,
    ) -> Result<T, ConfigError> {
        let value = self.required(option)?;
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        };
        domain
            .iter()
            .find(|candidate| as_str(*candidate) == text)
            .copied()
            .ok_or_else(|| ConfigError::InvalidValue {
                option,
                value: text,
                allowed: domain.iter().map(as_str).collect::<Vec<_>>().join(", "),
                path: self.path.to_path_buf(),
            })
    }

    fn debug(&self) -> Result<bool, ConfigError> {
        match self.required("debug")? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s == "True" => Ok(true),
            Value::String(s) if s == "False" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                option: "debug",
                value: match other {
                    Value::String(s) => s.clone(),
                    v => v.to_string(),
                },
                allowed: DEBUG_VALUES.join(", "),
                path: self.path.to_path_buf(),
            }),
        }
    }

    /// Optional list of flags; present-but-not-a-list is an error.
    fn flag_list(&self, option: &'static str) -> Result<Vec<String>, ConfigError> {
        match self.map.get(option) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or(ConfigError::NotAList {
                        option,
                        path: self.path.to_path_buf(),
                    })
                })
                .collect(),
            Some(_) => Err(ConfigError::NotAList {
                option,
                path: self.path.to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "toolchain": "llvm",
        "std": "20",
        "arch": "intel",
        "register": "64",
        "debug": "True",
        "optimization": "0",
        "additional_compile": ["-Wall"],
        "additional_link": []
    }"#;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(format!("{name}.json")), content).unwrap();
    }

    #[test]
    fn test_load_valid_configuration() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Debi64", VALID);

        let config = BuildConfiguration::load(dir.path(), "Debi64").unwrap();
        assert_eq!(config.name, "Debi64");
        assert_eq!(config.toolchain, ToolchainKind::Llvm);
        assert_eq!(config.std, Standard::Cpp20);
        assert!(config.debug);
        assert_eq!(config.optimization, Optimization::O0);
        assert_eq!(config.additional_compile, vec!["-Wall"]);
        assert_eq!(config.origin, Some(dir.path().join("Debi64.json")));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BuildConfiguration::load(dir.path(), "Nope").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_missing_required_option() {
        let content = VALID.replace(r#""arch": "intel","#, "");
        let err = BuildConfiguration::parse(&content, Path::new("x.json")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOption { option: "arch", .. }));
    }

    #[test]
    fn test_value_outside_domain() {
        let content = VALID.replace(r#""optimization": "0""#, r#""optimization": "fast""#);
        let err = BuildConfiguration::parse(&content, Path::new("x.json")).unwrap_err();
        match err {
            ConfigError::InvalidValue { option, value, .. } => {
                assert_eq!(option, "optimization");
                assert_eq!(value, "fast");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_toolchain_rejected() {
        let content = VALID.replace(r#""toolchain": "llvm""#, r#""toolchain": "msvc""#);
        let err = BuildConfiguration::parse(&content, Path::new("x.json")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { option: "toolchain", .. }));
    }

    #[test]
    fn test_numeric_register_accepted() {
        let content = VALID.replace(r#""register": "64""#, r#""register": 32"#);
        let config = BuildConfiguration::parse(&content, Path::new("x.json")).unwrap();
        assert_eq!(config.register, RegisterWidth::W32);
    }

    #[test]
    fn test_extra_flags_must_be_a_list() {
        let content = VALID.replace(
            r#""additional_link": []"#,
            r#""additional_link": "-lpthread""#,
        );
        let err = BuildConfiguration::parse(&content, Path::new("x.json")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotAList {
                option: "additional_link",
                ..
            }
        ));
    }

    #[test]
    fn test_extra_flags_are_optional() {
        let content = r#"{"toolchain":"gnu","std":"17","arch":"arm","register":"32",
            "debug":false,"optimization":"size"}"#;
        let config = BuildConfiguration::parse(content, Path::new("x.json")).unwrap();
        assert!(config.additional_compile.is_empty());
        assert!(config.additional_link.is_empty());
        assert!(!config.debug);
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfiguration {
            debug: true,
            optimization: Optimization::O2,
            additional_link: vec!["-pthread".into()],
            ..Default::default()
        };
        config.save(dir.path(), "Custom").unwrap();

        let loaded = BuildConfiguration::load(dir.path(), "Custom").unwrap();
        assert_eq!(loaded.name, "Custom");
        assert!(loaded.debug);
        assert_eq!(loaded.optimization, Optimization::O2);
        assert_eq!(loaded.additional_link, vec!["-pthread"]);
    }
}
