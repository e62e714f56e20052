//! Generator configuration.
//!
//! Every field has a default so a bare invocation works against a conventional
//! Axum project layout. A TOML file can override any subset of the fields, and
//! command-line flags are applied on top of that (see [`crate::cli`]).

use crate::error::{Error, Result};
use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Complete configuration for one generation run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Root of the server crate whose routes and types are scanned
    pub server_root: PathBuf,
    /// Directory that receives the `generated` subdirectory
    pub output_dir: PathBuf,
    /// Name of the subdirectory under `output_dir` holding the artifacts
    pub generated_subdir: String,
    pub client_file: String,
    pub types_file: String,
    pub openapi_json_file: String,
    pub openapi_yaml_file: String,
    /// Route registration entry points, relative to `server_root`.
    /// Empty means every scanned file is searched for routes.
    pub route_files: Vec<PathBuf>,
    /// Secondary source trees (e.g. a shared models crate) whose public
    /// declarations may be referenced from the API surface
    pub shared_sources: Vec<SharedSource>,
    /// First path segment -> client module name
    pub module_map: BTreeMap<String, String>,
    /// First path segment -> module name, used only for paths with more than one segment
    pub nested_module_map: BTreeMap<String, String>,
    /// Module for paths with no usable first segment
    pub fallback_module: String,
    /// Prefix prepended to every URL in the client
    pub api_prefix: String,
    /// Prefix of every emitted type name
    pub type_prefix: String,
    pub emit_openapi: bool,
    pub emit_yaml: bool,
    pub api_title: String,
    pub api_version: String,
}

/// A secondary source tree admitted through an inclusion list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SharedSource {
    /// Crate name used as the module path root of its declarations
    pub crate_name: String,
    /// Directory that plays the role of `src/` for this crate
    pub root: PathBuf,
    /// Files (relative to `root`) whose declarations are admitted; empty admits all
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            server_root: PathBuf::from("."),
            output_dir: PathBuf::from("out"),
            generated_subdir: "generated".to_string(),
            client_file: "Client.ts".to_string(),
            types_file: "Types.ts".to_string(),
            openapi_json_file: "openapi.json".to_string(),
            openapi_yaml_file: "openapi.yaml".to_string(),
            route_files: Vec::new(),
            shared_sources: Vec::new(),
            module_map: default_module_map(),
            nested_module_map: default_nested_module_map(),
            fallback_module: "Misc".to_string(),
            api_prefix: "/api".to_string(),
            type_prefix: "Api".to_string(),
            emit_openapi: true,
            emit_yaml: true,
            api_title: "Generated API".to_string(),
            api_version: "generated".to_string(),
        }
    }
}

fn default_module_map() -> BTreeMap<String, String> {
    [
        ("auth", "Users"),
        ("me", "Users"),
        ("password-reset", "Users"),
        ("users", "Admin"),
        ("admin", "Admin"),
        ("settings", "Admin"),
        ("audit", "Admin"),
        ("upload", "Files"),
        ("uploads", "Files"),
        ("assets", "Files"),
        ("health", "Misc"),
        ("version", "Misc"),
        ("metrics", "Misc"),
        ("debug", "Misc"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_nested_module_map() -> BTreeMap<String, String> {
    [("me", "User")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl GeneratorConfig {
    /// Loads a TOML configuration file; missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|err| match err {
            Error::ConfigError { message, .. } => Error::ConfigError {
                file: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Directory holding the source files of the server crate.
    ///
    /// Module paths are derived relative to this directory, so `src/` is used
    /// when present and the server root itself otherwise.
    pub fn source_dir(&self) -> PathBuf {
        let src = self.server_root.join("src");
        if src.is_dir() {
            src
        } else {
            self.server_root.clone()
        }
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.output_dir.join(&self.generated_subdir)
    }

    /// Absolute paths of the configured route files.
    pub fn route_file_paths(&self) -> Vec<PathBuf> {
        self.route_files
            .iter()
            .map(|p| self.server_root.join(p))
            .collect()
    }

    /// Maps an endpoint path to its client module name.
    pub fn module_for_path(&self, path: &str) -> String {
        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let Some(first) = segments.first() else {
            return self.fallback_module.clone();
        };
        if first.starts_with('{') {
            return self.fallback_module.clone();
        }

        if segments.len() > 1 {
            if let Some(name) = self.nested_module_map.get(*first) {
                return name.clone();
            }
        }
        if let Some(name) = self.module_map.get(*first) {
            return name.clone();
        }

        let title = crate::type_resolver::to_pascal_case(first);
        if title.is_empty() {
            self.fallback_module.clone()
        } else {
            title
        }
    }
}
