// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Discovery and loading of the `opsos.yaml` CLI configuration.
//!
//! Configuration files are searched for in the following locations, lowest
//! priority first, and merged together:
//!
//! 1. the system directory (`/usr/local/etc/opsos`, or `%LOCALAPPDATA%/opsos`)
//! 2. `~/.opsos`
//! 3. the current working directory
//! 4. the directory named by `OPSOS_CONFIG_PATH`
//!
//! A handful of `OPSOS_*` environment variables override the merged result.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::merge::merge_into;
use crate::value::{Mapping, MappingExt, Value};
use crate::{CONFIG_FILENAME, Error, Result};

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

pub const CONFIG_PATH_ENV: &str = "OPSOS_CONFIG_PATH";
pub const LOG_LEVEL_ENV: &str = "OPSOS_LOG_LEVEL";
const SYSTEM_DIR: &str = "/usr/local/etc/opsos";

const API_VERSION: &str = "opsos/v1";
const KIND: &str = "Configuration";

/// Environment variables that override a configuration key.
const ENV_OVERRIDES: &[(&str, &[&str])] = &[
    ("OPSOS_BASE_PATH", &["base_path"]),
    ("OPSOS_STACKS_BASE_PATH", &["stacks", "base_path"]),
    ("OPSOS_STACKS_NAME_PATTERN", &["stacks", "name_pattern"]),
    (LOG_LEVEL_ENV, &["logs", "level"]),
];

/// The merged CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Root that every other relative base path is joined onto.
    pub base_path: PathBuf,
    pub stacks: StacksConfig,
    pub terraform: TerraformConfig,
    pub helmfile: HelmfileConfig,
    pub kind: KindConfig,
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StacksConfig {
    pub base_path: PathBuf,
    /// Globs selecting stack files, relative to the stacks base path.
    pub included_paths: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_paths: Vec<String>,
    /// Template rendered against stack vars to produce the stack name.
    pub name_pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TerraformConfig {
    pub base_path: PathBuf,
    pub apply_auto_approve: bool,
    pub deploy_run_init: bool,
    pub init_run_reconfigure: bool,
    pub auto_generate_backend_file: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HelmfileConfig {
    pub base_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name_pattern: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub envs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KindConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name_pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl Config {
    /// Find, merge, override and validate the configuration.
    pub fn load() -> Result<Self> {
        let dirs = search_paths();
        let Some(spec) = read_and_merge_specs(&dirs)? else {
            return Err(Error::ConfigNotFound(dirs));
        };
        let config = Self::from_spec(spec, |name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from a merged `spec` mapping.
    ///
    /// `env` looks up environment variables; values it returns override the
    /// corresponding keys of the spec.
    pub fn from_spec<E>(mut spec: Mapping, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        for (var, path) in ENV_OVERRIDES {
            if let Some(value) = env(var).filter(|v| !v.is_empty()) {
                tracing::debug!("{var} overrides {}", path.join("."));
                set_path(&mut spec, path, Value::String(value));
            }
        }
        Value::Mapping(spec).deserialize_into(CONFIG_FILENAME)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stacks.included_paths.is_empty() {
            return Err(Error::InvalidConfig(
                "stacks.included_paths must list at least one pattern".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stacks_base_path(&self) -> PathBuf {
        self.base_path.join(&self.stacks.base_path)
    }

    pub fn terraform_base_path(&self) -> PathBuf {
        self.base_path.join(&self.terraform.base_path)
    }

    pub fn helmfile_base_path(&self) -> PathBuf {
        self.base_path.join(&self.helmfile.base_path)
    }
}

/// Directories searched for `opsos.yaml`, lowest priority first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut dirs = vec![system_dir()];
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".opsos"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        tracing::debug!("found {CONFIG_PATH_ENV}={path:?}");
        dirs.push(PathBuf::from(path));
    }

    let mut unique = Vec::with_capacity(dirs.len());
    for dir in dirs {
        if !unique.contains(&dir) {
            unique.push(dir);
        }
    }
    unique
}

fn system_dir() -> PathBuf {
    if cfg!(windows) {
        if let Some(local) = dirs::data_local_dir() {
            return local.join("opsos");
        }
    }
    PathBuf::from(SYSTEM_DIR)
}

/// Read the `opsos.yaml` of every directory that has one and merge their specs.
///
/// Returns `None` when no directory holds a configuration file.
pub fn read_and_merge_specs(dirs: &[PathBuf]) -> Result<Option<Mapping>> {
    let mut merged: Option<Mapping> = None;
    for dir in dirs {
        let path = dir.join(CONFIG_FILENAME);
        if !path.is_file() {
            continue;
        }
        tracing::debug!("found config file at {}", path.display());
        let spec = read_spec(&path)?;
        merge_into(merged.get_or_insert_with(Mapping::new), spec);
    }
    Ok(merged)
}

/// Read one configuration file and return its `spec` section.
pub fn read_spec(path: &Path) -> Result<Mapping> {
    let yaml = std::fs::read_to_string(path).map_err(|error| Error::ReadFailed {
        path: path.to_path_buf(),
        error,
    })?;
    parse_spec(&yaml, path)
}

pub(crate) fn parse_spec(yaml: &str, path: &Path) -> Result<Mapping> {
    let raw: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(|error| Error::InvalidYaml {
        path: path.to_path_buf(),
        error,
    })?;
    let document = match Value::from(raw) {
        Value::Mapping(map) => map,
        other => {
            return Err(Error::InvalidConfig(format!(
                "{} must hold a mapping, found {}",
                path.display(),
                other.kind()
            )));
        }
    };

    let api_version = document.get_str("", "apiVersion")?.unwrap_or_default();
    let kind = document.get_str("", "kind")?.unwrap_or_default();
    if api_version != API_VERSION || kind != KIND {
        return Err(Error::InvalidConfig(format!(
            "{} is not a {API_VERSION}/{KIND} resource (found {api_version}/{kind})",
            path.display()
        )));
    }
    Ok(document
        .get_mapping("", "spec")?
        .cloned()
        .unwrap_or_default())
}

fn set_path(map: &mut Mapping, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = map;
    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if entry.as_mapping().is_none() {
            *entry = Value::Mapping(Mapping::new());
        }
        let Some(next) = entry.as_mapping_mut() else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}
