// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Typed projection of a fully merged stack configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::merge::merge_into;
use crate::value::{Mapping, MappingExt, Value, join_path};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./schema_test.rs"]
mod schema_test;

/// Top-level keys with a fixed meaning. Every other key names a component type.
pub const RESERVED_KEYS: &[&str] = &["vars", "env", "settings", "components", "kube_config_provider"];

pub const VARS: &str = "vars";
pub const ENVS: &str = "envs";
pub const ENV: &str = "env";
pub const SETTINGS: &str = "settings";
pub const COMPONENT: &str = "component";
pub const COMMAND: &str = "command";
pub const METADATA: &str = "metadata";
pub const BACKEND_TYPE: &str = "backend_type";
pub const BACKEND: &str = "backend";
pub const REMOTE_STATE_BACKEND_TYPE: &str = "remote_state_backend_type";
pub const REMOTE_STATE_BACKEND: &str = "remote_state_backend";

/// Whether a component is meant to be deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Real,
    /// Only contributes configuration to the components inheriting from it.
    Abstract,
}

/// Per-component information that is never merged across the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ComponentKind>,

    /// Overrides whatever base component inheritance produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    /// Mixins, applied in order after the base component chain.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inherits: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_workspace: Option<String>,

    /// Template rendered against the component vars, e.g. `{{.tenant}}-{{.stage}}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_workspace_pattern: Option<String>,
}

impl Metadata {
    pub fn is_abstract(&self) -> bool {
        self.kind == Some(ComponentKind::Abstract)
    }
}

/// Defaults shared by every component of one type within a stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentTypeSettings {
    pub vars: Mapping,
    pub envs: Mapping,
    pub backend_type: Option<String>,
    /// Backend settings keyed by backend type.
    pub backend: Mapping,
    pub remote_state_backend_type: Option<String>,
    pub remote_state_backend: Mapping,
    pub settings: Mapping,
    /// Keys specific to one component type, kept for its provider.
    pub extra: Mapping,
}

impl ComponentTypeSettings {
    pub fn from_mapping(path: &str, map: &Mapping) -> Result<Self> {
        let mut settings = Self::default();
        for (key, value) in map {
            match key.as_str() {
                VARS => settings.vars = expect_mapping(path, key, value)?,
                ENVS | ENV => merge_into(&mut settings.envs, expect_mapping(path, key, value)?),
                SETTINGS => settings.settings = expect_mapping(path, key, value)?,
                BACKEND => settings.backend = expect_mapping(path, key, value)?,
                REMOTE_STATE_BACKEND => {
                    settings.remote_state_backend = expect_mapping(path, key, value)?
                }
                BACKEND_TYPE => settings.backend_type = expect_string(path, key, value)?,
                REMOTE_STATE_BACKEND_TYPE => {
                    settings.remote_state_backend_type = expect_string(path, key, value)?
                }
                _ => {
                    settings.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(settings)
    }

    /// The settings as a component config layer, omitting unset fields.
    pub fn to_mapping(&self) -> Mapping {
        let mut map = Mapping::new();
        let maps = [
            (VARS, &self.vars),
            (ENVS, &self.envs),
            (BACKEND, &self.backend),
            (REMOTE_STATE_BACKEND, &self.remote_state_backend),
            (SETTINGS, &self.settings),
        ];
        for (key, value) in maps {
            if !value.is_empty() {
                map.insert(key.to_string(), Value::Mapping(value.clone()));
            }
        }
        if let Some(backend_type) = &self.backend_type {
            map.insert(BACKEND_TYPE.to_string(), backend_type.as_str().into());
        }
        if let Some(backend_type) = &self.remote_state_backend_type {
            map.insert(REMOTE_STATE_BACKEND_TYPE.to_string(), backend_type.as_str().into());
        }
        map
    }
}

/// One component as authored in a stack file.
///
/// The config keeps every key except `metadata`, with `env` folded into
/// `envs`, so that declarations can be merged as plain mappings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentDeclaration {
    pub config: Mapping,
    pub metadata: Option<Metadata>,
}

impl ComponentDeclaration {
    pub fn from_value(path: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Mapping(map) => Self::from_mapping(path, map),
            other => Err(Error::TypeMismatch {
                path: path.to_string(),
                expected: "mapping",
                found: other.kind(),
            }),
        }
    }

    pub fn from_mapping(path: &str, map: &Mapping) -> Result<Self> {
        let mut config = Mapping::new();
        let mut metadata = None;
        let mut env = None;
        for (key, value) in map {
            match key.as_str() {
                METADATA if !value.is_null() => {
                    metadata = Some(value.deserialize_into(&join_path(path, key))?);
                }
                METADATA => {}
                ENV => env = Some(expect_mapping(path, key, value)?),
                VARS | ENVS | SETTINGS | BACKEND | REMOTE_STATE_BACKEND => {
                    if !value.is_null() {
                        expect_mapping(path, key, value)?;
                    }
                    config.insert(key.clone(), value.clone());
                }
                COMPONENT | COMMAND | BACKEND_TYPE | REMOTE_STATE_BACKEND_TYPE => {
                    expect_string(path, key, value)?;
                    config.insert(key.clone(), value.clone());
                }
                _ => {
                    config.insert(key.clone(), value.clone());
                }
            }
        }
        if let Some(env) = env {
            let mut envs = env;
            if let Some(Value::Mapping(explicit)) = config.get(ENVS) {
                merge_into(&mut envs, explicit.clone());
            }
            config.insert(ENVS.to_string(), Value::Mapping(envs));
        }
        Ok(Self { config, metadata })
    }

    /// The base component this one aliases.
    /// The alias base, if one is named.
    pub fn component(&self) -> Option<&str> {
        self.config
            .get(COMPONENT)
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn command(&self) -> Option<&str> {
        self.config.get(COMMAND).and_then(Value::as_str)
    }

    pub fn inherits(&self) -> &[String] {
        self.metadata
            .as_ref()
            .map(|m| m.inherits.as_slice())
            .unwrap_or_default()
    }

    pub fn is_abstract(&self) -> bool {
        self.metadata.as_ref().is_some_and(Metadata::is_abstract)
    }
}

/// Declarations of one component type, keyed by component name.
pub type ComponentDeclarations = BTreeMap<String, ComponentDeclaration>;

/// The typed view of one stack after all imports have been merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackConfig {
    pub vars: Mapping,
    pub envs: Mapping,
    pub settings: Mapping,
    pub kube_config_provider: Option<String>,
    pub component_type_settings: BTreeMap<String, ComponentTypeSettings>,
    pub components: BTreeMap<String, ComponentDeclarations>,
}

impl StackConfig {
    /// Project a merged stack mapping onto the typed shape.
    ///
    /// `stack` is used to prefix key paths in type mismatch errors.
    pub fn from_mapping(stack: &str, map: &Mapping) -> Result<Self> {
        let mut config = Self {
            vars: map.get_mapping(stack, VARS)?.cloned().unwrap_or_default(),
            envs: map.get_mapping(stack, ENV)?.cloned().unwrap_or_default(),
            settings: map.get_mapping(stack, SETTINGS)?.cloned().unwrap_or_default(),
            kube_config_provider: map
                .get_str(stack, "kube_config_provider")?
                .map(str::to_string),
            ..Default::default()
        };

        for (key, value) in map {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let path = join_path(stack, key);
            let settings = match value {
                Value::Null => ComponentTypeSettings::default(),
                Value::Mapping(block) => ComponentTypeSettings::from_mapping(&path, block)?,
                other => {
                    return Err(Error::TypeMismatch {
                        path,
                        expected: "mapping",
                        found: other.kind(),
                    });
                }
            };
            config.component_type_settings.insert(key.clone(), settings);
        }

        if let Some(components) = map.get_mapping(stack, "components")? {
            let path = join_path(stack, "components");
            for component_type in components.keys() {
                let type_path = join_path(&path, component_type);
                let mut parsed = ComponentDeclarations::new();
                if let Some(declarations) = components.get_mapping(&path, component_type)? {
                    for (name, declaration) in declarations {
                        parsed.insert(
                            name.clone(),
                            ComponentDeclaration::from_value(&join_path(&type_path, name), declaration)?,
                        );
                    }
                }
                config.components.insert(component_type.clone(), parsed);
            }
        }
        Ok(config)
    }

    /// Settings of one component type, empty when the stack has none.
    pub fn type_settings(&self, component_type: &str) -> ComponentTypeSettings {
        self.component_type_settings
            .get(component_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn declarations(&self, component_type: &str) -> Option<&ComponentDeclarations> {
        self.components.get(component_type)
    }

    /// Component types that are either configured or declare components.
    pub fn component_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self
            .component_type_settings
            .keys()
            .chain(self.components.keys())
            .map(String::as_str)
            .collect();
        types.sort_unstable();
        types.dedup();
        types
    }
}

fn expect_mapping(path: &str, key: &str, value: &Value) -> Result<Mapping> {
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map.clone()),
        other => Err(Error::TypeMismatch {
            path: join_path(path, key),
            expected: "mapping",
            found: other.kind(),
        }),
    }
}

fn expect_string(path: &str, key: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(Error::TypeMismatch {
            path: join_path(path, key),
            expected: "string",
            found: other.kind(),
        }),
    }
}
