// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Dynamic configuration values.
//!
//! Stack files are open-ended: component types, variables and backend
//! settings are all user-defined keys. They are held as [`Value`] trees until
//! every import and inheritance layer has been merged, and only then projected
//! into typed structures.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./value_test.rs"]
mod value_test;

/// Insertion-ordered string keyed map of values.
pub type Mapping = IndexMap<String, Value>;

/// A dynamically typed configuration value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// Short name of the variant, used in type mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) | Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Follow a dot separated path of mapping keys.
    ///
    /// Returns `None` as soon as a segment is missing or a non-mapping value
    /// is encountered before the end of the path.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |current, segment| current.as_mapping()?.get(segment))
    }

    /// Render a scalar as plain text, the way it would appear in a template.
    ///
    /// Collections render as YAML text.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::Sequence(_) | Self::Mapping(_) => serde_yaml::to_string(self)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        }
    }

    /// Convert any serializable value into a [`Value`].
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        let yaml = serde_yaml::to_value(value).map_err(|error| Error::MergeFailure {
            context: "serialized value".to_string(),
            reason: error.to_string(),
        })?;
        Ok(yaml.into())
    }

    /// Decode this value into a typed structure.
    ///
    /// `path` names the location of the value for error reporting.
    pub fn deserialize_into<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let yaml = serde_yaml::to_value(self).map_err(|error| Error::MergeFailure {
            context: path.to_string(),
            reason: error.to_string(),
        })?;
        serde_yaml::from_value(yaml).map_err(|error| Error::MergeFailure {
            context: path.to_string(),
            reason: error.to_string(),
        })
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(b) => Self::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                // u64 values beyond i64 and real floats both land here
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            serde_yaml::Value::String(s) => Self::String(s),
            serde_yaml::Value::Sequence(seq) => {
                Self::Sequence(seq.into_iter().map(Self::from).collect())
            }
            serde_yaml::Value::Mapping(map) => Self::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_to_string(k), Self::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Self::from(tagged.value),
        }
    }
}

fn key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => Value::from(other).to_text(),
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Self::Mapping(value)
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self::Mapping(value.into_iter().map(|(k, v)| (k, Self::String(v))).collect())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Sequence(seq) => seq.serialize(serializer),
            Self::Mapping(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_yaml::Value::deserialize(deserializer).map(Self::from)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Typed accessors over a [`Mapping`].
///
/// Missing keys and explicit nulls are both treated as unset. A present value
/// of the wrong shape is a [`Error::TypeMismatch`] naming `path.key`.
pub trait MappingExt {
    fn get_mapping(&self, path: &str, key: &str) -> Result<Option<&Mapping>>;
    fn get_str(&self, path: &str, key: &str) -> Result<Option<&str>>;
    fn get_string_list(&self, path: &str, key: &str) -> Result<Vec<String>>;
    fn get_string_map(&self, path: &str, key: &str) -> Result<BTreeMap<String, String>>;
}

impl MappingExt for Mapping {
    fn get_mapping(&self, path: &str, key: &str) -> Result<Option<&Mapping>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Mapping(m)) => Ok(Some(m)),
            Some(other) => Err(mismatch(path, key, "mapping", other)),
        }
    }

    fn get_str(&self, path: &str, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(mismatch(path, key, "string", other)),
        }
    }

    fn get_string_list(&self, path: &str, key: &str) -> Result<Vec<String>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Sequence(seq)) => seq
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(mismatch(path, key, "list of strings", other)),
                })
                .collect(),
            Some(other) => Err(mismatch(path, key, "list of strings", other)),
        }
    }

    fn get_string_map(&self, path: &str, key: &str) -> Result<BTreeMap<String, String>> {
        let Some(map) = self.get_mapping(path, key)? else {
            return Ok(BTreeMap::new());
        };
        map.iter()
            .map(|(k, v)| match v {
                Value::Mapping(_) | Value::Sequence(_) => {
                    Err(mismatch(&join_path(path, key), k, "scalar", v))
                }
                scalar => Ok((k.clone(), scalar.to_text())),
            })
            .collect()
    }
}

pub(crate) fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn mismatch(path: &str, key: &str, expected: &'static str, found: &Value) -> Error {
    Error::TypeMismatch {
        path: join_path(path, key),
        expected,
        found: found.kind(),
    }
}
