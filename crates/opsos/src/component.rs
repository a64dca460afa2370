// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Resolution of one component through its inheritance hierarchy.
//!
//! A component may name a single base through its `component` field (an
//! alias) and any number of mixins through `metadata.inherits`. The
//! hierarchy is flattened into a precedence list, earliest first:
//!
//! 1. the alias chain of the component, root first
//! 2. for every mixin in order, that mixin's own alias chain
//! 3. the component itself
//!
//! Mixins of alias ancestors and of mixins are not followed. Names reached
//! through more than one path are applied once, at their first position.

use serde::Serialize;

use crate::merge::merge_into;
use crate::schema::{
    BACKEND, BACKEND_TYPE, COMMAND, ComponentDeclaration, ComponentDeclarations, ENVS, Metadata,
    REMOTE_STATE_BACKEND, REMOTE_STATE_BACKEND_TYPE, SETTINGS, VARS,
};
use crate::value::{Mapping, MappingExt};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./component_test.rs"]
mod component_test;

/// A component with its whole hierarchy and type defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedComponentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// The base component this one finally deploys; never empty.
    pub component: String,

    pub vars: Mapping,

    pub envs: Mapping,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,

    /// Settings of the selected backend type only.
    pub backend: Mapping,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_state_backend_type: Option<String>,

    /// Settings of the selected remote state backend type only.
    pub remote_state_backend: Mapping,

    pub settings: Mapping,

    /// The component's own metadata, never inherited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// List the declarations that make up `name`, lowest precedence first.
///
/// The result always ends with `name` and may contain duplicates; see
/// [`dedupe`].
pub fn build_hierarchy(
    stack: &str,
    declarations: &ComponentDeclarations,
    name: &str,
) -> Result<Vec<String>> {
    let mut hierarchy = alias_chain(stack, declarations, name, None)?;
    let own = hierarchy.pop();

    let declaration = lookup(stack, declarations, name, None)?;
    for mixin in declaration.inherits() {
        hierarchy.extend(alias_chain(stack, declarations, mixin, Some(name))?);
    }

    hierarchy.extend(own);
    Ok(hierarchy)
}

/// Drop repeated names, keeping the first occurrence of each.
pub fn dedupe(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Resolve `name` against the declarations of its type.
///
/// `base` holds the component type defaults of the stack; every
/// declaration in the hierarchy overrides it.
pub fn resolve_component(
    stack: &str,
    base: &Mapping,
    declarations: &ComponentDeclarations,
    name: &str,
) -> Result<ResolvedComponentConfig> {
    let declaration = lookup(stack, declarations, name, None)?;
    let hierarchy = dedupe(build_hierarchy(stack, declarations, name)?);
    tracing::debug!("component {name} in stack {stack} resolves through {hierarchy:?}");

    let mut folded = Mapping::new();
    let mut component = None;
    for entry in &hierarchy {
        let layer = lookup(stack, declarations, entry, Some(name))?;
        // the base named closest to the root of the hierarchy is the one deployed
        if component.is_none() {
            component = layer.component().map(str::to_string);
        }
        merge_into(&mut folded, layer.config.clone());
    }

    let mut merged = base.clone();
    merge_into(&mut merged, folded);

    let metadata = declaration.metadata.clone();
    let component = metadata
        .as_ref()
        .and_then(|m| m.component.clone())
        .filter(|c| !c.is_empty())
        .or(component)
        .unwrap_or_else(|| name.to_string());

    let backend_type = non_empty(merged.get_str(name, BACKEND_TYPE)?);
    let backends = merged.get_mapping(name, BACKEND)?.cloned().unwrap_or_default();

    let remote_state_backend_type =
        non_empty(merged.get_str(name, REMOTE_STATE_BACKEND_TYPE)?).or_else(|| backend_type.clone());
    let remote_state_backends = match merged.get_mapping(name, REMOTE_STATE_BACKEND)? {
        Some(explicit) => {
            let mut combined = backends.clone();
            merge_into(&mut combined, explicit.clone());
            combined
        }
        None => backends.clone(),
    };

    let backend = match &backend_type {
        Some(backend_type) => select_backend(name, &backends, backend_type)?.ok_or_else(|| {
            Error::BackendConfigNotFound {
                stack: stack.to_string(),
                component: name.to_string(),
                backend_type: backend_type.clone(),
            }
        })?,
        None => Mapping::new(),
    };
    let remote_state_backend = match &remote_state_backend_type {
        Some(backend_type) => select_backend(name, &remote_state_backends, backend_type)?
            .ok_or_else(|| Error::RemoteStateBackendConfigNotFound {
                stack: stack.to_string(),
                component: name.to_string(),
                backend_type: backend_type.clone(),
            })?,
        None => Mapping::new(),
    };

    Ok(ResolvedComponentConfig {
        command: merged.get_str(name, COMMAND)?.map(str::to_string),
        component,
        vars: merged.get_mapping(name, VARS)?.cloned().unwrap_or_default(),
        envs: merged.get_mapping(name, ENVS)?.cloned().unwrap_or_default(),
        backend_type,
        backend,
        remote_state_backend_type,
        remote_state_backend,
        settings: merged.get_mapping(name, SETTINGS)?.cloned().unwrap_or_default(),
        metadata,
    })
}

/// The alias chain of `name`, root first and `name` last.
fn alias_chain(
    stack: &str,
    declarations: &ComponentDeclarations,
    name: &str,
    referrer: Option<&str>,
) -> Result<Vec<String>> {
    let mut chain: Vec<String> = Vec::new();
    let mut current = name.to_string();
    let mut referrer = referrer.map(str::to_string);
    loop {
        if chain.contains(&current) {
            chain.push(current);
            return Err(Error::CyclicReference {
                kind: "component",
                chain,
            });
        }
        let declaration = lookup(stack, declarations, &current, referrer.as_deref())?;
        let base = declaration.component().map(str::to_string);
        chain.push(current);
        match base {
            Some(base) => {
                referrer = chain.last().cloned();
                current = base;
            }
            None => break,
        }
    }
    chain.reverse();
    Ok(chain)
}

fn lookup<'a>(
    stack: &str,
    declarations: &'a ComponentDeclarations,
    name: &str,
    referrer: Option<&str>,
) -> Result<&'a ComponentDeclaration> {
    declarations.get(name).ok_or_else(|| {
        let err = Error::MissingComponent {
            stack: stack.to_string(),
            component: name.to_string(),
            referenced_by: None,
        };
        match referrer {
            Some(referrer) if referrer != name => err.referenced_by(referrer),
            _ => err,
        }
    })
}

fn select_backend(name: &str, backends: &Mapping, backend_type: &str) -> Result<Option<Mapping>> {
    if !backends.contains_key(backend_type) {
        return Ok(None);
    }
    let path = format!("{name}.{BACKEND}");
    Ok(Some(
        backends
            .get_mapping(&path, backend_type)?
            .cloned()
            .unwrap_or_default(),
    ))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}
