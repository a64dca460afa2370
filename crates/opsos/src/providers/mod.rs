// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Built-in component type providers.

use std::path::{Path, PathBuf};

use crate::schema::{ENVS, StackConfig, VARS};
use crate::value::{Mapping, Value};

mod helmfile;
mod kind;
mod terraform;

pub use helmfile::{COMPONENT_TYPE as HELMFILE, HelmfileComponent, HelmfileProvider};
pub use kind::{COMPONENT_TYPE as KIND, KindCluster, KindProvider};
pub use terraform::{COMPONENT_TYPE as TERRAFORM, TerraformComponent, TerraformProvider};

/// Stack wide vars and env, the lowest layer of every component type.
fn global_defaults(config: &StackConfig) -> Mapping {
    let mut defaults = Mapping::new();
    defaults.insert(VARS.to_string(), Value::Mapping(config.vars.clone()));
    defaults.insert(ENVS.to_string(), Value::Mapping(config.envs.clone()));
    defaults
}

/// Where the kubeconfig of a stack is exported to.
fn kubeconfig_path(dir: Option<&Path>, stack: &str) -> Option<PathBuf> {
    dir.map(|dir| dir.join(format!("{stack}-kubecfg")))
}

fn absolute(path: PathBuf) -> PathBuf {
    dunce::canonicalize(&path).unwrap_or(path)
}
