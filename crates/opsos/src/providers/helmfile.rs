// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use super::{absolute, global_defaults, kubeconfig_path};
use crate::Result;
use crate::config::Config;
use crate::merge::merge_into;
use crate::provider::{ComponentTypeProvider, StackContext};
use crate::schema::{ComponentDeclaration, ENVS, StackConfig, VARS};
use crate::template::render_template;
use crate::value::{Mapping, Value};

pub const COMPONENT_TYPE: &str = "helmfile";

/// Everything needed to run helmfile for one component.
#[derive(Debug, Clone, Serialize)]
pub struct HelmfileComponent {
    /// Last path segment of the final base component.
    pub component: String,
    /// Directories above the component, if it is nested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_folder_prefix: Option<String>,
    pub vars: Mapping,
    pub envs: Mapping,
    pub working_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HelmfileProvider {
    base_path: PathBuf,
    kubeconfig_dir: Option<PathBuf>,
    cluster_name_pattern: Option<String>,
    envs: Mapping,
}

impl HelmfileProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            base_path: absolute(config.helmfile_base_path()),
            kubeconfig_dir: config.helmfile.kubeconfig_path.clone(),
            cluster_name_pattern: config
                .helmfile
                .cluster_name_pattern
                .clone()
                .filter(|p| !p.is_empty()),
            envs: config
                .helmfile
                .envs
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect(),
        }
    }

    pub fn component(&self, context: &StackContext, name: &str) -> Result<HelmfileComponent> {
        let resolved = context.resolve(name)?;

        let (component_folder_prefix, component) = match resolved.component.rsplit_once('/') {
            Some((prefix, last)) => (Some(prefix.to_string()), last.to_string()),
            None => (None, resolved.component.clone()),
        };
        let cluster_name = self
            .cluster_name_pattern
            .as_deref()
            .map(|pattern| render_template(pattern, &resolved.vars))
            .transpose()?;

        Ok(HelmfileComponent {
            component,
            component_folder_prefix,
            working_dir: self.base_path.join(&resolved.component),
            kubeconfig_path: kubeconfig_path(self.kubeconfig_dir.as_deref(), &context.stack_name),
            cluster_name,
            vars: resolved.vars,
            envs: resolved.envs,
        })
    }
}

impl ComponentTypeProvider for HelmfileProvider {
    fn name(&self) -> &str {
        COMPONENT_TYPE
    }

    fn init_stack_context(&self, stack_name: &str, config: Arc<StackConfig>) -> Result<StackContext> {
        let mut defaults = Mapping::new();
        defaults.insert(ENVS.to_string(), Value::Mapping(self.envs.clone()));
        merge_into(&mut defaults, global_defaults(&config));

        let settings = config.type_settings(COMPONENT_TYPE);
        let mut layer = Mapping::new();
        layer.insert(VARS.to_string(), Value::Mapping(settings.vars));
        layer.insert(ENVS.to_string(), Value::Mapping(settings.envs));
        merge_into(&mut defaults, layer);

        Ok(StackContext {
            stack_name: stack_name.to_string(),
            component_type: COMPONENT_TYPE.to_string(),
            config,
            defaults,
        })
    }

    fn process_component(
        &self,
        context: &StackContext,
        name: &str,
        _declaration: &ComponentDeclaration,
    ) -> Result<Value> {
        Value::from_serializable(&self.component(context, name)?)
    }
}
