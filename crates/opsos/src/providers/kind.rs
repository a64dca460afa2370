// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use super::{global_defaults, kubeconfig_path};
use crate::Result;
use crate::config::Config;
use crate::merge::merge_into;
use crate::provider::{ComponentTypeProvider, StackContext};
use crate::schema::{ComponentDeclaration, StackConfig};
use crate::template::render_template;
use crate::value::{Mapping, Value};

pub const COMPONENT_TYPE: &str = "kind";

const DEFAULT_CLUSTER_NAME_PATTERN: &str = "{{.stage}}";

/// A local kind cluster whose kubeconfig is exported for a stack.
#[derive(Debug, Clone, Serialize)]
pub struct KindCluster {
    pub cluster_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig_path: Option<PathBuf>,
    pub vars: Mapping,
    pub settings: Mapping,
}

#[derive(Debug, Clone)]
pub struct KindProvider {
    cluster_name_pattern: String,
    kubeconfig_dir: Option<PathBuf>,
}

impl KindProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            cluster_name_pattern: config
                .kind
                .cluster_name_pattern
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_CLUSTER_NAME_PATTERN.to_string()),
            kubeconfig_dir: config.helmfile.kubeconfig_path.clone(),
        }
    }

    pub fn cluster(&self, context: &StackContext, name: &str) -> Result<KindCluster> {
        let resolved = context.resolve(name)?;
        Ok(KindCluster {
            cluster_name: render_template(&self.cluster_name_pattern, &resolved.vars)?,
            kubeconfig_path: kubeconfig_path(self.kubeconfig_dir.as_deref(), &context.stack_name),
            vars: resolved.vars,
            settings: resolved.settings,
        })
    }
}

impl ComponentTypeProvider for KindProvider {
    fn name(&self) -> &str {
        COMPONENT_TYPE
    }

    fn init_stack_context(&self, stack_name: &str, config: Arc<StackConfig>) -> Result<StackContext> {
        let mut defaults = global_defaults(&config);
        merge_into(&mut defaults, config.type_settings(COMPONENT_TYPE).to_mapping());
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
        Value::from_serializable(&self.cluster(context, name)?)
    }
}
