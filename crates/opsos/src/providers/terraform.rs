// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use super::{absolute, global_defaults};
use crate::{Error, Result};
use crate::component::ResolvedComponentConfig;
use crate::config::Config;
use crate::merge::merge_into;
use crate::provider::{ComponentTypeProvider, StackContext};
use crate::schema::{ComponentDeclaration, StackConfig};
use crate::value::Value;
use crate::workspace::workspace_name;

pub const COMPONENT_TYPE: &str = "terraform";

/// Everything needed to run terraform for one component.
#[derive(Debug, Clone, Serialize)]
pub struct TerraformComponent {
    #[serde(flatten)]
    pub config: ResolvedComponentConfig,

    /// Root module directory of the final base component.
    pub working_dir: PathBuf,

    /// Deployment artifacts; abstract components have none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub varfile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planfile: Option<String>,

    pub backend_file: String,
}

#[derive(Debug, Clone)]
pub struct TerraformProvider {
    base_path: PathBuf,
}

impl TerraformProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            base_path: absolute(config.terraform_base_path()),
        }
    }

    pub fn component(
        &self,
        context: &StackContext,
        name: &str,
        declaration: &ComponentDeclaration,
    ) -> Result<TerraformComponent> {
        let config = context.resolve(name)?;
        let stack = &context.stack_name;
        // terraform always needs a backend to render backend.tf.json
        if config.backend_type.is_none() {
            return Err(Error::BackendConfigNotFound {
                stack: stack.clone(),
                component: name.to_string(),
                backend_type: String::new(),
            });
        }

        let (workspace, varfile, planfile) = if declaration.is_abstract() {
            (None, None, None)
        } else {
            let prefix = name.replace('/', "-");
            (
                Some(workspace_name(stack, name, config.metadata.as_ref(), &config.vars)?),
                Some(format!("{stack}-{prefix}.terraform.tfvars.json")),
                Some(format!("{stack}-{prefix}.planfile")),
            )
        };

        Ok(TerraformComponent {
            working_dir: self.base_path.join(&config.component),
            workspace,
            varfile,
            planfile,
            backend_file: "backend.tf.json".to_string(),
            config,
        })
    }
}

impl ComponentTypeProvider for TerraformProvider {
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
        declaration: &ComponentDeclaration,
    ) -> Result<Value> {
        Value::from_serializable(&self.component(context, name, declaration)?)
    }
}
