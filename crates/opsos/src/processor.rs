// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Turning stack files into fully processed stacks.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::fs::{BasePathFs, Filesystem, MatcherFs};
use crate::loader::{StackLoader, stack_file_name};
use crate::matcher::include_exclude;
use crate::provider::{ComponentTypeProvider, ProviderRegistry};
use crate::providers::TERRAFORM;
use crate::schema::StackConfig;
use crate::template::render_template;
use crate::value::{Mapping, Value};
use crate::workspace::workspace_name;
use crate::{DEFAULT_STACK_FILE_EXTENSION, Error, Result};

#[cfg(test)]
#[path = "./processor_test.rs"]
mod processor_test;

/// Parallelism used when the platform cannot report it.
const DEFAULT_PARALLELISM: usize = 4;

/// A stack with every component processed by its type's provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stack {
    /// Path of the stack file relative to the stacks base, without extension.
    pub id: String,
    /// The stack name pattern rendered against the stack vars.
    pub name: String,
    pub vars: Mapping,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_config_provider: Option<String>,
    /// Provider output keyed by component type, then component name.
    pub component_types: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Loads stacks from a directory tree and processes their components.
///
/// Cloning is cheap and clones share the same file cache.
#[derive(Debug, Clone)]
pub struct StackProcessor {
    stacks: Arc<dyn Filesystem>,
    loader: Arc<StackLoader>,
    name_pattern: String,
    registry: Arc<ProviderRegistry>,
}

impl StackProcessor {
    /// Create a processor over `fs`.
    ///
    /// Only files accepted by the include/exclude globs are listed as stacks,
    /// but imports may reach any file of `fs`.
    pub fn new<F, I, E>(
        fs: F,
        included: I,
        excluded: E,
        name_pattern: impl Into<String>,
        registry: Arc<ProviderRegistry>,
    ) -> Self
    where
        F: Filesystem + Clone + 'static,
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let stacks = MatcherFs::new(fs.clone(), include_exclude(included, excluded));
        Self {
            stacks: Arc::new(stacks),
            loader: Arc::new(StackLoader::new(Arc::new(fs))),
            name_pattern: name_pattern.into(),
            registry,
        }
    }

    pub fn from_config(config: &Config, registry: Arc<ProviderRegistry>) -> Self {
        let base = config.stacks_base_path();
        tracing::debug!("loading stacks from {}", base.display());
        Self::new(
            BasePathFs::new(base),
            &config.stacks.included_paths,
            &config.stacks.excluded_paths,
            config.stacks.name_pattern.clone(),
            registry,
        )
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Ids of every selected stack file, sorted.
    pub fn stack_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .stacks
            .list_files()?
            .into_iter()
            .filter(|file| file.ends_with(".yaml") || file.ends_with(".yml"))
            .map(|file| stack_file_name(&file).0)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Load and process one stack.
    pub async fn get_stack(&self, name: &str, cancel: &CancelToken) -> Result<Stack> {
        let (id, config) = self.stack_config(name, cancel).await?;
        self.process(id, config)
    }

    /// Load and process several stacks concurrently.
    ///
    /// Results keep the order of `names`. When several stacks fail, the error
    /// of the first one in `names` is returned.
    pub async fn get_stacks(&self, names: &[String], cancel: &CancelToken) -> Result<Vec<Stack>> {
        let limit = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(DEFAULT_PARALLELISM);
        let semaphore = Arc::new(Semaphore::new(limit));

        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let processor = self.clone();
                let semaphore = Arc::clone(&semaphore);
                let cancel = cancel.clone();
                let name = name.clone();
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|err| Error::TaskFailed(err.to_string()))?;
                    processor.get_stack(&name, &cancel).await
                })
            })
            .collect();

        let mut stacks = Vec::with_capacity(handles.len());
        for result in futures::future::join_all(handles).await {
            stacks.push(result.map_err(|err| Error::TaskFailed(err.to_string()))??);
        }
        Ok(stacks)
    }

    /// Every selected stack, processed.
    pub async fn all_stacks(&self, cancel: &CancelToken) -> Result<Vec<Stack>> {
        let names = self.stack_names()?;
        self.get_stacks(&names, cancel).await
    }

    /// Find a stack by its id or its rendered name.
    pub async fn find_stack(&self, name: &str, cancel: &CancelToken) -> Result<Stack> {
        let names = self.stack_names()?;
        let (id, _) = stack_file_name(name);
        if names.contains(&id) {
            return self.get_stack(&id, cancel).await;
        }
        self.get_stacks(&names, cancel)
            .await?
            .into_iter()
            .find(|stack| stack.name == name)
            .ok_or_else(|| Error::StackNotFound(name.to_string()))
    }

    /// Process a single component of a stack.
    ///
    /// Without a component type, the first registered type declaring the
    /// component is used.
    pub async fn describe_component(
        &self,
        stack: &str,
        component_type: Option<&str>,
        component: &str,
        cancel: &CancelToken,
    ) -> Result<Value> {
        let found = self.find_stack(stack, cancel).await?;
        let (_, config) = self.stack_config(&found.id, cancel).await?;

        let component_type = match component_type {
            Some(component_type) => component_type.to_string(),
            None => self
                .registry
                .names()
                .into_iter()
                .find(|t| {
                    config
                        .declarations(t)
                        .is_some_and(|decls| decls.contains_key(component))
                })
                .map(str::to_string)
                .ok_or_else(|| missing_component(&found.id, component))?,
        };

        let provider = self.registry.get(&component_type)?;
        let declaration = config
            .declarations(&component_type)
            .and_then(|decls| decls.get(component))
            .ok_or_else(|| missing_component(&found.id, component))?;
        let context = provider.init_stack_context(&found.name, Arc::clone(&config))?;
        provider.process_component(&context, component, declaration)
    }

    /// The terraform workspace of a component.
    pub async fn workspace(&self, stack: &str, component: &str, cancel: &CancelToken) -> Result<String> {
        let found = self.find_stack(stack, cancel).await?;
        let (_, config) = self.stack_config(&found.id, cancel).await?;
        let provider = self.registry.get(TERRAFORM)?;
        let context = provider.init_stack_context(&found.name, config)?;
        let resolved = context.resolve(component)?;
        workspace_name(&found.name, component, resolved.metadata.as_ref(), &resolved.vars)
    }

    async fn stack_config(&self, name: &str, cancel: &CancelToken) -> Result<(String, Arc<StackConfig>)> {
        let (id, _) = stack_file_name(name);
        tracing::info!("processing stack {id}");
        let merged = self.loader.load(&self.stack_file(name), cancel).await?;
        let config = StackConfig::from_mapping(&id, &merged)?;
        Ok((id, Arc::new(config)))
    }

    /// The file behind a stack reference; ids of `.yml` stacks carry no extension.
    fn stack_file(&self, name: &str) -> String {
        let (id, file) = stack_file_name(name);
        if !name.ends_with(DEFAULT_STACK_FILE_EXTENSION) && !self.stacks.is_file(&file) {
            let alternate = format!("{id}.yml");
            if self.stacks.is_file(&alternate) {
                return alternate;
            }
        }
        file
    }

    fn process(&self, id: String, config: Arc<StackConfig>) -> Result<Stack> {
        let name = self.stack_name(&id, &config.vars)?;

        let mut component_types = BTreeMap::new();
        for component_type in self.registry.names() {
            let provider = self.registry.get(component_type)?;
            component_types.insert(
                component_type.to_string(),
                process_type(provider.as_ref(), &name, &config)?,
            );
        }

        Ok(Stack {
            id,
            name,
            vars: config.vars.clone(),
            kube_config_provider: config.kube_config_provider.clone(),
            component_types,
        })
    }

    fn stack_name(&self, id: &str, vars: &Mapping) -> Result<String> {
        if self.name_pattern.is_empty() {
            return Ok(id.to_string());
        }
        let rendered = render_template(&self.name_pattern, vars)?;
        if rendered.is_empty() {
            return Ok(id.to_string());
        }
        Ok(rendered)
    }
}

fn process_type(
    provider: &dyn ComponentTypeProvider,
    stack_name: &str,
    config: &Arc<StackConfig>,
) -> Result<BTreeMap<String, Value>> {
    let mut components = BTreeMap::new();
    let Some(declarations) = config.declarations(provider.name()) else {
        return Ok(components);
    };
    let context = provider.init_stack_context(stack_name, Arc::clone(config))?;
    for (name, declaration) in declarations {
        tracing::trace!("processing {} component {name} of stack {stack_name}", provider.name());
        components.insert(
            name.clone(),
            provider.process_component(&context, name, declaration)?,
        );
    }
    Ok(components)
}

fn missing_component(stack: &str, component: &str) -> Error {
    Error::MissingComponent {
        stack: stack.to_string(),
        component: component.to_string(),
        referenced_by: None,
    }
}
