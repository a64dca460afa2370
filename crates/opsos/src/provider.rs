// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Component type providers and their registry.
//!
//! Each component type (terraform, helmfile, ...) has a provider that turns
//! the declarations of that type into the configuration its execution layer
//! consumes. The engine only knows about providers through this trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::component::{ResolvedComponentConfig, resolve_component};
use crate::config::Config;
use crate::providers::{HelmfileProvider, KindProvider, TerraformProvider};
use crate::schema::{ComponentDeclaration, StackConfig};
use crate::value::{Mapping, Value};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./provider_test.rs"]
mod provider_test;

/// Per stack state computed once before the components of a type are processed.
#[derive(Debug, Clone)]
pub struct StackContext {
    pub stack_name: String,
    pub component_type: String,
    pub config: Arc<StackConfig>,
    /// Layer applied underneath every component of the type.
    pub defaults: Mapping,
}

impl StackContext {
    /// Resolve one component of this context's type through its hierarchy.
    pub fn resolve(&self, name: &str) -> Result<ResolvedComponentConfig> {
        let empty = BTreeMap::new();
        let declarations = self
            .config
            .declarations(&self.component_type)
            .unwrap_or(&empty);
        resolve_component(&self.stack_name, &self.defaults, declarations, name)
    }
}

/// Turns component declarations of one type into provider specific output.
pub trait ComponentTypeProvider: Send + Sync + std::fmt::Debug {
    /// The component type handled, which is also its key in stack files.
    fn name(&self) -> &str;

    fn init_stack_context(&self, stack_name: &str, config: Arc<StackConfig>) -> Result<StackContext>;

    fn process_component(
        &self,
        context: &StackContext,
        name: &str,
        declaration: &ComponentDeclaration,
    ) -> Result<Value>;
}

/// Providers keyed by the component type they handle.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ComponentTypeProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in providers configured from `config`.
    pub fn with_defaults(config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TerraformProvider::new(config)));
        registry.register(Arc::new(HelmfileProvider::new(config)));
        registry.register(Arc::new(KindProvider::new(config)));
        registry
    }

    /// Add a provider, replacing and returning any previous one of the same type.
    pub fn register(
        &mut self,
        provider: Arc<dyn ComponentTypeProvider>,
    ) -> Option<Arc<dyn ComponentTypeProvider>> {
        let name = provider.name().to_string();
        tracing::trace!("registering provider for component type {name}");
        self.providers.insert(name, provider)
    }

    pub fn lookup(&self, component_type: &str) -> Option<Arc<dyn ComponentTypeProvider>> {
        self.providers.get(component_type).cloned()
    }

    /// Like [`ProviderRegistry::lookup`], failing when nothing is registered.
    pub fn get(&self, component_type: &str) -> Result<Arc<dyn ComponentTypeProvider>> {
        self.lookup(component_type)
            .ok_or_else(|| Error::ProviderNotFound(component_type.to_string()))
    }

    /// Registered component types, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
