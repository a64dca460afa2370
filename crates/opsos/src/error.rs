// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for opsos operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with opsos Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading stacks and resolving components.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// A referenced component is not declared in the stack
    #[error("missing component '{component}' in stack '{stack}'{}", referenced_by_message(.referenced_by))]
    #[diagnostic(
        code(opsos::missing_component),
        help("Declare the component under 'components' or fix the reference")
    )]
    MissingComponent {
        stack: String,
        component: String,
        /// The component whose `component` or `metadata.inherits` named the missing one.
        referenced_by: Option<String>,
    },

    /// Stack file not found
    #[error("stack file '{name}' not found at {path:?}")]
    #[diagnostic(code(opsos::missing_stack_file))]
    MissingStackFile { name: String, path: PathBuf },

    /// Import pattern resolved to no files
    #[error("import '{pattern}' in stack file '{importer}' {reason}")]
    #[diagnostic(
        code(opsos::glob_resolution_failure),
        help("Check the import pattern; paths are relative to the stacks base path")
    )]
    GlobResolutionFailure {
        pattern: String,
        importer: String,
        /// Why the pattern produced no files.
        reason: String,
    },

    /// Invalid YAML in a stack or configuration file
    #[error("invalid YAML in {path:?}: {error}")]
    #[diagnostic(code(opsos::invalid_yaml), help("Check the YAML syntax of the file"))]
    InvalidYaml {
        path: PathBuf,
        #[source]
        error: serde_yaml::Error,
    },

    /// Failed to read file
    #[error("failed to read file: {path:?}")]
    #[diagnostic(code(opsos::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Data cannot be merged structurally
    #[error("failed to merge {context}: {reason}")]
    #[diagnostic(code(opsos::merge_failure))]
    MergeFailure { context: String, reason: String },

    /// A configuration value does not have the expected shape
    #[error("expected {expected} at '{path}', found {found}")]
    #[diagnostic(code(opsos::type_mismatch))]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Selected backend type has no settings
    #[error("no settings found for backend type '{backend_type}' of component '{component}' in stack '{stack}'")]
    #[diagnostic(
        code(opsos::backend_config_not_found),
        help("Add an entry for the backend type under 'backend' or change 'backend_type'")
    )]
    BackendConfigNotFound {
        stack: String,
        component: String,
        backend_type: String,
    },

    /// Selected remote state backend type has no settings
    #[error("no settings found for remote state backend type '{backend_type}' of component '{component}' in stack '{stack}'")]
    #[diagnostic(
        code(opsos::remote_state_backend_config_not_found),
        help("Add an entry for the backend type under 'remote_state_backend' or 'backend'")
    )]
    RemoteStateBackendConfigNotFound {
        stack: String,
        component: String,
        backend_type: String,
    },

    /// Template could not be rendered
    #[error("failed to render template '{template}': {reason}")]
    #[diagnostic(code(opsos::template_render_failure))]
    TemplateRenderFailure { template: String, reason: String },

    /// Requested stack does not exist
    #[error("stack '{0}' not found")]
    #[diagnostic(
        code(opsos::stack_not_found),
        help("Run 'opsos list stacks' to see the available stacks")
    )]
    StackNotFound(String),

    /// Import or inheritance cycle
    #[error("cyclic {kind} reference: {}", .chain.join(" -> "))]
    #[diagnostic(
        code(opsos::cyclic_reference),
        help("Remove the circular reference")
    )]
    CyclicReference { kind: &'static str, chain: Vec<String> },

    /// No provider registered for a component type
    #[error("provider plugin not found for component type '{0}'")]
    #[diagnostic(code(opsos::provider_not_found))]
    ProviderNotFound(String),

    /// No opsos.yaml was found
    #[error("opsos.yaml not found in any of the searched paths: {}", display_paths(.0))]
    #[diagnostic(
        code(opsos::config_not_found),
        help("Create an opsos.yaml or point OPSOS_CONFIG_PATH at its directory")
    )]
    ConfigNotFound(Vec<PathBuf>),

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(opsos::invalid_config))]
    InvalidConfig(String),

    /// Operation was cancelled by the caller
    #[error("operation cancelled")]
    #[diagnostic(code(opsos::cancelled))]
    Cancelled,

    /// A background task panicked or was aborted
    #[error("background task failed: {0}")]
    #[diagnostic(code(opsos::task_failed))]
    TaskFailed(String),

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(opsos::io_error))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach the referencing component to a [`Error::MissingComponent`].
    ///
    /// Other errors, and missing-component errors that already carry a
    /// referrer, are returned unchanged.
    pub(crate) fn referenced_by(self, referrer: &str) -> Self {
        match self {
            Self::MissingComponent {
                stack,
                component,
                referenced_by: None,
            } => Self::MissingComponent {
                stack,
                component,
                referenced_by: Some(referrer.to_string()),
            },
            other => other,
        }
    }
}

fn referenced_by_message(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(referrer) => format!(" (referenced by '{referrer}')"),
        None => String::new(),
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
