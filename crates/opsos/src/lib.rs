// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! opsos - Stack and Component Configuration Engine
//!
//! This crate turns a tree of YAML stack files into fully resolved,
//! execution ready configuration for every component of every stack.
//!
//! # Overview
//!
//! A stack file imports other files, sets stack wide vars, configures
//! defaults per component type and declares components. Components inherit
//! from a single base component and from any number of mixins. Resolution
//! folds all of that into one configuration per component, which the
//! provider of the component type then turns into what its tooling needs.
//!
//! # Example
//!
//! ```yaml
//! # orgs/acme/dev.yaml
//! import:
//!   - orgs/acme/_defaults
//!   - mixins/region/*
//!
//! vars:
//!   tenant: acme
//!   stage: dev
//!
//! terraform:
//!   backend_type: s3
//!   backend:
//!     s3:
//!       bucket: acme-dev-tfstate
//!
//! components:
//!   terraform:
//!     vpc:
//!       vars:
//!         cidr: 10.0.0.0/16
//!       metadata:
//!         inherits: [vpc-defaults]
//! ```

pub mod cache;
pub mod cancel;
pub mod component;
pub mod config;
pub mod error;
pub mod fs;
pub mod loader;
pub mod matcher;
pub mod merge;
pub mod processor;
pub mod provider;
pub mod providers;
pub mod schema;
pub mod template;
pub mod value;
pub mod workspace;

pub use cache::LoadingCache;
pub use cancel::CancelToken;
pub use component::{ResolvedComponentConfig, build_hierarchy, dedupe, resolve_component};
pub use config::Config;
pub use error::{Error, Result};
pub use fs::{BasePathFs, Filesystem, MatcherFs};
pub use loader::{StackDocument, StackLoader};
pub use merge::{merge, merge_into, merge_values};
pub use processor::{Stack, StackProcessor};
pub use provider::{ComponentTypeProvider, ProviderRegistry, StackContext};
pub use schema::{ComponentDeclaration, ComponentTypeSettings, Metadata, StackConfig};
pub use template::render_template;
pub use value::{Mapping, MappingExt, Value};
pub use workspace::workspace_name;

/// Extension assumed for stack files and imports given without one.
pub const DEFAULT_STACK_FILE_EXTENSION: &str = ".yaml";

/// Well-known filename for the CLI configuration.
pub const CONFIG_FILENAME: &str = "opsos.yaml";
