// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

use crate::Result;
use crate::schema::Metadata;
use crate::template::render_template;
use crate::value::Mapping;

#[cfg(test)]
#[path = "./workspace_test.rs"]
mod workspace_test;

/// Name of the terraform workspace for a component in a stack.
///
/// A `terraform_workspace_pattern` rendered against `vars` wins over a
/// literal `terraform_workspace`, which wins over `<stack>-<component>`.
/// Path separators never survive into the result.
pub fn workspace_name(
    stack: &str,
    component: &str,
    metadata: Option<&Metadata>,
    vars: &Mapping,
) -> Result<String> {
    let pattern = metadata.and_then(|m| m.terraform_workspace_pattern.as_deref());
    let literal = metadata.and_then(|m| m.terraform_workspace.as_deref());

    let workspace = match (pattern, literal) {
        (Some(pattern), _) => render_template(pattern, vars)?,
        (None, Some(literal)) => literal.to_string(),
        (None, None) => format!("{stack}-{component}"),
    };
    Ok(workspace.replace('/', "-"))
}
