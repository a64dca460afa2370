// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

//! Rendering of `{{ .path.to.var }}` name templates.
//!
//! Only dot-path substitution is supported, which covers stack name,
//! workspace and cluster name patterns such as `{{.tenant}}-{{.stage}}`.

use std::sync::LazyLock;

use regex::Regex;

use crate::value::{Mapping, Value};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./template_test.rs"]
mod template_test;

static ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{-?\s*(.*?)\s*-?\}\}").expect("valid action regex"));

static FIELD_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\.(?:[A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z_][A-Za-z0-9_-]*)*)?$")
        .expect("valid field path regex")
});

/// Render `template`, substituting every action with the value it names in `vars`.
///
/// `{{ . }}` renders the whole mapping. A path to a missing key fails rather
/// than rendering an empty string.
pub fn render_template(template: &str, vars: &Mapping) -> Result<String> {
    let fail = |reason: String| Error::TemplateRenderFailure {
        template: template.to_string(),
        reason,
    };

    let root = Value::Mapping(vars.clone());
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;
    for captures in ACTION.captures_iter(template) {
        let (Some(whole), Some(action)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let literal = &template[last..whole.start()];
        if literal.contains("{{") {
            return Err(fail("unclosed action".to_string()));
        }
        rendered.push_str(literal);

        let action = action.as_str();
        if !FIELD_PATH.is_match(action) {
            return Err(fail(format!("unsupported action '{action}'")));
        }
        let value = root
            .get_path(action)
            .ok_or_else(|| fail(format!("variable '{action}' is not defined")))?;
        rendered.push_str(&value.to_text());
        last = whole.end();
    }

    let rest = &template[last..];
    if rest.contains("{{") {
        return Err(fail("unclosed action".to_string()));
    }
    rendered.push_str(rest);
    Ok(rendered)
}
