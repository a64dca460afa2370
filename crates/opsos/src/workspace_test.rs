// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;
use crate::value::Value;

fn vars() -> Mapping {
    let mut vars = Mapping::new();
    vars.insert("tenant".to_string(), Value::from("acme"));
    vars.insert("stage".to_string(), Value::from("dev"));
    vars.insert("team".to_string(), Value::from("platform/network"));
    vars
}

fn metadata(literal: Option<&str>, pattern: Option<&str>) -> Metadata {
    Metadata {
        terraform_workspace: literal.map(str::to_string),
        terraform_workspace_pattern: pattern.map(str::to_string),
        ..Default::default()
    }
}

#[rstest]
#[case(None, None, "dev-vpc")]
#[case(Some("shared"), None, "shared")]
#[case(Some("teams/shared"), None, "teams-shared")]
#[case(None, Some("{{.tenant}}-{{.stage}}"), "acme-dev")]
#[case(Some("shared"), Some("{{.tenant}}-{{.stage}}"), "acme-dev")]
#[case(None, Some("{{.team}}"), "platform-network")]
fn test_workspace_name(
    #[case] literal: Option<&str>,
    #[case] pattern: Option<&str>,
    #[case] expected: &str,
) {
    let metadata = metadata(literal, pattern);
    assert_eq!(
        workspace_name("dev", "vpc", Some(&metadata), &vars()).unwrap(),
        expected
    );
}

#[rstest]
fn test_default_replaces_separators() {
    assert_eq!(
        workspace_name("dev", "infra/vpc", None, &vars()).unwrap(),
        "dev-infra-vpc"
    );
    assert_eq!(
        workspace_name("orgs/acme/dev", "vpc", None, &Mapping::new()).unwrap(),
        "orgs-acme-dev-vpc"
    );
}

#[rstest]
fn test_pattern_with_undefined_variable_fails() {
    let metadata = metadata(Some("shared"), Some("{{.region}}"));
    let err = workspace_name("dev", "vpc", Some(&metadata), &vars()).unwrap_err();
    assert!(
        matches!(err, crate::Error::TemplateRenderFailure { .. }),
        "{err}"
    );
}
