// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use rstest::rstest;
use tempfile::TempDir;

use super::*;

const CONFIG: &str = r#"
apiVersion: opsos/v1
kind: Configuration
spec:
  base_path: /srv/infra
  stacks:
    base_path: stacks
    included_paths: ["orgs/**/*"]
    excluded_paths: ["**/_defaults.yaml"]
    name_pattern: "{{.tenant}}-{{.stage}}"
  terraform:
    base_path: components/terraform
    apply_auto_approve: true
  helmfile:
    base_path: components/helmfile
    kubeconfig_path: /tmp
    envs:
      HELM_DIFF_COLOR: "true"
"#;

fn no_env(_: &str) -> Option<String> {
    None
}

#[rstest]
fn test_parse_spec() {
    let spec = parse_spec(CONFIG, Path::new("opsos.yaml")).unwrap();
    let config = Config::from_spec(spec, no_env).unwrap();
    config.validate().unwrap();

    assert_eq!(config.base_path, PathBuf::from("/srv/infra"));
    assert_eq!(config.stacks.included_paths, vec!["orgs/**/*"]);
    assert_eq!(config.stacks.excluded_paths, vec!["**/_defaults.yaml"]);
    assert_eq!(config.stacks.name_pattern, "{{.tenant}}-{{.stage}}");
    assert!(config.terraform.apply_auto_approve);
    assert!(!config.terraform.deploy_run_init);
    assert_eq!(config.helmfile.kubeconfig_path, Some(PathBuf::from("/tmp")));
    assert_eq!(config.helmfile.envs["HELM_DIFF_COLOR"], "true");
    assert_eq!(config.kind.cluster_name_pattern, None);
    assert_eq!(config.logs.level, None);

    assert_eq!(config.stacks_base_path(), PathBuf::from("/srv/infra/stacks"));
    assert_eq!(
        config.terraform_base_path(),
        PathBuf::from("/srv/infra/components/terraform")
    );
    assert_eq!(
        config.helmfile_base_path(),
        PathBuf::from("/srv/infra/components/helmfile")
    );
}

#[rstest]
#[case("apiVersion: opsos/v2\nkind: Configuration\nspec: {}")]
#[case("apiVersion: opsos/v1\nkind: Stack\nspec: {}")]
#[case("kind: Configuration\nspec: {}")]
#[case("- opsos/v1")]
fn test_parse_spec_rejects_other_resources(#[case] yaml: &str) {
    let err = parse_spec(yaml, Path::new("opsos.yaml")).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "{err}");
}

#[rstest]
fn test_parse_spec_invalid_yaml() {
    let err = parse_spec("spec: [", Path::new("opsos.yaml")).unwrap_err();
    assert!(matches!(err, Error::InvalidYaml { .. }), "{err}");
}

#[rstest]
fn test_missing_spec_is_empty() {
    let spec = parse_spec("apiVersion: opsos/v1\nkind: Configuration", Path::new("opsos.yaml")).unwrap();
    assert!(spec.is_empty());
    let config = Config::from_spec(spec, no_env).unwrap();
    assert_eq!(config, Config::default());
}

#[rstest]
fn test_env_overrides() {
    let spec = parse_spec(CONFIG, Path::new("opsos.yaml")).unwrap();
    let env: HashMap<&str, &str> = [
        ("OPSOS_BASE_PATH", "/opt/infra"),
        ("OPSOS_STACKS_NAME_PATTERN", "{{.stage}}"),
        ("OPSOS_LOG_LEVEL", "debug"),
        ("OPSOS_STACKS_BASE_PATH", ""),
    ]
    .into_iter()
    .collect();

    let config = Config::from_spec(spec, |name| env.get(name).map(|v| v.to_string())).unwrap();
    assert_eq!(config.base_path, PathBuf::from("/opt/infra"));
    assert_eq!(config.stacks.name_pattern, "{{.stage}}");
    assert_eq!(config.logs.level.as_deref(), Some("debug"));
    // empty values do not override
    assert_eq!(config.stacks.base_path, PathBuf::from("stacks"));
}

#[rstest]
fn test_env_overrides_create_sections() {
    let config = Config::from_spec(Mapping::new(), |name| {
        (name == "OPSOS_STACKS_BASE_PATH").then(|| "stacks".to_string())
    })
    .unwrap();
    assert_eq!(config.stacks.base_path, PathBuf::from("stacks"));
}

#[rstest]
fn test_invalid_field_type() {
    let spec = parse_spec(
        "apiVersion: opsos/v1\nkind: Configuration\nspec: {stacks: {included_paths: 3}}",
        Path::new("opsos.yaml"),
    )
    .unwrap();
    let err = Config::from_spec(spec, no_env).unwrap_err();
    assert!(matches!(err, Error::MergeFailure { .. }), "{err}");
}

#[rstest]
fn test_validate_requires_included_paths() {
    let err = Config::default().validate().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "{err}");
}

#[rstest]
fn test_read_and_merge_specs() {
    let system = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let empty = TempDir::new().unwrap();
    std::fs::write(system.path().join(CONFIG_FILENAME), CONFIG).unwrap();
    std::fs::write(
        project.path().join(CONFIG_FILENAME),
        r#"
apiVersion: opsos/v1
kind: Configuration
spec:
  stacks:
    name_pattern: "{{.stage}}"
  logs:
    level: trace
"#,
    )
    .unwrap();

    let dirs = vec![
        system.path().to_path_buf(),
        empty.path().to_path_buf(),
        project.path().to_path_buf(),
    ];
    let spec = read_and_merge_specs(&dirs).unwrap().unwrap();
    let config = Config::from_spec(spec, no_env).unwrap();

    assert_eq!(config.stacks.name_pattern, "{{.stage}}");
    assert_eq!(config.stacks.included_paths, vec!["orgs/**/*"]);
    assert_eq!(config.logs.level.as_deref(), Some("trace"));
    assert_eq!(config.base_path, PathBuf::from("/srv/infra"));
}

#[rstest]
fn test_read_and_merge_specs_without_files() {
    let empty = TempDir::new().unwrap();
    let found = read_and_merge_specs(&[empty.path().to_path_buf()]).unwrap();
    assert_eq!(found, None);
}

#[rstest]
fn test_read_spec_reports_bad_files() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(CONFIG_FILENAME);
    std::fs::write(&path, "apiVersion: other/v1\nkind: Configuration").unwrap();
    let err = read_and_merge_specs(&[tmp.path().to_path_buf()]).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "{err}");

    let err = read_spec(&tmp.path().join("missing.yaml")).unwrap_err();
    assert!(matches!(err, Error::ReadFailed { .. }), "{err}");
}

#[rstest]
fn test_search_paths_are_unique() {
    let paths = search_paths();
    assert!(!paths.is_empty());
    for (i, path) in paths.iter().enumerate() {
        assert!(!paths[i + 1..].contains(path), "{path:?} listed twice");
    }
}
