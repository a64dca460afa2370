// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::fs::BasePathFs;

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).expect("Failed to write stack file");
}

fn loader(root: &Path) -> StackLoader {
    StackLoader::new(Arc::new(BasePathFs::new(root)))
}

fn yaml(text: &str) -> Mapping {
    let raw: serde_yaml::Value = serde_yaml::from_str(text).unwrap();
    match Value::from(raw) {
        Value::Mapping(map) => map,
        other => panic!("expected a mapping, got {other:?}"),
    }
}

#[rstest]
#[case("orgs/acme/dev", "orgs/acme/dev", "orgs/acme/dev.yaml")]
#[case("orgs/acme/dev.yaml", "orgs/acme/dev", "orgs/acme/dev.yaml")]
#[case("orgs/acme/dev.yml", "orgs/acme/dev", "orgs/acme/dev.yml")]
#[case("./catalog/vpc", "catalog/vpc", "catalog/vpc.yaml")]
#[case("v1.2/dev", "v1.2/dev", "v1.2/dev.yaml")]
#[case("catalog/**", "catalog/**", "catalog/**/*.yaml")]
#[case("**", "**", "**/*.yaml")]
fn test_stack_file_name(#[case] reference: &str, #[case] name: &str, #[case] file: &str) {
    assert_eq!(stack_file_name(reference), (name.to_string(), file.to_string()));
}

#[rstest]
fn test_document_from_yaml() {
    let doc = StackDocument::from_yaml(
        "orgs/acme/dev",
        r#"
import:
  - orgs/acme/_defaults
  - mixins/*
vars:
  stage: dev
"#,
        Path::new("dev.yaml"),
    )
    .unwrap();
    assert_eq!(doc.name, "orgs/acme/dev");
    assert_eq!(doc.imports, vec!["orgs/acme/_defaults", "mixins/*"]);
    assert_eq!(doc.config, yaml("vars: {stage: dev}"));
}

#[rstest]
#[case("")]
#[case("import: null")]
#[case("import: []")]
fn test_document_without_imports(#[case] text: &str) {
    let doc = StackDocument::from_yaml("empty", text, Path::new("empty.yaml")).unwrap();
    assert!(doc.imports.is_empty());
    assert!(doc.config.is_empty());
}

#[rstest]
fn test_document_rejects_non_mapping() {
    let err = StackDocument::from_yaml("list", "- a\n- b", Path::new("list.yaml")).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");

    let err = StackDocument::from_yaml("bad", "vars: [unclosed", Path::new("bad.yaml")).unwrap_err();
    assert!(matches!(err, Error::InvalidYaml { .. }), "{err}");
}

#[rstest]
#[tokio::test]
async fn test_own_values_override_imports() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "orgs/acme/_defaults.yaml",
        "vars: {tenant: acme, stage: base, region: us-east-1}",
    );
    write(
        tmp.path(),
        "orgs/acme/dev.yaml",
        "import: [orgs/acme/_defaults]\nvars: {stage: dev}",
    );

    let merged = loader(tmp.path())
        .load("orgs/acme/dev", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(
        *merged,
        yaml("vars: {tenant: acme, stage: dev, region: us-east-1}")
    );
}

#[rstest]
#[tokio::test]
async fn test_imports_merge_in_list_order() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "first.yaml", "vars: {k: first, a: 1}");
    write(tmp.path(), "second.yaml", "vars: {k: second, b: 2}");
    write(tmp.path(), "stack.yaml", "import: [first, second]");
    write(tmp.path(), "reversed.yaml", "import: [second, first]");

    let loader = loader(tmp.path());
    let cancel = CancelToken::new();
    let merged = loader.load("stack", &cancel).await.unwrap();
    assert_eq!(*merged, yaml("vars: {k: second, a: 1, b: 2}"));

    let merged = loader.load("reversed", &cancel).await.unwrap();
    assert_eq!(*merged, yaml("vars: {k: first, a: 1, b: 2}"));
}

#[rstest]
#[tokio::test]
async fn test_nested_imports() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "globals.yaml", "vars: {namespace: eg, level: globals}");
    write(
        tmp.path(),
        "orgs/acme/_defaults.yaml",
        "import: [globals]\nvars: {tenant: acme, level: org}",
    );
    write(
        tmp.path(),
        "orgs/acme/dev.yaml",
        "import: orgs/acme/_defaults\nvars: {stage: dev}",
    );

    let merged = loader(tmp.path())
        .load("orgs/acme/dev.yaml", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(
        *merged,
        yaml("vars: {namespace: eg, level: org, tenant: acme, stage: dev}")
    );
}

#[rstest]
#[tokio::test]
async fn test_glob_imports_are_sorted() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "mixins/b.yaml", "vars: {order: b, b: true}");
    write(tmp.path(), "mixins/a.yaml", "vars: {order: a, a: true}");
    write(tmp.path(), "mixins/nested/c.yaml", "vars: {order: c}");
    write(tmp.path(), "stack.yaml", "import: ['mixins/*']");

    let merged = loader(tmp.path())
        .load("stack", &CancelToken::new())
        .await
        .unwrap();
    // a then b; the nested file is not matched by a single star
    assert_eq!(*merged, yaml("vars: {order: b, a: true, b: true}"));
}

#[rstest]
#[tokio::test]
async fn test_duplicate_import_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "base.yaml", "vars: {tags: {team: infra}, zones: [a, b]}");
    write(tmp.path(), "once.yaml", "import: [base]\nvars: {stage: dev}");
    write(tmp.path(), "twice.yaml", "import: [base, base.yaml]\nvars: {stage: dev}");

    let loader = loader(tmp.path());
    let cancel = CancelToken::new();
    let once = loader.load("once", &cancel).await.unwrap();
    let twice = loader.load("twice", &cancel).await.unwrap();
    assert_eq!(*once, *twice);
    // base, once and twice
    assert_eq!(loader.documents_loaded(), 3);
}

#[rstest]
#[tokio::test]
async fn test_missing_literal_import() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "stack.yaml", "import: [catalog/missing]");

    let err = loader(tmp.path())
        .load("stack", &CancelToken::new())
        .await
        .unwrap_err();
    match err {
        Error::MissingStackFile { name, path } => {
            assert_eq!(name, "catalog/missing");
            assert!(path.ends_with("catalog/missing.yaml"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
#[tokio::test]
async fn test_missing_top_level_file() {
    let tmp = TempDir::new().unwrap();
    let err = loader(tmp.path())
        .load("nowhere", &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingStackFile { ref name, .. } if name == "nowhere"), "{err}");
}

#[rstest]
#[tokio::test]
async fn test_glob_without_matches() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "stack.yaml", "import: ['mixins/*']");

    let err = loader(tmp.path())
        .load("stack", &CancelToken::new())
        .await
        .unwrap_err();
    match err {
        Error::GlobResolutionFailure {
            pattern,
            importer,
            reason,
        } => {
            assert_eq!(pattern, "mixins/*");
            assert_eq!(importer, "stack");
            assert_eq!(reason, "does not match any file");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
#[tokio::test]
async fn test_recursive_directory_import() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "catalog/vpc.yaml", "vars: {vpc: true, layer: vpc}");
    write(tmp.path(), "catalog/net/eks.yaml", "vars: {eks: true, layer: eks}");
    write(tmp.path(), "dev.yaml", "import: ['catalog/**']");

    let merged = loader(tmp.path())
        .load("dev", &CancelToken::new())
        .await
        .unwrap();
    // matches are merged in sorted order: catalog/net/eks before catalog/vpc
    assert_eq!(*merged, yaml("vars: {eks: true, layer: vpc, vpc: true}"));
}

#[rstest]
#[tokio::test]
async fn test_invalid_import_pattern() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "dev.yaml", "import: ['catalog/**vpc']");

    let err = loader(tmp.path())
        .load("dev", &CancelToken::new())
        .await
        .unwrap_err();
    match err {
        Error::GlobResolutionFailure {
            pattern,
            importer,
            reason,
        } => {
            assert_eq!(pattern, "catalog/**vpc");
            assert_eq!(importer, "dev");
            assert!(reason.starts_with("is not a valid pattern"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
#[tokio::test]
async fn test_shared_import_resolves_once_across_tasks() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "base.yaml", "vars: {base: true}");
    write(tmp.path(), "a.yaml", "import: [base]\nvars: {name: a}");
    write(tmp.path(), "b.yaml", "import: [base]\nvars: {name: b}");

    let loader = Arc::new(loader(tmp.path()));
    let cancel = CancelToken::new();
    let (a, b) = tokio::join!(loader.load("a", &cancel), loader.load("b", &cancel));
    assert_eq!(*a.unwrap(), yaml("vars: {base: true, name: a}"));
    assert_eq!(*b.unwrap(), yaml("vars: {base: true, name: b}"));

    let base = loader.resolved.get(&"base.yaml".to_string()).unwrap();
    let again = loader.load("base", &cancel).await.unwrap();
    assert!(Arc::ptr_eq(&base, &again));
    assert_eq!(loader.documents_loaded(), 3);
}

#[rstest]
#[tokio::test]
async fn test_import_cycle_is_detected() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.yaml", "import: [b]");
    write(tmp.path(), "b.yaml", "import: [c]");
    write(tmp.path(), "c.yaml", "import: [a]");

    let err = loader(tmp.path())
        .load("a", &CancelToken::new())
        .await
        .unwrap_err();
    match err {
        Error::CyclicReference { kind, chain } => {
            assert_eq!(kind, "import");
            assert_eq!(chain, vec!["a.yaml", "b.yaml", "c.yaml", "a.yaml"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
#[tokio::test]
async fn test_self_import_is_a_cycle() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "self.yaml", "import: [self]");

    let err = loader(tmp.path())
        .load("self", &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CyclicReference { .. }), "{err}");
}

#[rstest]
#[tokio::test]
async fn test_diamond_imports_are_not_cycles() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "root.yaml", "vars: {root: true}");
    write(tmp.path(), "left.yaml", "import: [root]\nvars: {side: left}");
    write(tmp.path(), "right.yaml", "import: [root]\nvars: {side: right}");
    write(tmp.path(), "top.yaml", "import: [left, right]");

    let merged = loader(tmp.path())
        .load("top", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(*merged, yaml("vars: {root: true, side: right}"));
}

#[rstest]
#[tokio::test]
async fn test_cancelled_load() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "stack.yaml", "vars: {}");

    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(cancel.is_cancelled());

    let loader = loader(tmp.path());
    let err = loader.load("stack", &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled), "{err}");

    // a cancelled read leaves nothing behind in the cache
    assert_eq!(loader.documents_loaded(), 0);
    loader.load("stack", &CancelToken::new()).await.unwrap();
}
