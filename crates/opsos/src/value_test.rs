// Copyright (c) Contributors to the opsos project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

fn parse(yaml: &str) -> Value {
    let raw: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
    Value::from(raw)
}

#[rstest]
fn test_from_yaml_preserves_key_order() {
    let value = parse(
        r#"
zeta: 1
alpha: 2
mid: 3
"#,
    );
    let keys: Vec<&str> = value
        .as_mapping()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
}

#[rstest]
fn test_from_yaml_scalars() {
    let value = parse(
        r#"
flag: true
count: 3
ratio: 0.5
name: vpc
empty: null
"#,
    );
    let map = value.as_mapping().unwrap();
    assert_eq!(map["flag"], Value::Bool(true));
    assert_eq!(map["count"], Value::Integer(3));
    assert_eq!(map["ratio"], Value::Float(0.5));
    assert_eq!(map["name"], Value::from("vpc"));
    assert!(map["empty"].is_null());
}

#[rstest]
fn test_non_string_keys_are_stringified() {
    let value = parse(
        r#"
1: one
true: yes
"#,
    );
    let map = value.as_mapping().unwrap();
    assert_eq!(map["1"], Value::from("one"));
    assert!(map.contains_key("true"));
}

#[rstest]
fn test_tags_are_unwrapped() {
    let value = parse("key: !custom value");
    assert_eq!(value.get_path("key"), Some(&Value::from("value")));
}

#[rstest]
fn test_get_path() {
    let value = parse(
        r#"
a:
  b:
    c: deep
  list: [1, 2]
"#,
    );
    assert_eq!(value.get_path("a.b.c"), Some(&Value::from("deep")));
    assert!(value.get_path("a.b").unwrap().as_mapping().is_some());
    assert_eq!(value.get_path("a.missing"), None);
    // a sequence cannot be indexed by key
    assert_eq!(value.get_path("a.list.0"), None);
    assert_eq!(value.get_path(""), Some(&value));
}

#[rstest]
#[case(Value::Null, "")]
#[case(Value::Bool(false), "false")]
#[case(Value::Integer(42), "42")]
#[case(Value::from("text"), "text")]
fn test_to_text(#[case] value: Value, #[case] expected: &str) {
    assert_eq!(value.to_text(), expected);
}

#[rstest]
fn test_serializes_to_json() {
    let value = parse(
        r#"
vars:
  region: us-east-1
  zones: [a, b]
"#,
    );
    let json = serde_json::to_string(&value).unwrap();
    assert_eq!(json, r#"{"vars":{"region":"us-east-1","zones":["a","b"]}}"#);
}

#[rstest]
fn test_deserialize_into_typed() {
    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Settings {
        region: String,
        replicas: i64,
    }

    let value = parse("region: eu-west-1\nreplicas: 3");
    let settings: Settings = value.deserialize_into("settings").unwrap();
    assert_eq!(
        settings,
        Settings {
            region: "eu-west-1".to_string(),
            replicas: 3,
        }
    );

    let err = parse("region: 1").deserialize_into::<Settings>("settings");
    assert!(matches!(err, Err(Error::MergeFailure { .. })));
}

#[rstest]
fn test_mapping_ext_unset_values() {
    let map = parse("present: null").as_mapping().cloned().unwrap();
    assert_eq!(map.get_mapping("stack", "present").unwrap(), None);
    assert_eq!(map.get_str("stack", "missing").unwrap(), None);
    assert!(map.get_string_list("stack", "missing").unwrap().is_empty());
    assert!(map.get_string_map("stack", "missing").unwrap().is_empty());
}

#[rstest]
fn test_mapping_ext_type_mismatch() {
    let map = parse("vars: [a, b]").as_mapping().cloned().unwrap();
    let err = map.get_mapping("orgs/acme/dev", "vars").unwrap_err();
    match err {
        Error::TypeMismatch {
            path,
            expected,
            found,
        } => {
            assert_eq!(path, "orgs/acme/dev.vars");
            assert_eq!(expected, "mapping");
            assert_eq!(found, "sequence");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn test_string_list_accepts_scalar() {
    let map = parse("import: catalog/vpc").as_mapping().cloned().unwrap();
    assert_eq!(
        map.get_string_list("", "import").unwrap(),
        vec!["catalog/vpc".to_string()]
    );

    let map = parse("import: [a, 1]").as_mapping().cloned().unwrap();
    assert!(map.get_string_list("", "import").is_err());
}

#[rstest]
fn test_string_map_renders_scalars() {
    let map = parse(
        r#"
env:
  DEBUG: true
  PORT: 8080
  NAME: api
"#,
    )
    .as_mapping()
    .cloned()
    .unwrap();
    let env = map.get_string_map("", "env").unwrap();
    assert_eq!(env["DEBUG"], "true");
    assert_eq!(env["PORT"], "8080");
    assert_eq!(env["NAME"], "api");
}
