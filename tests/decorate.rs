//! End-to-end decoration scenarios.

use serde_json::json;
use std::sync::Arc;
use std::thread;
use value_decorator::{
    decorator, Decorator, Map, RuleSet, RuleSetConfig, RulesFile, TransformError, Value,
    ValueTransform,
};

fn profile() -> Value {
    let mut map = match Value::from(json!({
        "name": "Oliver Brooks",
        "dontShow": "superSecret",
        "sillyNameForDescription": "Writing coffeescript at the moment!",
        "createdAt": "2014-04-29T16:52:39Z",
        "contactDetails": [
            {"type": "phone", "value": "myPhoneNumber"},
            {"type": "email", "value": "myEmailAddress"}
        ]
    })) {
        Value::Object(map) => map,
        _ => unreachable!(),
    };

    map.insert(
        "ohNoAFunction".to_string(),
        Value::function(|_| Value::from("Don't want functions in our output do we?")),
    );
    map.insert(
        "otherArray".to_string(),
        Value::Array(vec![
            Value::from("fish"),
            Value::from(1),
            Value::function(|_| Value::from("function output")),
            Value::from(json!({"object": "pig"})),
        ]),
    );
    Value::Object(map)
}

#[test]
fn default_decorator_strips_functions() {
    let out = Decorator::new(RuleSet::default()).decorate(profile()).unwrap();

    assert!(out.get("ohNoAFunction").is_none());
    assert_eq!(out["name"].as_str(), Some("Oliver Brooks"));
}

#[test]
fn default_decorator_returns_undefined_without_input() {
    let decorate = decorator(RuleSetConfig::default());
    assert!(decorate(Value::Undefined).unwrap().is_undefined());
}

#[test]
fn restricted_keys_are_removed() {
    let rules = RuleSet::builder().restrict("dontShow").build();
    let out = Decorator::new(rules).decorate(profile()).unwrap();

    assert!(out.get("dontShow").is_none());
    assert_eq!(out["name"].as_str(), Some("Oliver Brooks"));
}

#[test]
fn translations_rename_keys() {
    let rules = RuleSet::builder()
        .translate("sillyNameForDescription", "description")
        .build();
    let out = Decorator::new(rules).decorate(profile()).unwrap();

    assert!(out.get("sillyNameForDescription").is_none());
    assert_eq!(
        out["description"].as_str(),
        Some("Writing coffeescript at the moment!")
    );
    assert_eq!(out["name"].as_str(), Some("Oliver Brooks"));
}

#[test]
fn value_transforms_replace_values() {
    let rules = RuleSet::builder()
        .value_transform("createdAt", ValueTransform::builtin("epochMillis"))
        .build();
    let out = Decorator::new(rules).decorate(profile()).unwrap();

    assert_eq!(out["createdAt"].as_i64(), Some(1398790359000));
    assert_eq!(out["name"].as_str(), Some("Oliver Brooks"));
}

#[test]
fn nested_arrays_are_decorated() {
    let rules = RuleSet::builder().restrict("type").build();
    let out = Decorator::new(rules).decorate(profile()).unwrap();

    assert_eq!(
        out["contactDetails"].to_json(),
        json!([{"value": "myPhoneNumber"}, {"value": "myEmailAddress"}])
    );
    assert_eq!(out["otherArray"].as_array().map(Vec::len), Some(3));
    assert_eq!(out["otherArray"].to_json(), json!(["fish", 1, {"object": "pig"}]));
}

#[test]
fn stored_document_scenario() {
    let rules = RuleSet::builder()
        .restrict("__v")
        .translate("_id", "uid")
        .value_transform("createdAt", ValueTransform::builtin("epochMillis"))
        .build();

    let out = Decorator::new(rules)
        .decorate(Value::from(json!({
            "_id": "abc",
            "desc": "x",
            "createdAt": "Tue Apr 29 2014 16:52:39 GMT+0000 (UTC)",
            "__v": 3
        })))
        .unwrap();

    assert_eq!(
        out.to_json(),
        json!({"uid": "abc", "desc": "x", "createdAt": 1398790359000i64})
    );
}

#[test]
fn demo_pipeline_with_generic_transform() {
    let decorate = decorator(RuleSetConfig {
        restricted_keys: vec!["__v".to_string()],
        translations: [("_id".to_string(), "uid".to_string())].into_iter().collect(),
        value_transforms: [(
            "createdAt".to_string(),
            ValueTransform::builtin("epochMillis"),
        )]
        .into_iter()
        .collect(),
        transforms: vec![Arc::new(|node: &mut Map, key: &str, value: &Value| {
            if key == "desc" {
                if let Some(text) = value.as_str() {
                    node.insert("description".to_string(), Value::from(format!("'{text}'")));
                }
                node.shift_remove(key);
            }
        })],
        ..Default::default()
    });

    let out = decorate(Value::from(json!({
        "_id": "5332a1499c8fd2412ba94c90",
        "desc": "test desc",
        "name": "Fish",
        "createdAt": "Tue Apr 29 2014 16:52:39 GMT+0000 (UTC)",
        "__v": 3
    })))
    .unwrap();

    assert_eq!(out["uid"].as_str(), Some("5332a1499c8fd2412ba94c90"));
    assert_eq!(out["description"].as_str(), Some("'test desc'"));
    assert_eq!(out["name"].as_str(), Some("Fish"));
    assert_eq!(out["createdAt"].as_i64(), Some(1398790359000));
    assert!(out.get("__v").is_none());
    assert!(out.get("desc").is_none());
}

#[test]
fn empty_object_values_are_absent() {
    let out = Decorator::new(RuleSet::default())
        .decorate(Value::from(json!({"settings": {}, "id": 7})))
        .unwrap();

    assert!(out.get("settings").is_none());
    assert_eq!(out.to_json(), json!({"id": 7}));
}

#[test]
fn array_compaction_drops_falsy_and_empty_elements() {
    let input = Value::Array(vec![
        Value::function(|_| Value::Null),
        Value::from(5),
        Value::from(""),
        Value::from(json!({})),
        Value::from(json!({"a": 1})),
    ]);

    let out = Decorator::new(RuleSet::default()).decorate(input).unwrap();
    assert_eq!(out.to_json(), json!([5, {"a": 1}]));
}

#[test]
fn second_pass_does_not_reapply_rename() {
    let rules = RuleSet::builder()
        .translate("_id", "uid")
        .translate("uid", "legacyUid")
        .build();
    let engine = Decorator::new(rules);

    let first = engine.decorate(Value::from(json!({"_id": "abc"}))).unwrap();
    assert_eq!(first.to_json(), json!({"legacyUid": "abc"}));

    // `_id` is gone after the first pass, so only renames matching the new keys apply.
    let second = engine.decorate(first.clone()).unwrap();
    assert_eq!(second, first);
}

#[test]
fn value_transforms_are_not_idempotent() {
    let rules = RuleSet::builder()
        .transform_value("count", |v| {
            v.as_i64()
                .map(|n| Value::from(n + 1))
                .ok_or_else(|| TransformError::custom("not a number"))
        })
        .build();
    let engine = Decorator::new(rules);

    let once = engine.decorate(Value::from(json!({"count": 1}))).unwrap();
    let twice = engine.decorate(once.clone()).unwrap();

    assert_eq!(once.to_json(), json!({"count": 2}));
    assert_eq!(twice.to_json(), json!({"count": 3}));
}

#[test]
fn rule_set_is_shared_across_threads() {
    let engine = Decorator::new(RuleSet::builder().restrict("secret").build());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = engine.clone();
            thread::spawn(move || {
                engine
                    .decorate(Value::from(json!({"id": i, "secret": "s"})))
                    .unwrap()
                    .to_json()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), json!({"id": i}));
    }
}

#[test]
fn rules_file_drives_decoration() {
    let rules = RulesFile::from_yaml_str(
        r#"
        restricted: [__v, password]
        keyTransforms:
          _id: uid
        valueTransforms:
          createdAt: epochMillis
          email: { replace: "^[^@]+", with: "***" }
          card: mask
        "#,
    )
    .unwrap()
    .into_rule_set()
    .unwrap();

    let out = Decorator::new(rules)
        .decorate(Value::from(json!({
            "_id": "abc",
            "password": "hunter2",
            "email": "oliver@example.com",
            "card": "4111111111111111",
            "createdAt": "2014-04-29T16:52:39Z",
            "__v": 0
        })))
        .unwrap();

    assert_eq!(
        out.to_json(),
        json!({
            "uid": "abc",
            "email": "***@example.com",
            "card": "************1111",
            "createdAt": 1398790359000i64
        })
    );
}
