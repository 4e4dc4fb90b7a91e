use formgen::dsl::cleaner::clean_response;
use formgen::dsl::repair::repair_json;
use proptest::prelude::*;
use serde_json::{Map, Value};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z0-9 ,:{}\\[\\]\"\\\\\n\t/.-]{0,16}".prop_map(Value::String),
    ]
}

fn object() -> impl Strategy<Value = Value> {
    let leaf = scalar();
    let tree = leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    });
    prop::collection::btree_map("[a-zA-Z_]{1,8}", tree, 0..5)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

proptest! {
    #[test]
    fn repair_leaves_valid_compact_json_alone(value in object()) {
        let cleaned = clean_response(&serde_json::to_string(&value).unwrap());
        prop_assert_eq!(repair_json(&cleaned), cleaned);
    }

    #[test]
    fn repair_leaves_valid_pretty_json_alone(value in object()) {
        let cleaned = clean_response(&serde_json::to_string_pretty(&value).unwrap());
        prop_assert_eq!(repair_json(&cleaned), cleaned);
    }

    #[test]
    fn fenced_json_cleans_to_the_object(value in object()) {
        let text = serde_json::to_string_pretty(&value).unwrap();
        let fenced = format!("Sure!\n```json\n{text}\n```\nDone.");
        let cleaned = clean_response(&fenced);
        prop_assert_eq!(serde_json::from_str::<Value>(&cleaned).unwrap(), value);
    }
}
