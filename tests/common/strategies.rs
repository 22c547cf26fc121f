//! Proptest strategies for queue messages

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Arbitrary JSON values up to a small depth
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 _-]{0,16}".prop_map(Value::String),
    ];

    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Strings that are not valid JSON documents
pub fn non_json_text_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z ,.!?]{0,40}".prop_filter("must not parse as JSON", |text| {
        serde_json::from_str::<Value>(text).is_err()
    })
}

/// Optional metadata as the provider might or might not supply it
pub fn optional_id_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-f0-9-]{1,36}")
}
