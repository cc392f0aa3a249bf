//! Property tests for trigger keys, trigger normalisation and partial
//! documents.

use callgate_core::{Partial, RawTrigger, TriggerKey, WireTrigger};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

fn key_strategy() -> impl Strategy<Value = TriggerKey> {
    prop_oneof![
        "[a-z0-9-]{1,12}".prop_map(TriggerKey::string),
        any::<i64>().prop_map(TriggerKey::numeric),
    ]
}

fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[ -~]{0,16}".prop_map(Value::String),
    ]
}

fn object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    let value = scalar_strategy().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    });
    prop::collection::btree_map("[a-z]{1,8}", value, 0..8).prop_map(|m| m.into_iter().collect())
}

#[derive(Debug, Serialize, Deserialize)]
struct Known {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i32>,
}

proptest! {
    #[test]
    fn quoted_keys_stay_verbatim(s in "[ -~]{0,24}") {
        let encoded = serde_json::to_string(&s).unwrap();
        let key: TriggerKey = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(key.as_str(), s.as_str());
        prop_assert_eq!(key.as_i64(), None);
    }

    #[test]
    fn integer_keys_mirror_decimal_text(n in any::<i64>()) {
        let key: TriggerKey = serde_json::from_str(&n.to_string()).unwrap();
        prop_assert_eq!(key.as_i64(), Some(n));
        prop_assert_eq!(key.as_str(), n.to_string());
    }

    #[test]
    fn single_key_appends_after_keys(
        keys in prop::collection::vec(key_strategy(), 0..5),
        key in key_strategy(),
    ) {
        let wire = WireTrigger {
            keys: keys.clone(),
            key: Some(key.clone()),
            ..WireTrigger::default()
        };
        let trigger = RawTrigger::from_wire(wire).unwrap();

        let mut expected = keys;
        expected.push(key);
        prop_assert_eq!(trigger.keys, expected);
    }

    #[test]
    fn manual_body_location_wins(
        own_keys in prop::collection::vec(key_strategy(), 0..4),
        body_keys in prop::collection::vec(key_strategy(), 0..4),
        own_collection in "[a-z]{0,8}",
        body_collection in "[a-z]{1,8}",
    ) {
        let wire = WireTrigger {
            keys: own_keys,
            collection: own_collection,
            body: Some(json!({"collection": body_collection, "keys": body_keys})),
            ..WireTrigger::default()
        };
        let trigger = RawTrigger::from_wire(wire).unwrap();

        prop_assert_eq!(trigger.collection, body_collection);
        prop_assert_eq!(trigger.keys, body_keys);
    }

    #[test]
    fn partial_round_trip_preserves_object(mut object in object_strategy()) {
        // Keep the typed field consistent with its declared type.
        object.remove("id");

        let data = serde_json::to_vec(&object).unwrap();
        let partial: Partial<Known> = Partial::from_slice(&data).unwrap();
        let encoded: Value = serde_json::from_slice(&partial.to_vec().unwrap()).unwrap();

        prop_assert_eq!(encoded, Value::Object(object));
    }
}
