//! Property-based tests for document layering and plugin identity.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;
use serde_yaml::{Mapping, Value};

use pluginsync::core::document::{deep_fetch, deep_merge};
use pluginsync::core::identity::{plugin_capitalize, PluginIdentity, PluginType};

fn key() -> impl Strategy<Value = String> {
    "[a-e]{1,2}"
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| Value::Number(n.into())),
        "[a-z]{0,6}".prop_map(Value::String),
    ]
}

/// Nested documents up to three levels deep, with sequences as leaves.
fn document() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        scalar(),
        prop::collection::vec(scalar(), 0..3).prop_map(Value::Sequence),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop::collection::vec((key(), inner), 0..4).prop_map(|entries| {
            let mut map = Mapping::new();
            for (k, v) in entries {
                map.insert(Value::String(k), v);
            }
            Value::Mapping(map)
        })
    })
}

fn mapping_document() -> impl Strategy<Value = Value> {
    prop::collection::vec((key(), document()), 0..4).prop_map(|entries| {
        let mut map = Mapping::new();
        for (k, v) in entries {
            map.insert(Value::String(k), v);
        }
        Value::Mapping(map)
    })
}

fn plugin_type_segment() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("collector"), Just("processor"), Just("publisher")]
}

proptest! {
    /// Merging with an empty override changes nothing.
    #[test]
    fn merge_empty_override_is_identity(base in mapping_document()) {
        let merged = deep_merge(&base, &Value::Mapping(Mapping::new()));
        prop_assert_eq!(merged, base);
    }

    /// Merging onto an empty base yields the override.
    #[test]
    fn merge_onto_empty_base(over in mapping_document()) {
        let merged = deep_merge(&Value::Mapping(Mapping::new()), &over);
        prop_assert_eq!(merged, over);
    }

    /// Applying the same override twice is the same as applying it once.
    #[test]
    fn merge_idempotent(base in mapping_document(), over in mapping_document()) {
        let once = deep_merge(&base, &over);
        let twice = deep_merge(&once, &over);
        prop_assert_eq!(once, twice);
    }

    /// Every top-level override key is present in the result; every
    /// non-mapping override value wins outright.
    #[test]
    fn merge_override_wins_on_leaves(base in mapping_document(), over in mapping_document()) {
        let merged = deep_merge(&base, &over);
        let over_map = over.as_mapping().unwrap();
        for (k, v) in over_map {
            let key = k.as_str().unwrap();
            let found = deep_fetch(&merged, &[key]);
            prop_assert!(found.is_some());
            if !v.is_mapping() {
                prop_assert_eq!(found, Some(v));
            }
        }
    }

    /// Keys only the base has survive the merge unchanged.
    #[test]
    fn merge_keeps_base_only_keys(base in mapping_document(), over in mapping_document()) {
        let merged = deep_merge(&base, &over);
        let over_map = over.as_mapping().unwrap();
        for (k, v) in base.as_mapping().unwrap() {
            if !over_map.contains_key(k) {
                prop_assert_eq!(deep_fetch(&merged, &[k.as_str().unwrap()]), Some(v));
            }
        }
    }

    /// Lookups through a missing or non-mapping segment never panic.
    #[test]
    fn fetch_never_panics(doc in document(), path in prop::collection::vec(key(), 0..5)) {
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        let _ = deep_fetch(&doc, &segments);
    }

    /// Plugin type is a pure function of the type segment.
    #[test]
    fn plugin_type_from_name(
        prefix in "[a-z]{1,8}(-[a-z]{1,8}){0,2}",
        kind in plugin_type_segment(),
        name in "[a-z]{1,8}(_[a-z]{1,8}){0,2}",
    ) {
        let repo = format!("{}-{}-{}", prefix, kind, name);
        let first = PluginIdentity::parse(&repo).unwrap();
        let second = PluginIdentity::parse(&repo).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.plugin_type, PluginType::from_segment(kind));
        prop_assert_ne!(first.plugin_type, PluginType::Unknown);
    }

    /// Names without a recognised type segment are rejected.
    #[test]
    fn unrecognised_names_rejected(name in "[a-z]{1,8}(-[a-z]{1,8}){0,3}") {
        let has_type = name
            .split('-')
            .collect::<Vec<_>>()
            .windows(3)
            .any(|w| matches!(w[1], "collector" | "processor" | "publisher"));
        prop_assume!(!has_type);
        prop_assert!(PluginIdentity::parse(&name).is_err());
    }

    /// Capitalization is stable once applied.
    #[test]
    fn capitalize_idempotent(name in "[a-z]{1,8}([-_][a-z]{1,8}){0,3}") {
        let once = plugin_capitalize(&name);
        prop_assert_eq!(plugin_capitalize(&once), once.clone());
        prop_assert!(!once.contains('-') && !once.contains('_'));
    }
}

mod examples {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn nested_merge() {
        assert_eq!(
            deep_merge(&yaml("{a: {x: 1, y: 2}}"), &yaml("{a: {y: 9, z: 3}}")),
            yaml("{a: {x: 1, y: 9, z: 3}}")
        );
    }

    #[test]
    fn arrays_replaced() {
        assert_eq!(
            deep_merge(&yaml("{a: [1, 2]}"), &yaml("{a: [3]}")),
            yaml("{a: [3]}")
        );
    }
}
