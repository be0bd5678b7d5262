//! Property tests for key determinism, round-trips, and jitter bounds

use proptest::prelude::*;
use std::collections::BTreeMap;
use swrcache_core::{GetPolicy, IdValue, Jitter, Key, KeyBuilder, ProportionalJitter};

/// Non-empty segment free of leading/trailing whitespace.
fn segment_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9:/ _.~%-]{1,24}"
        .prop_map(|s| s.trim().to_string())
        .prop_filter("segment must be non-empty after trimming", |s| !s.is_empty())
}

fn composite_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    proptest::collection::vec(("[a-z]{1,8}", "[a-zA-Z0-9ü日 -]{1,12}"), 1..6)
}

proptest! {
    /// Equivalent constructor inputs, including composite-id maps built in
    /// different insertion orders, produce byte-identical key strings.
    #[test]
    fn prop_key_determinism(
        domain in segment_strategy(),
        facet in segment_strategy(),
        pairs in composite_strategy(),
    ) {
        let forward: BTreeMap<String, IdValue> = pairs
            .iter()
            .map(|(field, value)| (field.clone(), IdValue::from(value.as_str())))
            .collect();
        let reversed: BTreeMap<String, IdValue> = pairs
            .iter()
            .rev()
            .map(|(field, value)| (field.clone(), IdValue::from(value.as_str())))
            .collect();

        let a = Key::new(&domain, &facet, None, None, IdValue::Composite(forward)).unwrap();
        let b = Key::new(&domain, &facet, None, None, IdValue::Composite(reversed)).unwrap();
        prop_assert_eq!(a.as_str(), b.as_str());
    }

    /// Parsing a serialized key yields a key with the identical string.
    #[test]
    fn prop_key_string_round_trip(
        domain in segment_strategy(),
        facet in segment_strategy(),
        schema in proptest::option::of(segment_strategy()),
        locale in proptest::option::of(segment_strategy()),
        id in segment_strategy()
            .prop_filter("scalar ids must not collide with the composite tag", |s| {
                !s.starts_with("j:")
            }),
    ) {
        // Locale only exists in the wire format alongside a schema version.
        let locale = if schema.is_some() { locale } else { None };
        let key = Key::new(
            &domain,
            &facet,
            schema.as_deref(),
            locale.as_deref(),
            id.as_str(),
        )
        .unwrap();

        let reparsed = KeyBuilder::from_string(key.as_str()).unwrap().build().unwrap();
        prop_assert_eq!(reparsed.as_str(), key.as_str());
    }

    /// Composite ids survive the full string round-trip.
    #[test]
    fn prop_composite_round_trip(
        domain in segment_strategy(),
        facet in segment_strategy(),
        pairs in composite_strategy(),
    ) {
        let id: BTreeMap<String, IdValue> = pairs
            .into_iter()
            .map(|(field, value)| (field, IdValue::from(value)))
            .collect();
        let key = Key::new(&domain, &facet, None, None, IdValue::Composite(id)).unwrap();

        let reparsed = KeyBuilder::from_string(key.as_str()).unwrap().build().unwrap();
        prop_assert_eq!(reparsed.as_str(), key.as_str());
        prop_assert_eq!(reparsed.id(), key.id());
    }

    /// Jittered TTLs stay inside `[max(1, ttl - delta), ttl + delta]`.
    #[test]
    fn prop_jitter_bounds(
        ttl in 1u64..1_000_000,
        percent in 0u64..100,
        id in segment_strategy(),
    ) {
        let key = Key::new("product", "item", None, None, id.as_str()).unwrap();
        let jitter = ProportionalJitter::new(percent);
        let delta = ttl * percent / 100;

        let jittered = jitter.apply(ttl, &key);
        prop_assert!(jittered >= (ttl.saturating_sub(delta)).max(1));
        prop_assert!(jittered <= ttl + delta);
    }

    /// Jitter is a pure function of (ttl, key string, percent).
    #[test]
    fn prop_jitter_determinism(
        ttl in 1u64..1_000_000,
        percent in 0u64..100,
        id in segment_strategy(),
    ) {
        let a = Key::new("product", "item", None, None, id.as_str()).unwrap();
        let b = Key::new("product", "item", None, None, id.as_str()).unwrap();
        let jitter = ProportionalJitter::new(percent);
        prop_assert_eq!(jitter.apply(ttl, &a), jitter.apply(ttl, &b));
    }

    /// Policy validation accepts exactly soft <= hard with hard >= 1.
    #[test]
    fn prop_policy_ranges(hard in 0u64..10_000, soft in 0u64..10_000) {
        let policy = GetPolicy::new(hard, soft);
        if hard >= 1 && soft <= hard {
            prop_assert!(policy.is_ok());
        } else {
            prop_assert!(policy.is_err());
        }
    }
}
