//! Key fixtures used across the test suites

use std::collections::BTreeMap;
use swrcache_core::{IdValue, Key, KeyPrefix};

/// `product/item/v2/<id>`
pub fn product_item(id: &str) -> Key {
    Key::new("product", "item", Some("v2"), None, id).expect("fixture key is valid")
}

/// `user/profile/v2/en-US/<id>`
pub fn user_profile(id: &str) -> Key {
    Key::new("user", "profile", Some("v2"), Some("en-US"), id).expect("fixture key is valid")
}

/// `catalog/item/<composite id>` with the fields sorted canonically
pub fn catalog_composite(pairs: &[(&str, &str)]) -> Key {
    let id = pairs
        .iter()
        .map(|(field, value)| (field.to_string(), IdValue::from(*value)))
        .collect::<BTreeMap<_, _>>();
    Key::new("catalog", "item", None, None, IdValue::Composite(id)).expect("fixture key is valid")
}

/// Prefix covering `user/profile/v2/en-US`
pub fn user_profile_prefix() -> KeyPrefix {
    KeyPrefix::new("user", "profile", Some("v2"), Some("en-US")).expect("fixture prefix is valid")
}
