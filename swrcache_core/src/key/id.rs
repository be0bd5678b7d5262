//! Identifier values and their canonical serialization
//!
//! Scalar ids serialize to their string form verbatim. Composite ids
//! canonicalize to sorted-key JSON (UTF-8 passed through unescaped), then
//! base64url without padding, prefixed with `j:`. Cross-process correctness
//! rests on this serialization being byte-identical for semantically equal
//! ids regardless of how callers assembled them.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Prefix marking a base64url-encoded composite id.
pub(crate) const COMPOSITE_TAG: &str = "j:";

/// The identifier part of a cache key
///
/// Either a scalar string or an ordered mapping of string to scalar/mapping.
/// Sequences of scalars are kept in caller order and serialized positionally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdValue {
    /// Plain scalar identifier
    Scalar(String),
    /// Ordered sequence, serialized positionally
    Sequence(Vec<IdValue>),
    /// Mapping canonicalized by lexicographic key order
    Composite(BTreeMap<String, IdValue>),
}

impl IdValue {
    /// Whether the identifier carries no usable content.
    ///
    /// An empty scalar, an empty mapping, or an empty sequence all fail key
    /// construction.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.trim().is_empty(),
            Self::Sequence(items) => items.is_empty(),
            Self::Composite(map) => map.is_empty(),
        }
    }

    /// Deterministic string form used inside the key string.
    ///
    /// Scalars pass through verbatim; composites and sequences become
    /// `"j:" + base64url(canonical_json)` with padding stripped.
    pub fn canonical_string(&self) -> String {
        match self {
            Self::Scalar(s) => s.clone(),
            Self::Sequence(_) | Self::Composite(_) => {
                let json = serde_json::to_string(&self.to_json())
                    .unwrap_or_else(|_| String::from("null"));
                format!("{}{}", COMPOSITE_TAG, URL_SAFE_NO_PAD.encode(json.as_bytes()))
            }
        }
    }

    /// Parse an id string produced by [`canonical_string`](Self::canonical_string).
    ///
    /// Strings carrying the composite tag decode back into their structured
    /// form; everything else, including a tagged string whose payload is not
    /// valid base64url JSON, parses as a scalar.
    pub fn parse(id_string: &str) -> Self {
        if let Some(encoded) = id_string.strip_prefix(COMPOSITE_TAG) {
            let decoded = URL_SAFE_NO_PAD
                .decode(encoded)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<JsonValue>(&bytes).ok())
                .and_then(|json| Self::from_json(&json));
            if let Some(parsed) = decoded {
                return parsed;
            }
        }
        Self::Scalar(id_string.to_string())
    }

    fn to_json(&self) -> JsonValue {
        match self {
            Self::Scalar(s) => JsonValue::String(s.clone()),
            Self::Sequence(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Composite(map) => {
                // BTreeMap iterates in lexicographic key order, which is the
                // canonical order for the serialized form.
                let mut object = serde_json::Map::with_capacity(map.len());
                for (field, value) in map {
                    object.insert(field.clone(), value.to_json());
                }
                JsonValue::Object(object)
            }
        }
    }

    fn from_json(json: &JsonValue) -> Option<Self> {
        match json {
            JsonValue::String(s) => Some(Self::Scalar(s.clone())),
            JsonValue::Number(n) => Some(Self::Scalar(n.to_string())),
            JsonValue::Bool(b) => Some(Self::Scalar(b.to_string())),
            JsonValue::Array(items) => {
                let parsed = items.iter().map(Self::from_json).collect::<Option<Vec<_>>>()?;
                Some(Self::Sequence(parsed))
            }
            JsonValue::Object(object) => {
                let mut map = BTreeMap::new();
                for (field, value) in object {
                    map.insert(field.clone(), Self::from_json(value)?);
                }
                Some(Self::Composite(map))
            }
            JsonValue::Null => None,
        }
    }
}

impl From<&str> for IdValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for IdValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<u64> for IdValue {
    fn from(value: u64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<i64> for IdValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<u32> for IdValue {
    fn from(value: u32) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<i32> for IdValue {
    fn from(value: i32) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<BTreeMap<String, IdValue>> for IdValue {
    fn from(value: BTreeMap<String, IdValue>) -> Self {
        Self::Composite(value)
    }
}

impl From<Vec<IdValue>> for IdValue {
    fn from(value: Vec<IdValue>) -> Self {
        Self::Sequence(value)
    }
}
