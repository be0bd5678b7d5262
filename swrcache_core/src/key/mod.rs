//! Hierarchical cache keys
//!
//! A [`Key`] is an immutable fingerprint of a cached entity. It encodes
//! domain, facet, optional schema version and locale, and an identifier into
//! a storage-ready string. Two keys built from semantically equal inputs
//! produce byte-identical key strings, which is what makes the single-flight
//! lock and invalidation protocols correct across processes.

use crate::error::{Result, ValidationError};

pub mod builder;
pub mod encode;
pub mod id;

pub use builder::KeyBuilder;
pub use id::IdValue;

use encode::rawurlencode;

/// Immutable hierarchical cache key
///
/// Constructed through [`Key::new`] or [`KeyBuilder`]. All derived strings
/// are computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    domain: String,
    facet: String,
    schema_version: Option<String>,
    locale: Option<String>,
    id: IdValue,
    id_string: String,
    prefix_string: String,
    key_string: String,
}

impl Key {
    /// Create a key from its components.
    ///
    /// Segments are trimmed; empty or whitespace-only segments (including an
    /// empty id) fail with a validation error.
    pub fn new(
        domain: &str,
        facet: &str,
        schema_version: Option<&str>,
        locale: Option<&str>,
        id: impl Into<IdValue>,
    ) -> Result<Self> {
        let domain = normalize_segment(domain, "domain")?;
        let facet = normalize_segment(facet, "facet")?;
        let schema_version = schema_version
            .map(|v| normalize_segment(v, "schema_version"))
            .transpose()?;
        let locale = locale
            .map(|v| normalize_segment(v, "locale"))
            .transpose()?;

        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::empty_segment("id").into());
        }

        let id_string = id.canonical_string();
        let prefix_string = join_encoded(
            [
                Some(domain.as_str()),
                Some(facet.as_str()),
                schema_version.as_deref(),
                locale.as_deref(),
            ]
            .into_iter()
            .flatten(),
        );
        let key_string = format!("{}/{}", prefix_string, rawurlencode(&id_string));

        Ok(Self {
            domain,
            facet,
            schema_version,
            locale,
            id,
            id_string,
            prefix_string,
            key_string,
        })
    }

    /// Start building a key.
    pub fn builder() -> KeyBuilder {
        KeyBuilder::new()
    }

    /// Top-level namespace segment.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Second-level namespace segment.
    pub fn facet(&self) -> &str {
        &self.facet
    }

    /// Payload schema discriminator, when present.
    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    /// Per-language partition, when present.
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// The identifier value.
    pub fn id(&self) -> &IdValue {
        &self.id
    }

    /// Deterministic string form of the identifier.
    pub fn id_string(&self) -> &str {
        &self.id_string
    }

    /// Namespace segments, id excluded: `[domain, facet, (schema?), (locale?)]`.
    pub fn prefix_segments(&self) -> Vec<&str> {
        [
            Some(self.domain.as_str()),
            Some(self.facet.as_str()),
            self.schema_version.as_deref(),
            self.locale.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// All segments including the id string.
    pub fn segments(&self) -> Vec<&str> {
        let mut segments = self.prefix_segments();
        segments.push(&self.id_string);
        segments
    }

    /// Encoded namespace prefix, id excluded.
    pub fn prefix_string(&self) -> &str {
        &self.prefix_string
    }

    /// The full storage-ready key string.
    pub fn as_str(&self) -> &str {
        &self.key_string
    }

    /// The namespace prefix of this key as a standalone selector.
    pub fn prefix(&self) -> KeyPrefix {
        KeyPrefix {
            domain: self.domain.clone(),
            facet: self.facet.clone(),
            schema_version: self.schema_version.clone(),
            locale: self.locale.clone(),
            prefix_string: self.prefix_string.clone(),
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key_string)
    }
}

/// Namespace prefix covering every key under a domain/facet subtree
///
/// Used by hierarchical invalidation. Narrower prefixes (with schema version
/// and locale) scope the clear to a single payload partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    domain: String,
    facet: String,
    schema_version: Option<String>,
    locale: Option<String>,
    prefix_string: String,
}

impl KeyPrefix {
    /// Create a prefix from namespace segments.
    pub fn new(
        domain: &str,
        facet: &str,
        schema_version: Option<&str>,
        locale: Option<&str>,
    ) -> Result<Self> {
        let domain = normalize_segment(domain, "domain")?;
        let facet = normalize_segment(facet, "facet")?;
        let schema_version = schema_version
            .map(|v| normalize_segment(v, "schema_version"))
            .transpose()?;
        let locale = locale
            .map(|v| normalize_segment(v, "locale"))
            .transpose()?;

        let prefix_string = join_encoded(
            [
                Some(domain.as_str()),
                Some(facet.as_str()),
                schema_version.as_deref(),
                locale.as_deref(),
            ]
            .into_iter()
            .flatten(),
        );

        Ok(Self {
            domain,
            facet,
            schema_version,
            locale,
            prefix_string,
        })
    }

    /// Top-level namespace segment.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Second-level namespace segment.
    pub fn facet(&self) -> &str {
        &self.facet
    }

    /// Payload schema discriminator, when present.
    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    /// Per-language partition, when present.
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Encoded prefix string, no trailing separator.
    pub fn prefix_string(&self) -> &str {
        &self.prefix_string
    }

    /// This prefix widened to its domain/facet subtree, dropping the schema
    /// version and locale partitions.
    pub fn subtree(&self) -> KeyPrefix {
        let prefix_string = join_encoded([self.domain.as_str(), self.facet.as_str()].into_iter());
        KeyPrefix {
            domain: self.domain.clone(),
            facet: self.facet.clone(),
            schema_version: None,
            locale: None,
            prefix_string,
        }
    }
}

impl std::fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.prefix_string)
    }
}

/// Target of an invalidation: a single key's subtree or an explicit prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// A concrete key; hierarchical operations use its namespace prefix
    Key(Key),
    /// A bare namespace prefix
    Prefix(KeyPrefix),
}

impl Selector {
    /// The namespace prefix this selector scopes to.
    pub fn prefix_string(&self) -> &str {
        match self {
            Self::Key(key) => key.prefix_string(),
            Self::Prefix(prefix) => prefix.prefix_string(),
        }
    }

    /// The exact key, when the selector names one.
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Self::Key(key) => Some(key),
            Self::Prefix(_) => None,
        }
    }

    /// The selector's namespace as a standalone prefix.
    pub fn to_prefix(&self) -> KeyPrefix {
        match self {
            Self::Key(key) => key.prefix(),
            Self::Prefix(prefix) => prefix.clone(),
        }
    }
}

impl From<Key> for Selector {
    fn from(key: Key) -> Self {
        Self::Key(key)
    }
}

impl From<KeyPrefix> for Selector {
    fn from(prefix: KeyPrefix) -> Self {
        Self::Prefix(prefix)
    }
}

fn normalize_segment(value: &str, segment: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty_segment(segment).into());
    }
    Ok(trimmed.to_string())
}

fn join_encoded<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    segments
        .map(rawurlencode)
        .collect::<Vec<_>>()
        .join("/")
}
