//! Stateful key construction
//!
//! The builder collects segments with `with_*` setters and validates on
//! [`build`](KeyBuilder::build). [`from_string`](KeyBuilder::from_string)
//! parses a stored key string back into its components, which is how
//! invalidation workers and admin tooling recover keys from the wire.

use crate::error::{Result, ValidationError};
use crate::key::encode::rawurldecode;
use crate::key::id::IdValue;
use crate::key::Key;

/// Builder for [`Key`]
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    domain: Option<String>,
    facet: Option<String>,
    schema_version: Option<String>,
    locale: Option<String>,
    id: Option<IdValue>,
}

impl KeyBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the domain segment.
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    /// Set the facet segment.
    pub fn with_facet(mut self, facet: &str) -> Self {
        self.facet = Some(facet.to_string());
        self
    }

    /// Set the schema version segment.
    pub fn with_schema_version(mut self, schema_version: &str) -> Self {
        self.schema_version = Some(schema_version.to_string());
        self
    }

    /// Set the locale segment.
    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = Some(locale.to_string());
        self
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: impl Into<IdValue>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Seed the builder from an existing key.
    pub fn from_key(key: &Key) -> Self {
        Self {
            domain: Some(key.domain().to_string()),
            facet: Some(key.facet().to_string()),
            schema_version: key.schema_version().map(str::to_string),
            locale: key.locale().map(str::to_string),
            id: Some(key.id().clone()),
        }
    }

    /// Parse a stored key string back into builder state.
    ///
    /// Splits on `/` and URL-decodes each segment. Positions 0 and 1 are
    /// domain and facet, the last position is the id; with five segments the
    /// middle two are schema version then locale, with four the middle one
    /// is the schema version.
    pub fn from_string(input: &str) -> Result<Self> {
        let segments = input
            .split('/')
            .map(|segment| {
                rawurldecode(segment).ok_or_else(|| {
                    ValidationError::malformed_key_string(input, "segment is not valid URL encoding")
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if segments.len() < 3 {
            return Err(
                ValidationError::malformed_key_string(input, "expected at least 3 segments").into(),
            );
        }
        if segments.len() > 5 {
            return Err(
                ValidationError::malformed_key_string(input, "expected at most 5 segments").into(),
            );
        }

        let id_segment = segments.last().map(String::as_str).unwrap_or_default();
        let id = IdValue::parse(id_segment);

        let mut builder = Self::new()
            .with_domain(&segments[0])
            .with_facet(&segments[1])
            .with_id(id);

        // Middle positions map to schema version then locale, in that order.
        if segments.len() >= 4 {
            builder = builder.with_schema_version(&segments[2]);
        }
        if segments.len() == 5 {
            builder = builder.with_locale(&segments[3]);
        }

        Ok(builder)
    }

    /// Validate and construct the key.
    pub fn build(self) -> Result<Key> {
        let domain = self
            .domain
            .ok_or_else(|| ValidationError::missing_field("domain"))?;
        let facet = self
            .facet
            .ok_or_else(|| ValidationError::missing_field("facet"))?;
        let id = self.id.ok_or_else(|| ValidationError::missing_field("id"))?;

        Key::new(
            &domain,
            &facet,
            self.schema_version.as_deref(),
            self.locale.as_deref(),
            id,
        )
    }
}
