//! Table key schemas and request-level key validation.

use crate::cbor::CborValue;
use crate::error::{DaxError, Result};

/// One key attribute: its name and its scalar type (`S`, `N`, or `B`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchemaElement {
    /// The attribute name.
    pub attribute_name: String,
    /// The attribute type discriminator.
    pub attribute_type: String,
}

impl KeySchemaElement {
    /// Creates a new key schema element.
    pub fn new(attribute_name: impl Into<String>, attribute_type: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            attribute_type: attribute_type.into(),
        }
    }
}

/// The hash key and optional range key of a table.
///
/// Cached per table so request key maps can be checked before any bytes go
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// The mandatory hash key element.
    pub hash: KeySchemaElement,
    /// The optional range key element.
    pub range: Option<KeySchemaElement>,
}

impl KeySchema {
    /// Creates a hash-only schema.
    pub fn hash_only(element: KeySchemaElement) -> Self {
        Self {
            hash: element,
            range: None,
        }
    }

    /// Creates a hash + range schema.
    pub fn with_range(hash: KeySchemaElement, range: KeySchemaElement) -> Self {
        Self {
            hash,
            range: Some(range),
        }
    }

    /// Returns the key attribute names, hash first.
    pub fn key_names(&self) -> Vec<&str> {
        let mut names = vec![self.hash.attribute_name.as_str()];
        if let Some(range) = &self.range {
            names.push(range.attribute_name.as_str());
        }
        names
    }

    /// Returns `true` if `name` is one of this schema's key attributes.
    pub fn contains(&self, name: &str) -> bool {
        self.key_names().contains(&name)
    }

    /// Validates that a request key map names exactly this schema's key
    /// attributes.
    ///
    /// Raised before serialisation: `MissingKey` for a schema attribute
    /// absent from the map, `ExtraKey` for a map attribute outside the
    /// schema.
    pub fn validate_key(&self, key: &CborValue) -> Result<()> {
        let entries = key
            .as_map()
            .ok_or_else(|| DaxError::MissingRequiredField("Key".to_string()))?;

        for name in self.key_names() {
            if !key.contains_key(name) {
                return Err(DaxError::MissingKey(name.to_string()));
            }
        }
        for (entry_key, _) in entries {
            if let Some(name) = entry_key.as_text() {
                if !self.contains(name) {
                    return Err(DaxError::ExtraKey(name.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Extracts this schema's key attributes from an item map.
    ///
    /// Returns `None` unless every key attribute is present, in which case
    /// validation of the projection is meaningful.
    pub fn key_projection(&self, item: &CborValue) -> Option<CborValue> {
        let mut projected = Vec::new();
        for name in self.key_names() {
            let value = item.get(name)?;
            projected.push((CborValue::text(name), value.clone()));
        }
        Some(CborValue::Map(projected))
    }

    /// Builds a schema from a `DescribeTable` reply body.
    ///
    /// The reply's `Table.KeySchema` is a list of
    /// `{AttributeName, KeyType}` maps with `KeyType` of `HASH` or
    /// `RANGE`; the attribute type defaults to `S` when the reply does not
    /// carry one.
    pub fn from_describe_output(body: &CborValue) -> Option<Self> {
        let elements = body.get("Table")?.get("KeySchema")?.as_array()?;

        let mut hash = None;
        let mut range = None;
        for element in elements {
            let name = element.get("AttributeName")?.as_text()?;
            let attribute_type = element
                .get("AttributeType")
                .and_then(|t| t.as_text())
                .unwrap_or("S");
            let key_element = KeySchemaElement::new(name, attribute_type);

            match element.get("KeyType").and_then(|t| t.as_text()) {
                Some("HASH") => hash = Some(key_element),
                Some("RANGE") => range = Some(key_element),
                _ => return None,
            }
        }

        Some(Self {
            hash: hash?,
            range,
        })
    }
}
