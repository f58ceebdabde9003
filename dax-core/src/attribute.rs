//! Bridge between user-facing attribute maps and their wire form.
//!
//! Attribute values are single-entry maps whose key is a type
//! discriminator: `S`, `N`, `B`, `BOOL`, `NULL`, `SS`, `NS`, `BS`, `L`,
//! `M`. Most of them are structurally identical on the wire; the three set
//! types map to dedicated tagged encodings, and `N` travels as text to
//! preserve precision.

use crate::cbor::CborValue;
use crate::protocol::constants::{
    DOCUMENT_PATH_ORDINAL_KEY, TAG_BINARY_SET, TAG_DOCUMENT_PATH_ORDINAL, TAG_NUMBER_SET,
    TAG_STRING_SET,
};

/// Converts an attribute tree to its wire form.
///
/// `{SS: [..]}`, `{NS: [..]}` and `{BS: [..]}` become tagged sequences
/// (tags 3321, 3322, 3323); `N` scalars are stringified; everything else
/// recurses structurally.
pub fn to_wire(value: &CborValue) -> CborValue {
    match value {
        CborValue::Map(entries) if entries.len() == 1 => {
            let (key, inner) = &entries[0];
            match key.as_text() {
                Some("SS") => CborValue::tagged(TAG_STRING_SET, set_elements(inner, text_scalar)),
                Some("NS") => CborValue::tagged(TAG_NUMBER_SET, set_elements(inner, number_text)),
                Some("BS") => CborValue::tagged(TAG_BINARY_SET, set_elements(inner, Clone::clone)),
                Some("N") => CborValue::map([("N", number_text(inner))]),
                _ => recurse_map(entries),
            }
        }
        CborValue::Map(entries) => recurse_map(entries),
        CborValue::Array(items) => CborValue::Array(items.iter().map(to_wire).collect()),
        other => other.clone(),
    }
}

/// Converts a wire tree back to attribute form.
///
/// The set tags unfold to their discriminator maps, tag 3324 becomes an
/// opaque `_document_path_ordinal` entry, and `N` text is coerced to an
/// integer when it has no decimal point, a float otherwise. Non-numeric
/// `N` text is retained as text.
pub fn from_wire(value: &CborValue) -> CborValue {
    match value {
        CborValue::Tagged(tag, inner) => match *tag {
            TAG_STRING_SET => CborValue::map([("SS", from_wire(inner))]),
            TAG_NUMBER_SET => CborValue::map([("NS", from_wire(inner))]),
            TAG_BINARY_SET => CborValue::map([("BS", from_wire(inner))]),
            TAG_DOCUMENT_PATH_ORDINAL => {
                CborValue::map([(DOCUMENT_PATH_ORDINAL_KEY, (**inner).clone())])
            }
            other => CborValue::tagged(other, from_wire(inner)),
        },
        CborValue::Map(entries) if entries.len() == 1 => {
            let (key, inner) = &entries[0];
            if key.as_text() == Some("N") {
                CborValue::map([("N", parse_number(inner))])
            } else {
                CborValue::Map(
                    entries
                        .iter()
                        .map(|(k, v)| (k.clone(), from_wire(v)))
                        .collect(),
                )
            }
        }
        CborValue::Map(entries) => CborValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), from_wire(v)))
                .collect(),
        ),
        CborValue::Array(items) => CborValue::Array(items.iter().map(from_wire).collect()),
        other => other.clone(),
    }
}

fn recurse_map(entries: &[(CborValue, CborValue)]) -> CborValue {
    CborValue::Map(
        entries
            .iter()
            .map(|(k, v)| (k.clone(), to_wire(v)))
            .collect(),
    )
}

fn set_elements(inner: &CborValue, scalar: impl Fn(&CborValue) -> CborValue) -> CborValue {
    match inner {
        CborValue::Array(items) => CborValue::Array(items.iter().map(|i| scalar(i)).collect()),
        other => other.clone(),
    }
}

fn text_scalar(value: &CborValue) -> CborValue {
    value.clone()
}

/// Numbers always travel as text; numeric inputs are stringified so the
/// producer cannot lose precision silently.
fn number_text(value: &CborValue) -> CborValue {
    match value {
        CborValue::Text(_) => value.clone(),
        CborValue::Unsigned(n) => CborValue::Text(n.to_string()),
        CborValue::Negative(n) => CborValue::Text(n.to_string()),
        CborValue::Float(f) => CborValue::Text(f.to_string()),
        other => other.clone(),
    }
}

fn parse_number(value: &CborValue) -> CborValue {
    let CborValue::Text(text) = value else {
        return value.clone();
    };
    if !text.contains('.') {
        if let Ok(n) = text.parse::<u64>() {
            return CborValue::Unsigned(n);
        }
        if let Ok(n) = text.parse::<i64>() {
            return CborValue::Negative(n);
        }
    }
    if let Ok(f) = text.parse::<f64>() {
        return CborValue::Float(f);
    }
    value.clone()
}
