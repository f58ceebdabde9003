//! The in-memory value domain for the wire encoding.

/// A single value in the compact binary encoding.
///
/// This is the shared tree shape used by the codec, the attribute bridge,
/// and request framing. Maps preserve insertion order of their entries; two
/// maps compare equal regardless of entry order.
#[derive(Debug, Clone)]
pub enum CborValue {
    /// An unsigned integer (major type 0).
    Unsigned(u64),
    /// A negative integer (major type 1), stored as its actual value.
    Negative(i64),
    /// A floating point number (major type 7).
    Float(f64),
    /// An opaque byte string (major type 2).
    Bytes(Vec<u8>),
    /// A UTF-8 text string (major type 3).
    Text(String),
    /// A sequence of values (major type 4).
    Array(Vec<CborValue>),
    /// A mapping of key to value (major type 5), insertion-ordered.
    Map(Vec<(CborValue, CborValue)>),
    /// A boolean (major type 7, simple value).
    Bool(bool),
    /// The null value (major type 7, simple value).
    Null,
    /// A tagged value: a numeric tag followed by its payload (major type 6).
    Tagged(u64, Box<CborValue>),
}

impl CborValue {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        CborValue::Text(s.into())
    }

    /// Creates a byte string value.
    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        CborValue::Bytes(b.into())
    }

    /// Creates a map from an iterator of string-keyed entries.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, CborValue)>,
    {
        CborValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (CborValue::Text(k.into()), v))
                .collect(),
        )
    }

    /// Creates a tagged value.
    pub fn tagged(tag: u64, inner: CborValue) -> Self {
        CborValue::Tagged(tag, Box::new(inner))
    }

    /// Returns the text content if this is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CborValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the unsigned integer value if this is one.
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            CborValue::Unsigned(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns this value as a signed integer when it is any integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CborValue::Unsigned(n) => i64::try_from(*n).ok(),
            CborValue::Negative(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the byte string content if this is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CborValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the elements if this is an array.
    pub fn as_array(&self) -> Option<&[CborValue]> {
        match self {
            CborValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries if this is a map.
    pub fn as_map(&self) -> Option<&[(CborValue, CborValue)]> {
        match self {
            CborValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the boolean value if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CborValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns `true` if this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, CborValue::Null)
    }

    /// Looks up a map entry by text key.
    pub fn get(&self, key: &str) -> Option<&CborValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Returns `true` if this is a map containing the given text key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl PartialEq for CborValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CborValue::Unsigned(a), CborValue::Unsigned(b)) => a == b,
            (CborValue::Negative(a), CborValue::Negative(b)) => a == b,
            (CborValue::Float(a), CborValue::Float(b)) => a == b,
            (CborValue::Bytes(a), CborValue::Bytes(b)) => a == b,
            (CborValue::Text(a), CborValue::Text(b)) => a == b,
            (CborValue::Array(a), CborValue::Array(b)) => a == b,
            (CborValue::Bool(a), CborValue::Bool(b)) => a == b,
            (CborValue::Null, CborValue::Null) => true,
            (CborValue::Tagged(ta, va), CborValue::Tagged(tb, vb)) => ta == tb && va == vb,
            // Entry order is producer-chosen and irrelevant to equality.
            (CborValue::Map(a), CborValue::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|entry| b.contains(entry))
                    && b.iter().all(|entry| a.contains(entry))
            }
            _ => false,
        }
    }
}

impl From<&str> for CborValue {
    fn from(s: &str) -> Self {
        CborValue::Text(s.to_string())
    }
}

impl From<String> for CborValue {
    fn from(s: String) -> Self {
        CborValue::Text(s)
    }
}

impl From<u64> for CborValue {
    fn from(n: u64) -> Self {
        CborValue::Unsigned(n)
    }
}

impl From<bool> for CborValue {
    fn from(b: bool) -> Self {
        CborValue::Bool(b)
    }
}
