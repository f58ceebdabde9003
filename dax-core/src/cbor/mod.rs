//! Self-delimiting compact binary encoding (a CBOR-compatible dialect).
//!
//! One initial byte carries a three-bit major category and a five-bit
//! argument; arguments of 24 and above spill into one of four big-endian
//! extension forms. Values nest without any outer framing, which is what
//! lets the connection layer split a byte stream into messages purely by
//! decoding.

mod decode;
mod encode;
mod value;

pub use decode::{decode, try_decode};
pub use encode::{encode, write_value};
pub use value::CborValue;

/// Major type 0: unsigned integer.
pub(crate) const MAJOR_UNSIGNED: u8 = 0;
/// Major type 1: negative integer.
pub(crate) const MAJOR_NEGATIVE: u8 = 1;
/// Major type 2: byte string.
pub(crate) const MAJOR_BYTES: u8 = 2;
/// Major type 3: UTF-8 text string.
pub(crate) const MAJOR_TEXT: u8 = 3;
/// Major type 4: sequence.
pub(crate) const MAJOR_ARRAY: u8 = 4;
/// Major type 5: mapping.
pub(crate) const MAJOR_MAP: u8 = 5;
/// Major type 6: tagged value.
pub(crate) const MAJOR_TAG: u8 = 6;
/// Major type 7: simple values and floats.
pub(crate) const MAJOR_SIMPLE: u8 = 7;

/// Largest argument that fits in the initial byte.
pub(crate) const IMMEDIATE_MAX: u8 = 23;
/// Additional info selecting a one-byte extension.
pub(crate) const ADDITIONAL_U8: u8 = 24;
/// Additional info selecting a two-byte extension.
pub(crate) const ADDITIONAL_U16: u8 = 25;
/// Additional info selecting a four-byte extension.
pub(crate) const ADDITIONAL_U32: u8 = 26;
/// Additional info selecting an eight-byte extension.
pub(crate) const ADDITIONAL_U64: u8 = 27;

/// Simple value: false.
pub(crate) const SIMPLE_FALSE: u8 = 20;
/// Simple value: true.
pub(crate) const SIMPLE_TRUE: u8 = 21;
/// Simple value: null.
pub(crate) const SIMPLE_NULL: u8 = 22;
/// Additional info for a 32-bit float.
pub(crate) const SIMPLE_FLOAT32: u8 = 26;
/// Additional info for a 64-bit float.
pub(crate) const SIMPLE_FLOAT64: u8 = 27;
