//! Encoder for the compact binary encoding.
//!
//! All multi-byte extensions are big-endian. The shortest of the five
//! header forms (immediate, u8, u16, u32, u64) is always chosen, both for
//! lengths and for tag numbers.

use bytes::{BufMut, BytesMut};

use super::value::CborValue;
use super::{
    ADDITIONAL_U16, ADDITIONAL_U32, ADDITIONAL_U64, ADDITIONAL_U8, IMMEDIATE_MAX, MAJOR_ARRAY,
    MAJOR_BYTES, MAJOR_MAP, MAJOR_NEGATIVE, MAJOR_SIMPLE, MAJOR_TAG, MAJOR_TEXT, MAJOR_UNSIGNED,
    SIMPLE_FALSE, SIMPLE_FLOAT64, SIMPLE_NULL, SIMPLE_TRUE,
};

/// Encodes a value to its self-delimiting byte form.
pub fn encode(value: &CborValue) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(64);
    write_value(&mut buf, value);
    buf.to_vec()
}

/// Appends the encoding of `value` to `buf`.
pub fn write_value(buf: &mut BytesMut, value: &CborValue) {
    match value {
        CborValue::Unsigned(n) => write_header(buf, MAJOR_UNSIGNED, *n),
        CborValue::Negative(n) => {
            if *n < 0 {
                write_header(buf, MAJOR_NEGATIVE, !(*n) as u64);
            } else {
                write_header(buf, MAJOR_UNSIGNED, *n as u64);
            }
        }
        CborValue::Float(f) => {
            buf.put_u8((MAJOR_SIMPLE << 5) | SIMPLE_FLOAT64);
            buf.put_f64(*f);
        }
        CborValue::Bytes(b) => {
            write_header(buf, MAJOR_BYTES, b.len() as u64);
            buf.put_slice(b);
        }
        CborValue::Text(s) => {
            write_header(buf, MAJOR_TEXT, s.len() as u64);
            buf.put_slice(s.as_bytes());
        }
        CborValue::Array(items) => {
            write_header(buf, MAJOR_ARRAY, items.len() as u64);
            for item in items {
                write_value(buf, item);
            }
        }
        CborValue::Map(entries) => {
            write_header(buf, MAJOR_MAP, entries.len() as u64);
            for (key, val) in entries {
                write_value(buf, key);
                write_value(buf, val);
            }
        }
        CborValue::Bool(b) => {
            buf.put_u8((MAJOR_SIMPLE << 5) | if *b { SIMPLE_TRUE } else { SIMPLE_FALSE });
        }
        CborValue::Null => buf.put_u8((MAJOR_SIMPLE << 5) | SIMPLE_NULL),
        CborValue::Tagged(tag, inner) => {
            write_header(buf, MAJOR_TAG, *tag);
            write_value(buf, inner);
        }
    }
}

/// Writes the type header: the major category in the top three bits and the
/// argument in the shortest of the five forms.
fn write_header(buf: &mut BytesMut, major: u8, argument: u64) {
    let base = major << 5;
    if argument <= IMMEDIATE_MAX as u64 {
        buf.put_u8(base | argument as u8);
    } else if argument <= u8::MAX as u64 {
        buf.put_u8(base | ADDITIONAL_U8);
        buf.put_u8(argument as u8);
    } else if argument <= u16::MAX as u64 {
        buf.put_u8(base | ADDITIONAL_U16);
        buf.put_u16(argument as u16);
    } else if argument <= u32::MAX as u64 {
        buf.put_u8(base | ADDITIONAL_U32);
        buf.put_u32(argument as u32);
    } else {
        buf.put_u8(base | ADDITIONAL_U64);
        buf.put_u64(argument);
    }
}
