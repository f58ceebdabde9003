//! Decoder for the compact binary encoding.
//!
//! Decoding is greedy: one top-level value is consumed and the remaining
//! suffix is handed back to the caller, which is how the framing layer
//! splits the concatenated values of a reply. The incremental entry point
//! distinguishes a truncated buffer (more bytes may still arrive on the
//! socket) from genuinely malformed input.

use crate::error::{DaxError, Result};

use super::value::CborValue;
use super::{
    ADDITIONAL_U16, ADDITIONAL_U32, ADDITIONAL_U64, ADDITIONAL_U8, IMMEDIATE_MAX, MAJOR_ARRAY,
    MAJOR_BYTES, MAJOR_MAP, MAJOR_NEGATIVE, MAJOR_SIMPLE, MAJOR_TAG, MAJOR_TEXT, MAJOR_UNSIGNED,
    SIMPLE_FALSE, SIMPLE_FLOAT32, SIMPLE_FLOAT64, SIMPLE_NULL, SIMPLE_TRUE,
};

/// Decodes one value from the front of `input`.
///
/// Returns the value and the unconsumed suffix. Fails with
/// `MalformedEncoding` on reserved header forms, truncated input, invalid
/// UTF-8 text, or a container that ends before its declared length.
pub fn decode(input: &[u8]) -> Result<(CborValue, &[u8])> {
    match try_decode(input)? {
        Some((value, consumed)) => Ok((value, &input[consumed..])),
        None => Err(DaxError::MalformedEncoding(
            "unexpected end of input".to_string(),
        )),
    }
}

/// Attempts to decode one value from the front of `input`.
///
/// Returns `Ok(None)` when the buffer holds a valid prefix of a value but
/// not all of it yet; the connection read loop uses this to keep
/// accumulating chunks. Malformed bytes fail immediately.
pub fn try_decode(input: &[u8]) -> Result<Option<(CborValue, usize)>> {
    let mut reader = Reader { input, pos: 0 };
    match reader.read_value() {
        Ok(value) => Ok(Some((value, reader.pos))),
        Err(Incomplete::NeedMore) => Ok(None),
        Err(Incomplete::Malformed(msg)) => Err(DaxError::MalformedEncoding(msg)),
    }
}

enum Incomplete {
    NeedMore,
    Malformed(String),
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn read_u8(&mut self) -> std::result::Result<u8, Incomplete> {
        let byte = *self.input.get(self.pos).ok_or(Incomplete::NeedMore)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_slice(&mut self, len: usize) -> std::result::Result<&'a [u8], Incomplete> {
        if self.input.len() - self.pos < len {
            return Err(Incomplete::NeedMore);
        }
        let slice = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_argument(&mut self, info: u8) -> std::result::Result<u64, Incomplete> {
        match info {
            n if n <= IMMEDIATE_MAX => Ok(n as u64),
            ADDITIONAL_U8 => Ok(self.read_u8()? as u64),
            ADDITIONAL_U16 => {
                let bytes = self.read_slice(2)?;
                Ok(u16::from_be_bytes([bytes[0], bytes[1]]) as u64)
            }
            ADDITIONAL_U32 => {
                let bytes = self.read_slice(4)?;
                Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64)
            }
            ADDITIONAL_U64 => {
                let bytes = self.read_slice(8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Ok(u64::from_be_bytes(buf))
            }
            other => Err(Incomplete::Malformed(format!(
                "reserved additional info {}",
                other
            ))),
        }
    }

    fn read_value(&mut self) -> std::result::Result<CborValue, Incomplete> {
        let initial = self.read_u8()?;
        let major = initial >> 5;
        let info = initial & 0x1F;

        match major {
            MAJOR_UNSIGNED => Ok(CborValue::Unsigned(self.read_argument(info)?)),
            MAJOR_NEGATIVE => {
                let magnitude = self.read_argument(info)?;
                if magnitude > i64::MAX as u64 {
                    return Err(Incomplete::Malformed(format!(
                        "negative integer -{} overflows",
                        magnitude as u128 + 1
                    )));
                }
                Ok(CborValue::Negative(-1 - magnitude as i64))
            }
            MAJOR_BYTES => {
                let len = self.read_length(info)?;
                Ok(CborValue::Bytes(self.read_slice(len)?.to_vec()))
            }
            MAJOR_TEXT => {
                let len = self.read_length(info)?;
                let bytes = self.read_slice(len)?;
                let text = std::str::from_utf8(bytes).map_err(|_| {
                    Incomplete::Malformed("text string is not valid UTF-8".to_string())
                })?;
                Ok(CborValue::Text(text.to_string()))
            }
            MAJOR_ARRAY => {
                let len = self.read_length(info)?;
                let mut items = Vec::with_capacity(len.min(64));
                for _ in 0..len {
                    items.push(self.read_value()?);
                }
                Ok(CborValue::Array(items))
            }
            MAJOR_MAP => {
                let len = self.read_length(info)?;
                let mut entries = Vec::with_capacity(len.min(64));
                for _ in 0..len {
                    let key = self.read_value()?;
                    let value = self.read_value()?;
                    entries.push((key, value));
                }
                Ok(CborValue::Map(entries))
            }
            MAJOR_TAG => {
                let tag = self.read_argument(info)?;
                let inner = self.read_value()?;
                Ok(CborValue::Tagged(tag, Box::new(inner)))
            }
            MAJOR_SIMPLE => match info {
                SIMPLE_FALSE => Ok(CborValue::Bool(false)),
                SIMPLE_TRUE => Ok(CborValue::Bool(true)),
                SIMPLE_NULL => Ok(CborValue::Null),
                SIMPLE_FLOAT32 => {
                    let bytes = self.read_slice(4)?;
                    let mut buf = [0u8; 4];
                    buf.copy_from_slice(bytes);
                    Ok(CborValue::Float(f32::from_be_bytes(buf) as f64))
                }
                SIMPLE_FLOAT64 => {
                    let bytes = self.read_slice(8)?;
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(bytes);
                    Ok(CborValue::Float(f64::from_be_bytes(buf)))
                }
                other => Err(Incomplete::Malformed(format!(
                    "reserved simple value {}",
                    other
                ))),
            },
            _ => unreachable!("major type is three bits"),
        }
    }

    fn read_length(&mut self, info: u8) -> std::result::Result<usize, Incomplete> {
        let len = self.read_argument(info)?;
        usize::try_from(len)
            .map_err(|_| Incomplete::Malformed(format!("length {} exceeds address space", len)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::encode::encode;
    use super::*;

    fn round_trip(value: CborValue) {
        let bytes = encode(&value);
        let (decoded, rest) = decode(&bytes).unwrap();
        assert_eq!(decoded, value);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_round_trip_scalars() {
        round_trip(CborValue::Unsigned(0));
        round_trip(CborValue::Unsigned(23));
        round_trip(CborValue::Unsigned(24));
        round_trip(CborValue::Unsigned(u64::MAX));
        round_trip(CborValue::Negative(-1));
        round_trip(CborValue::Negative(-1_000_000));
        round_trip(CborValue::Float(3.5));
        round_trip(CborValue::Bool(true));
        round_trip(CborValue::Bool(false));
        round_trip(CborValue::Null);
    }

    #[test]
    fn test_round_trip_strings() {
        round_trip(CborValue::text(""));
        round_trip(CborValue::text("hello"));
        round_trip(CborValue::text("héllo wörld"));
        round_trip(CborValue::bytes(vec![]));
        round_trip(CborValue::bytes(vec![0, 1, 2, 255]));
        round_trip(CborValue::text("x".repeat(300)));
    }

    #[test]
    fn test_round_trip_containers() {
        round_trip(CborValue::Array(vec![]));
        round_trip(CborValue::Array(vec![
            CborValue::Unsigned(1),
            CborValue::text("two"),
            CborValue::Null,
        ]));
        round_trip(CborValue::map([
            ("TableName", CborValue::text("T")),
            (
                "Key",
                CborValue::map([("id", CborValue::map([("S", CborValue::text("x"))]))]),
            ),
        ]));
        round_trip(CborValue::tagged(
            3321,
            CborValue::Array(vec![CborValue::text("a"), CborValue::text("b")]),
        ));
    }

    #[test]
    fn test_decode_returns_remaining_bytes() {
        let mut bytes = encode(&CborValue::Unsigned(5));
        bytes.extend(encode(&CborValue::text("next")));

        let (first, rest) = decode(&bytes).unwrap();
        assert_eq!(first, CborValue::Unsigned(5));

        let (second, rest) = decode(rest).unwrap();
        assert_eq!(second, CborValue::text("next"));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_float32_decodes_to_float() {
        let mut bytes = vec![0xFA];
        bytes.extend(1.5f32.to_be_bytes());
        let (value, _) = decode(&bytes).unwrap();
        assert_eq!(value, CborValue::Float(1.5));
    }

    #[test]
    fn test_try_decode_incomplete() {
        let bytes = encode(&CborValue::text("hello world"));

        for cut in 0..bytes.len() {
            assert!(
                try_decode(&bytes[..cut]).unwrap().is_none(),
                "prefix of {} bytes should be incomplete",
                cut
            );
        }
        let (value, consumed) = try_decode(&bytes).unwrap().unwrap();
        assert_eq!(value, CborValue::text("hello world"));
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_try_decode_incomplete_container() {
        let bytes = encode(&CborValue::map([(
            "Key",
            CborValue::Array(vec![CborValue::Unsigned(1), CborValue::Unsigned(2)]),
        )]));
        assert!(try_decode(&bytes[..bytes.len() - 1]).unwrap().is_none());
    }

    #[test]
    fn test_decode_truncated_fails() {
        let bytes = encode(&CborValue::text("hello"));
        let err = decode(&bytes[..3]).unwrap_err();
        assert!(matches!(err, DaxError::MalformedEncoding(_)));
    }

    #[test]
    fn test_reserved_additional_info_fails() {
        for byte in [0x1C, 0x1D, 0x1E, 0x1F] {
            let err = decode(&[byte]).unwrap_err();
            assert!(matches!(err, DaxError::MalformedEncoding(_)), "byte {:#X}", byte);
        }
    }

    #[test]
    fn test_indefinite_length_fails() {
        // Indefinite-length text string marker.
        let err = decode(&[0x7F]).unwrap_err();
        assert!(matches!(err, DaxError::MalformedEncoding(_)));
    }

    #[test]
    fn test_invalid_utf8_fails() {
        let bytes = vec![0x62, 0xFF, 0xFE];
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, DaxError::MalformedEncoding(_)));
    }

    #[test]
    fn test_reserved_simple_value_fails() {
        // Simple value 23 (undefined) is outside the domain.
        let err = decode(&[0xF7]).unwrap_err();
        assert!(matches!(err, DaxError::MalformedEncoding(_)));
    }

    #[test]
    fn test_negative_overflow_fails() {
        // -(2^64) does not fit a signed 64-bit integer.
        let mut bytes = vec![0x3B];
        bytes.extend(u64::MAX.to_be_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, DaxError::MalformedEncoding(_)));
    }

    #[test]
    fn test_empty_input() {
        assert!(try_decode(&[]).unwrap().is_none());
        assert!(decode(&[]).is_err());
    }
}
