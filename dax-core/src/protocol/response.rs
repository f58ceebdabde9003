//! Reply parsing.
//!
//! A reply is two concatenated top-level values: an error descriptor (a
//! possibly empty sequence) followed by the method-specific body. A
//! non-empty descriptor whose leading status code is non-zero fails the
//! request before the body is even looked at.

use crate::attribute::from_wire;
use crate::cbor::{decode, try_decode, CborValue};
use crate::error::{DaxError, Result};

/// Checks a decoded error descriptor.
///
/// An empty sequence, or one with status 0, means success. Anything else
/// raises `Server{status, message, request_id?}`.
pub fn check_error_descriptor(descriptor: &CborValue) -> Result<()> {
    let elements = match descriptor {
        CborValue::Array(elements) => elements,
        other => {
            return Err(DaxError::MalformedEncoding(format!(
                "error descriptor is not a sequence: {:?}",
                other
            )))
        }
    };

    let Some(first) = elements.first() else {
        return Ok(());
    };
    let status = first.as_integer().ok_or_else(|| {
        DaxError::MalformedEncoding("error descriptor status is not an integer".to_string())
    })?;
    if status == 0 {
        return Ok(());
    }

    let message = elements
        .get(1)
        .and_then(|m| m.as_text())
        .unwrap_or_default()
        .to_string();
    let request_id = elements
        .get(2)
        .and_then(|r| r.as_text())
        .map(|r| r.to_string());

    Err(DaxError::Server {
        status,
        message,
        request_id,
    })
}

/// Decodes a complete reply buffer into its bridged body.
pub fn decode_reply(bytes: &[u8]) -> Result<CborValue> {
    let (descriptor, rest) = decode(bytes)?;
    check_error_descriptor(&descriptor)?;
    let (body, _rest) = decode(rest)?;
    Ok(from_wire(&body))
}

/// Returns the byte length of the reply once `bytes` holds both top-level
/// values, so the read loop knows when to stop accumulating.
///
/// Malformed bytes surface immediately rather than stalling the reader.
pub fn reply_length(bytes: &[u8]) -> Result<Option<usize>> {
    let Some((_, first)) = try_decode(bytes)? else {
        return Ok(None);
    };
    let Some((_, second)) = try_decode(&bytes[first..])? else {
        return Ok(None);
    };
    Ok(Some(first + second))
}

/// Returns `true` once `bytes` holds a complete reply.
pub fn reply_is_complete(bytes: &[u8]) -> Result<bool> {
    Ok(reply_length(bytes)?.is_some())
}
