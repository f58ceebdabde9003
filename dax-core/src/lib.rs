//! Wire protocol engine for the DAX client.
//!
//! This crate is the I/O-free half of the client: the self-delimiting
//! compact binary codec, the attribute-value bridge, request/response
//! framing, table key schemas, and the error taxonomy. The companion
//! `dax-client` crate supplies sockets, pooling, and caching on top.

#![warn(missing_docs)]

pub mod attribute;
pub mod cbor;
pub mod error;
pub mod protocol;
pub mod schema;

pub use cbor::CborValue;
pub use error::{DaxError, Result};
pub use protocol::Operation;
pub use schema::{KeySchema, KeySchemaElement};
