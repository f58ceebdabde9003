//! DAX client: direct in-region acceleration for a DynamoDB-style table
//! store over its proprietary binary protocol.
//!
//! Instead of the public REST API, this client keeps long-lived,
//! signature-authenticated connections to the cache cluster's nodes and
//! speaks the self-delimiting compact binary encoding implemented in
//! [`dax_core`]. The pieces:
//!
//! - [`Config`] / [`ConfigBuilder`] — endpoints (`dax://` or `daxs://`),
//!   timeouts, cache sizing, credentials.
//! - [`signer`] — AWS Signature V4 material for the in-band
//!   authorize-connection frame, behind the [`signer::RequestSigner`]
//!   seam.
//! - [`connection`] — one socket per connection: opening handshake,
//!   periodic re-auth on the request path, single-flight send/receive,
//!   and the pool that leases connections across endpoints round-robin.
//! - [`cache`] — table key schemas (TTL) and attribute-name lists (LRU)
//!   so repeated requests skip metadata round-trips.
//! - [`DaxClient`] — the facade: `get_item`, `put_item`, `delete_item`,
//!   `update_item`, `batch_get_item`, `batch_write_item`, `query`,
//!   `scan`, `describe_table`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dax_client::{Config, DaxClient};
//! use dax_client::signer::{Credentials, SigV4Signer};
//! use dax_core::CborValue;
//!
//! # async fn run() -> dax_core::Result<()> {
//! let config = Config::builder()
//!     .endpoint_url("dax://cluster.abc123.dax-clusters.us-east-1.amazonaws.com")
//!     .region("us-east-1")
//!     .credentials(Arc::new(SigV4Signer::new(
//!         Credentials::new("AKIA...", "secret"),
//!         "us-east-1",
//!     )))
//!     .build()?;
//! let client = DaxClient::new(config);
//!
//! let item = client
//!     .get_item(CborValue::map([
//!         ("TableName", CborValue::text("orders")),
//!         (
//!             "Key",
//!             CborValue::map([(
//!                 "id",
//!                 CborValue::map([("S", CborValue::text("order-17"))]),
//!             )]),
//!         ),
//!     ]))
//!     .await?;
//! # drop(item);
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `tls`   | `daxs://` endpoints via `rustls` |

#![warn(missing_docs)]

pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod signer;

pub use client::DaxClient;
pub use config::{Config, ConfigBuilder};
pub use endpoint::{Endpoint, Scheme};

pub use dax_core::{CborValue, DaxError, KeySchema, KeySchemaElement, Operation, Result};
