//! The client facade: named table operations over the pooled protocol
//! engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dax_core::cbor::CborValue;
use dax_core::protocol::{decode_reply, serialize, serialize_request};
use dax_core::{DaxError, KeySchema, Operation, Result};

use crate::cache::{name_hash, AttributeListCache, CacheStats, KeySchemaCache};
use crate::config::Config;
use crate::connection::{ConnectionPool, PoolLease};

/// A client to one DAX cluster.
///
/// Cheap to share: clones hand out the same pool and caches. Every
/// operation takes a parameter map shaped like the service API
/// (`TableName`, `Key`, `Item`, ...) with attribute values as single-entry
/// discriminator maps, and returns the decoded reply body in the same
/// shape.
#[derive(Clone)]
pub struct DaxClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: Config,
    pool: ConnectionPool,
    key_schemas: Mutex<KeySchemaCache>,
    attribute_lists: Mutex<AttributeListCache>,
    closed: AtomicBool,
}

impl std::fmt::Debug for DaxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaxClient")
            .field("endpoints", &self.inner.config.endpoints())
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl DaxClient {
    /// Creates a client from its configuration.
    pub fn new(config: Config) -> Self {
        let pool = ConnectionPool::new(&config);
        let key_schemas = Mutex::new(KeySchemaCache::new(
            config.key_cache_size(),
            config.key_cache_ttl(),
        ));
        let attribute_lists = Mutex::new(AttributeListCache::new(config.attr_cache_size()));

        Self {
            inner: Arc::new(ClientInner {
                config,
                pool,
                key_schemas,
                attribute_lists,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Reads a single item.
    pub async fn get_item(&self, params: CborValue) -> Result<CborValue> {
        self.execute(Operation::GetItem, params).await
    }

    /// Writes a single item.
    pub async fn put_item(&self, params: CborValue) -> Result<CborValue> {
        self.execute(Operation::PutItem, params).await
    }

    /// Deletes a single item.
    pub async fn delete_item(&self, params: CborValue) -> Result<CborValue> {
        self.execute(Operation::DeleteItem, params).await
    }

    /// Updates a single item in place.
    pub async fn update_item(&self, params: CborValue) -> Result<CborValue> {
        self.execute(Operation::UpdateItem, params).await
    }

    /// Reads items from several tables in one round-trip.
    pub async fn batch_get_item(&self, params: CborValue) -> Result<CborValue> {
        self.execute(Operation::BatchGetItem, params).await
    }

    /// Puts and deletes items across tables in one round-trip.
    pub async fn batch_write_item(&self, params: CborValue) -> Result<CborValue> {
        self.execute(Operation::BatchWriteItem, params).await
    }

    /// Queries a range within one hash key.
    pub async fn query(&self, params: CborValue) -> Result<CborValue> {
        self.execute(Operation::Query, params).await
    }

    /// Scans a whole table.
    pub async fn scan(&self, params: CborValue) -> Result<CborValue> {
        self.execute(Operation::Scan, params).await
    }

    /// Fetches table metadata.
    pub async fn describe_table(&self, params: CborValue) -> Result<CborValue> {
        self.execute(Operation::DescribeTable, params).await
    }

    /// Dispatches an operation by its canonical name.
    pub async fn execute_named(&self, name: &str, params: CborValue) -> Result<CborValue> {
        let op = Operation::from_name(name)?;
        self.execute(op, params).await
    }

    /// Agrees an attribute-name list with the cluster, returning its id.
    ///
    /// A list whose content hash was agreed before resolves from the cache
    /// without a round-trip.
    pub async fn define_attribute_list(&self, names: Vec<String>) -> Result<u64> {
        let hash = name_hash(&names);
        if let Some(id) = self.lock_attribute_lists().id_by_name_hash(&hash) {
            return Ok(id);
        }

        let params = CborValue::map([(
            "AttributeNames",
            CborValue::Array(names.iter().map(|n| CborValue::text(n.as_str())).collect()),
        )]);
        let body = self.execute(Operation::DefineAttributeList, params).await?;
        let id = body
            .get("AttributeListId")
            .and_then(|v| v.as_unsigned())
            .ok_or_else(|| {
                DaxError::MalformedEncoding(
                    "define-attribute-list reply carries no id".to_string(),
                )
            })?;

        self.lock_attribute_lists().put_with_id(id, names);
        Ok(id)
    }

    /// Resolves an attribute-name list by its agreed id.
    pub async fn attribute_names(&self, id: u64) -> Result<Vec<String>> {
        if let Some(names) = self.lock_attribute_lists().get(id) {
            return Ok(names);
        }

        let params = CborValue::map([("AttributeListId", CborValue::Unsigned(id))]);
        let body = self
            .execute(Operation::DefineAttributeListId, params)
            .await?;
        let names: Vec<String> = body
            .get("AttributeNames")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_text().map(str::to_string))
                    .collect()
            })
            .ok_or_else(|| {
                DaxError::MalformedEncoding(
                    "define-attribute-list-id reply carries no names".to_string(),
                )
            })?;

        self.lock_attribute_lists().put_with_id(id, names.clone());
        Ok(names)
    }

    /// Returns counters for the key schema cache.
    pub fn key_schema_cache_stats(&self) -> CacheStats {
        self.lock_key_schemas().stats()
    }

    /// Returns counters for the attribute list cache.
    pub fn attribute_list_cache_stats(&self) -> CacheStats {
        self.lock_attribute_lists().stats()
    }

    /// Closes the client, the pool, and every connection. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.pool.close().await;
        tracing::debug!("client closed");
    }

    /// Returns `true` once the client has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    async fn execute(&self, op: Operation, params: CborValue) -> Result<CborValue> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(DaxError::Closed("client is closed".to_string()));
        }

        let mut lease = self.inner.pool.get().await?;

        if uses_key_validation(op) {
            if let Some(table) = params.get("TableName").and_then(|t| t.as_text()) {
                let table = table.to_string();
                if self.cached_schema(&table).is_none() {
                    self.refresh_schema(&mut lease, &table).await;
                    // A describe failure may have taken the socket down
                    // with it; the request still deserves a live one.
                    if !lease.is_connected() {
                        self.inner.pool.mark_bad(lease).await;
                        lease = self.inner.pool.get().await?;
                    }
                }
            }
        }

        let request = serialize_request(op, &params, &|table: &str| self.cached_schema(table))?;

        if self.inner.config.debug_logging() {
            tracing::debug!(
                operation = %op,
                connection = %lease.id(),
                request_bytes = request.len(),
                "dispatching request"
            );
        }

        let reply = match lease.invoke(&request).await {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail_lease(lease, e).await),
        };
        match decode_reply(&reply) {
            Ok(body) => Ok(body),
            Err(e) => Err(self.fail_lease(lease, e).await),
        }
    }

    /// Marks the leased connection bad when the error poisoned its wire
    /// state, then folds the error for the caller.
    async fn fail_lease(&self, lease: PoolLease, error: DaxError) -> DaxError {
        if error.poisons_connection() || matches!(error, DaxError::AuthFailed(_)) {
            self.inner.pool.mark_bad(lease).await;
        }
        error.into_request_failure()
    }

    /// Populates the key schema cache from a `DescribeTable` on the
    /// already-leased connection. Failures are logged and swallowed; the
    /// triggering request proceeds unvalidated.
    async fn refresh_schema(&self, lease: &mut PoolLease, table: &str) {
        let params = CborValue::map([("TableName", CborValue::text(table))]);
        let request = serialize(Operation::DescribeTable, &params);

        let outcome = match lease.invoke(&request).await {
            Ok(reply) => decode_reply(&reply),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(body) => match KeySchema::from_describe_output(&body) {
                Some(schema) => {
                    if let Err(e) = self.lock_key_schemas().put(table, schema) {
                        tracing::warn!(table = table, error = %e, "key schema not cached");
                    }
                }
                None => {
                    tracing::warn!(table = table, "describe-table reply carried no key schema");
                }
            },
            Err(e) => {
                tracing::warn!(
                    table = table,
                    error = %e,
                    "describe-table fallback failed; request proceeds unvalidated"
                );
            }
        }
    }

    fn cached_schema(&self, table: &str) -> Option<KeySchema> {
        self.lock_key_schemas().get(table).ok().flatten()
    }

    fn lock_key_schemas(&self) -> std::sync::MutexGuard<'_, KeySchemaCache> {
        self.inner
            .key_schemas
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_attribute_lists(&self) -> std::sync::MutexGuard<'_, AttributeListCache> {
        self.inner
            .attribute_lists
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Operations whose request keys are checked against a cached schema.
fn uses_key_validation(op: Operation) -> bool {
    matches!(
        op,
        Operation::GetItem | Operation::PutItem | Operation::DeleteItem | Operation::UpdateItem
    )
}
