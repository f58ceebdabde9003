//! Request preparation and serialisation.
//!
//! A serialised request is three concatenated top-level values:
//! `U(service_id) || U(method_id) || V(parameters)`. Preparation happens
//! before encoding: required fields are checked, attribute subtrees are
//! bridged to their wire form, and request keys are validated against any
//! known table schema so malformed requests never reach the socket.

use bytes::BytesMut;

use crate::attribute::to_wire;
use crate::cbor::{write_value, CborValue};
use crate::error::{DaxError, Result};
use crate::schema::KeySchema;

use super::constants::SERVICE_ID;
use super::operation::Operation;

/// Resolves a cached key schema for a table name.
///
/// The schema lookup is a seam: the client passes its cache, tests pass a
/// closure.
pub trait SchemaSource {
    /// Returns the schema for `table` if one is known.
    fn schema_for(&self, table: &str) -> Option<KeySchema>;
}

impl<F> SchemaSource for F
where
    F: Fn(&str) -> Option<KeySchema>,
{
    fn schema_for(&self, table: &str) -> Option<KeySchema> {
        self(table)
    }
}

/// A schema source that knows nothing; every validation is skipped.
pub struct NoSchemas;

impl SchemaSource for NoSchemas {
    fn schema_for(&self, _table: &str) -> Option<KeySchema> {
        None
    }
}

/// Validates and bridges a parameter map for the given operation.
///
/// Validation errors (`MissingRequiredField`, `MissingKey`, `ExtraKey`)
/// surface before any serialisation; the returned map is in wire form.
pub fn prepare(
    op: Operation,
    params: &CborValue,
    schemas: &dyn SchemaSource,
) -> Result<CborValue> {
    match op {
        Operation::GetItem | Operation::DeleteItem | Operation::UpdateItem => {
            let table = require_text(params, "TableName")?;
            if let (Some(key), Some(schema)) = (params.get("Key"), schemas.schema_for(table)) {
                schema.validate_key(key)?;
            }
            Ok(to_wire(params))
        }
        Operation::PutItem => {
            let table = require_text(params, "TableName")?;
            if let (Some(item), Some(schema)) = (params.get("Item"), schemas.schema_for(table)) {
                // Only a complete key projection is worth validating; a
                // partial one is the server's problem to reject.
                if let Some(projection) = schema.key_projection(item) {
                    schema.validate_key(&projection)?;
                }
            }
            Ok(to_wire(params))
        }
        Operation::BatchGetItem => {
            let request_items = require_field(params, "RequestItems")?;
            for (table_key, table_request) in map_entries(request_items)? {
                let Some(table) = table_key.as_text() else {
                    continue;
                };
                let Some(schema) = schemas.schema_for(table) else {
                    continue;
                };
                if let Some(keys) = table_request.get("Keys").and_then(|k| k.as_array()) {
                    for key in keys {
                        schema.validate_key(key)?;
                    }
                }
            }
            Ok(to_wire(params))
        }
        Operation::BatchWriteItem => {
            let request_items = require_field(params, "RequestItems")?;
            for (table_key, write_requests) in map_entries(request_items)? {
                let Some(table) = table_key.as_text() else {
                    continue;
                };
                let Some(schema) = schemas.schema_for(table) else {
                    continue;
                };
                for request in write_requests.as_array().unwrap_or(&[]) {
                    if let Some(item) = request.get("PutRequest").and_then(|p| p.get("Item")) {
                        if let Some(projection) = schema.key_projection(item) {
                            schema.validate_key(&projection)?;
                        }
                    }
                    if let Some(key) = request.get("DeleteRequest").and_then(|d| d.get("Key")) {
                        schema.validate_key(key)?;
                    }
                }
            }
            Ok(to_wire(params))
        }
        Operation::Query | Operation::Scan => {
            require_text(params, "TableName")?;
            Ok(to_wire(params))
        }
        Operation::DescribeTable
        | Operation::DefineKeySchema
        | Operation::DefineAttributeList
        | Operation::DefineAttributeListId
        | Operation::AuthorizeConnection => Ok(params.clone()),
    }
}

/// Serialises a prepared parameter map into wire bytes.
pub fn serialize(op: Operation, prepared: &CborValue) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(128);
    write_value(&mut buf, &CborValue::Unsigned(SERVICE_ID));
    write_value(&mut buf, &CborValue::Unsigned(op.method_id()));
    write_value(&mut buf, prepared);
    buf.to_vec()
}

/// Prepares and serialises a request in one step.
pub fn serialize_request(
    op: Operation,
    params: &CborValue,
    schemas: &dyn SchemaSource,
) -> Result<Vec<u8>> {
    let prepared = prepare(op, params, schemas)?;
    Ok(serialize(op, &prepared))
}

fn require_field<'a>(params: &'a CborValue, field: &str) -> Result<&'a CborValue> {
    params
        .get(field)
        .ok_or_else(|| DaxError::MissingRequiredField(field.to_string()))
}

fn require_text<'a>(params: &'a CborValue, field: &str) -> Result<&'a str> {
    require_field(params, field)?
        .as_text()
        .ok_or_else(|| DaxError::MissingRequiredField(field.to_string()))
}

fn map_entries(value: &CborValue) -> Result<&[(CborValue, CborValue)]> {
    value
        .as_map()
        .ok_or_else(|| DaxError::MissingRequiredField("RequestItems".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::KeySchemaElement;

    fn two_key_schema(table: &str) -> impl Fn(&str) -> Option<KeySchema> + '_ {
        move |name: &str| {
            (name == table).then(|| {
                KeySchema::with_range(
                    KeySchemaElement::new("id", "S"),
                    KeySchemaElement::new("sort", "N"),
                )
            })
        }
    }

    fn string_attr(v: &str) -> CborValue {
        CborValue::map([("S", CborValue::text(v))])
    }

    #[test]
    fn test_get_item_wire_prefix() {
        let params = CborValue::map([
            ("TableName", CborValue::text("T")),
            ("Key", CborValue::map([("id", string_attr("x"))])),
        ]);
        let bytes = serialize_request(Operation::GetItem, &params, &NoSchemas).unwrap();

        // Service id 1, then the u32-form method id.
        assert_eq!(&bytes[..6], &[0x01, 0x1A, 0x0F, 0xB4, 0xBF, 0xEA]);

        // The parameter map holds exactly TableName and Key.
        let (params_value, rest) = crate::cbor::decode(&bytes[6..]).unwrap();
        assert!(rest.is_empty());
        let entries = params_value.as_map().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(params_value.contains_key("TableName"));
        assert!(params_value.contains_key("Key"));
    }

    #[test]
    fn test_missing_table_name() {
        let params = CborValue::map([("Key", CborValue::map([("id", string_attr("x"))]))]);
        let err = prepare(Operation::GetItem, &params, &NoSchemas).unwrap_err();
        assert!(matches!(err, DaxError::MissingRequiredField(f) if f == "TableName"));
    }

    #[test]
    fn test_key_validation_against_cached_schema() {
        let schemas = two_key_schema("T");

        let missing = CborValue::map([
            ("TableName", CborValue::text("T")),
            ("Key", CborValue::map([("id", string_attr("x"))])),
        ]);
        let err = prepare(Operation::GetItem, &missing, &schemas).unwrap_err();
        assert!(matches!(err, DaxError::MissingKey(name) if name == "sort"));

        let extra = CborValue::map([
            ("TableName", CborValue::text("T")),
            (
                "Key",
                CborValue::map([
                    ("id", string_attr("x")),
                    ("sort", string_attr("1")),
                    ("extra", string_attr("y")),
                ]),
            ),
        ]);
        let err = prepare(Operation::GetItem, &extra, &schemas).unwrap_err();
        assert!(matches!(err, DaxError::ExtraKey(name) if name == "extra"));
    }

    #[test]
    fn test_unknown_table_skips_validation() {
        let schemas = two_key_schema("Other");
        let params = CborValue::map([
            ("TableName", CborValue::text("T")),
            ("Key", CborValue::map([("id", string_attr("x"))])),
        ]);
        assert!(prepare(Operation::GetItem, &params, &schemas).is_ok());
    }

    #[test]
    fn test_put_item_partial_key_is_unvalidated() {
        let schemas = two_key_schema("T");
        // Item carries only the hash attribute; the projection is
        // incomplete so the request goes through unvalidated.
        let params = CborValue::map([
            ("TableName", CborValue::text("T")),
            (
                "Item",
                CborValue::map([("id", string_attr("x")), ("payload", string_attr("p"))]),
            ),
        ]);
        assert!(prepare(Operation::PutItem, &params, &schemas).is_ok());
    }

    #[test]
    fn test_put_item_complete_key_validates() {
        let schemas = two_key_schema("T");
        let params = CborValue::map([
            ("TableName", CborValue::text("T")),
            (
                "Item",
                CborValue::map([
                    ("id", string_attr("x")),
                    ("sort", string_attr("1")),
                    ("payload", string_attr("p")),
                ]),
            ),
        ]);
        assert!(prepare(Operation::PutItem, &params, &schemas).is_ok());
    }

    #[test]
    fn test_batch_get_requires_request_items() {
        let err = prepare(Operation::BatchGetItem, &CborValue::map::<&str, _>([]), &NoSchemas)
            .unwrap_err();
        assert!(matches!(err, DaxError::MissingRequiredField(f) if f == "RequestItems"));
    }

    #[test]
    fn test_batch_get_validates_every_key() {
        let schemas = two_key_schema("T");
        let params = CborValue::map([(
            "RequestItems",
            CborValue::map([(
                "T",
                CborValue::map([(
                    "Keys",
                    CborValue::Array(vec![
                        CborValue::map([("id", string_attr("a")), ("sort", string_attr("1"))]),
                        CborValue::map([("id", string_attr("b"))]),
                    ]),
                )]),
            )]),
        )]);
        let err = prepare(Operation::BatchGetItem, &params, &schemas).unwrap_err();
        assert!(matches!(err, DaxError::MissingKey(name) if name == "sort"));
    }

    #[test]
    fn test_batch_write_validates_delete_keys() {
        let schemas = two_key_schema("T");
        let params = CborValue::map([(
            "RequestItems",
            CborValue::map([(
                "T",
                CborValue::Array(vec![CborValue::map([(
                    "DeleteRequest",
                    CborValue::map([(
                        "Key",
                        CborValue::map([("id", string_attr("a")), ("bogus", string_attr("1"))]),
                    )]),
                )])]),
            )]),
        )]);
        let err = prepare(Operation::BatchWriteItem, &params, &schemas).unwrap_err();
        assert!(matches!(err, DaxError::ExtraKey(name) if name == "bogus"));
    }

    #[test]
    fn test_query_requires_table_name() {
        let err = prepare(Operation::Query, &CborValue::map::<&str, _>([]), &NoSchemas)
            .unwrap_err();
        assert!(matches!(err, DaxError::MissingRequiredField(f) if f == "TableName"));
    }

    #[test]
    fn test_scan_bridges_exclusive_start_key() {
        let params = CborValue::map([
            ("TableName", CborValue::text("T")),
            (
                "ExclusiveStartKey",
                CborValue::map([(
                    "tags",
                    CborValue::map([("SS", CborValue::Array(vec![CborValue::text("a")]))]),
                )]),
            ),
        ]);
        let prepared = prepare(Operation::Scan, &params, &NoSchemas).unwrap();
        let bridged = prepared.get("ExclusiveStartKey").unwrap().get("tags").unwrap();
        assert!(matches!(*bridged, CborValue::Tagged(3321, _)));
    }

    #[test]
    fn test_describe_table_passes_through() {
        let params = CborValue::map([("TableName", CborValue::text("T"))]);
        let prepared = prepare(Operation::DescribeTable, &params, &NoSchemas).unwrap();
        assert_eq!(prepared, params);
    }

    #[test]
    fn test_serialized_values_are_self_delimiting() {
        let params = CborValue::map([("TableName", CborValue::text("T"))]);
        let bytes = serialize_request(Operation::Scan, &params, &NoSchemas).unwrap();

        let (service, rest) = crate::cbor::decode(&bytes).unwrap();
        assert_eq!(service, CborValue::Unsigned(1));
        let (method, rest) = crate::cbor::decode(rest).unwrap();
        assert_eq!(method, CborValue::Unsigned(3));
        let (body, rest) = crate::cbor::decode(rest).unwrap();
        assert!(body.contains_key("TableName"));
        assert!(rest.is_empty());
    }
}
