//! The closed set of protocol operations and their method ids.

use crate::error::{DaxError, Result};

use super::constants::*;

/// A table operation understood by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Point read of a single item.
    GetItem,
    /// Write of a single item.
    PutItem,
    /// Delete of a single item.
    DeleteItem,
    /// In-place update of a single item.
    UpdateItem,
    /// Batched point reads across tables.
    BatchGetItem,
    /// Batched puts and deletes across tables.
    BatchWriteItem,
    /// Range query within one hash key.
    Query,
    /// Full-table scan.
    Scan,
    /// Table metadata fetch.
    DescribeTable,
    /// Server-assisted key schema agreement.
    DefineKeySchema,
    /// Server-assisted attribute list agreement.
    DefineAttributeList,
    /// Server-assisted attribute list id agreement.
    DefineAttributeListId,
    /// In-band signed re-authentication.
    AuthorizeConnection,
}

impl Operation {
    /// Returns the wire method id for this operation.
    pub fn method_id(self) -> u64 {
        match self {
            Operation::GetItem => METHOD_GET_ITEM,
            Operation::PutItem => METHOD_PUT_ITEM,
            Operation::DeleteItem => METHOD_DELETE_ITEM,
            Operation::UpdateItem => METHOD_UPDATE_ITEM,
            Operation::BatchGetItem => METHOD_BATCH_GET_ITEM,
            Operation::BatchWriteItem => METHOD_BATCH_WRITE_ITEM,
            Operation::Query => METHOD_QUERY,
            Operation::Scan => METHOD_SCAN,
            Operation::DescribeTable => METHOD_DESCRIBE_TABLE,
            Operation::DefineKeySchema => METHOD_DEFINE_KEY_SCHEMA,
            Operation::DefineAttributeList => METHOD_DEFINE_ATTRIBUTE_LIST,
            Operation::DefineAttributeListId => METHOD_DEFINE_ATTRIBUTE_LIST_ID,
            Operation::AuthorizeConnection => METHOD_AUTHORIZE_CONNECTION,
        }
    }

    /// Returns the canonical operation name.
    pub fn name(self) -> &'static str {
        match self {
            Operation::GetItem => "GetItem",
            Operation::PutItem => "PutItem",
            Operation::DeleteItem => "DeleteItem",
            Operation::UpdateItem => "UpdateItem",
            Operation::BatchGetItem => "BatchGetItem",
            Operation::BatchWriteItem => "BatchWriteItem",
            Operation::Query => "Query",
            Operation::Scan => "Scan",
            Operation::DescribeTable => "DescribeTable",
            Operation::DefineKeySchema => "DefineKeySchema",
            Operation::DefineAttributeList => "DefineAttributeList",
            Operation::DefineAttributeListId => "DefineAttributeListId",
            Operation::AuthorizeConnection => "authorizeConnection",
        }
    }

    /// Resolves a canonical operation name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "GetItem" => Ok(Operation::GetItem),
            "PutItem" => Ok(Operation::PutItem),
            "DeleteItem" => Ok(Operation::DeleteItem),
            "UpdateItem" => Ok(Operation::UpdateItem),
            "BatchGetItem" => Ok(Operation::BatchGetItem),
            "BatchWriteItem" => Ok(Operation::BatchWriteItem),
            "Query" => Ok(Operation::Query),
            "Scan" => Ok(Operation::Scan),
            "DescribeTable" => Ok(Operation::DescribeTable),
            "DefineKeySchema" => Ok(Operation::DefineKeySchema),
            "DefineAttributeList" => Ok(Operation::DefineAttributeList),
            "DefineAttributeListId" => Ok(Operation::DefineAttributeListId),
            "authorizeConnection" => Ok(Operation::AuthorizeConnection),
            other => Err(DaxError::UnsupportedOperation(other.to_string())),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
