//! Wire protocol constants.
//!
//! Every value here must stay bit-exact: the cluster dispatches on the
//! service and method ids, and the tag numbers select the set encodings on
//! both sides of the wire.

/// Service id carried as the first value of every request.
pub const SERVICE_ID: u64 = 1;

/// Magic string opening the connection handshake.
pub const HANDSHAKE_MAGIC: &str = "J7yne5G";

/// Method id for `GetItem`.
pub const METHOD_GET_ITEM: u64 = 263244906;
/// Method id for `PutItem`.
pub const METHOD_PUT_ITEM: u64 = 20969;
/// Method id for `DeleteItem`.
pub const METHOD_DELETE_ITEM: u64 = 7;
/// Method id for `UpdateItem`.
pub const METHOD_UPDATE_ITEM: u64 = 10;
/// Method id for `BatchGetItem`.
pub const METHOD_BATCH_GET_ITEM: u64 = 697851100;
/// Method id for `BatchWriteItem`.
pub const METHOD_BATCH_WRITE_ITEM: u64 = 116217951;
/// Method id for `Query`.
pub const METHOD_QUERY: u64 = 2;
/// Method id for `Scan`.
pub const METHOD_SCAN: u64 = 3;
/// Method id for `DescribeTable`.
pub const METHOD_DESCRIBE_TABLE: u64 = 4;
/// Method id for `DefineKeySchema`.
pub const METHOD_DEFINE_KEY_SCHEMA: u64 = 681;
/// Method id for `DefineAttributeList`.
pub const METHOD_DEFINE_ATTRIBUTE_LIST: u64 = 656;
/// Method id for `DefineAttributeListId`.
pub const METHOD_DEFINE_ATTRIBUTE_LIST_ID: u64 = 657;
/// Method id for `authorizeConnection`.
pub const METHOD_AUTHORIZE_CONNECTION: u64 = 1489122155;

/// Tag wrapping a string set (`SS`).
pub const TAG_STRING_SET: u64 = 3321;
/// Tag wrapping a number set (`NS`).
pub const TAG_NUMBER_SET: u64 = 3322;
/// Tag wrapping a binary set (`BS`).
pub const TAG_BINARY_SET: u64 = 3323;
/// Tag carrying a document path ordinal. Receive-only.
pub const TAG_DOCUMENT_PATH_ORDINAL: u64 = 3324;

/// Attribute-map key a document path ordinal is surfaced under.
pub const DOCUMENT_PATH_ORDINAL_KEY: &str = "_document_path_ordinal";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_tags_are_contiguous() {
        assert_eq!(TAG_NUMBER_SET, TAG_STRING_SET + 1);
        assert_eq!(TAG_BINARY_SET, TAG_STRING_SET + 2);
        assert_eq!(TAG_DOCUMENT_PATH_ORDINAL, TAG_STRING_SET + 3);
    }

    #[test]
    fn test_handshake_magic() {
        assert_eq!(HANDSHAKE_MAGIC.len(), 7);
    }
}
