//! JSON-RPC error codes used on this connection.

/// Request violates protocol sequencing, e.g. anything before `initialize`.
pub(crate) const INVALID_REQUEST_ERROR_CODE: i64 = -32600;
pub(crate) const METHOD_NOT_FOUND_ERROR_CODE: i64 = -32601;
pub(crate) const INVALID_PARAMS_ERROR_CODE: i64 = -32602;
pub(crate) const INTERNAL_ERROR_CODE: i64 = -32603;
/// Request addressed a session identifier the store has never minted.
pub(crate) const SESSION_NOT_FOUND_ERROR_CODE: i64 = -32001;
