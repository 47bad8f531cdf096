use thiserror::Error;

/// Method-not-found code from the JSON-RPC 2.0 error table.
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("connection closed")]
    Closed,
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ApiError {
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, ApiError::Rpc { code, .. } if *code == METHOD_NOT_FOUND)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
