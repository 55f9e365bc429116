//! Error types for dataapi-rs.
//!
//! This module defines domain-specific error types organized by functional area.
//! Every error maps to a stable, slugified machine-readable code plus a
//! structured parameter bag, see [`CodedError`].

use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Top-level error type encompassing all possible errors.
#[derive(Error, Debug)]
pub enum DataApiError {
    /// Configuration errors raised at construction time
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Parameter marshalling errors
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// Statement execution errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Transport errors
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Invalid or missing connection parameter
    #[error("Invalid connection parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Connection URL parsing error
    #[error("Failed to parse connection url: {0}")]
    ParseError(String),
}

/// Errors raised while normalizing, rewriting or formatting parameters.
#[derive(Error, Debug)]
pub enum ParameterError {
    /// Value kind is not representable on the wire
    #[error("Parameter '{name}' has an invalid type: {reason}")]
    InvalidType { name: String, reason: String },

    /// Values argument has the wrong shape
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A `$N` placeholder has no matching positional value
    #[error("No value supplied for positional placeholder ${index}")]
    MissingPositional { index: usize },
}

/// Errors related to statement execution.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The remote was reachable but the call exceeded its timeout
    #[error("SQL statement timeout after {timeout_ms}ms")]
    StatementTimeout { timeout_ms: u64 },

    /// The cluster was not known to be running when the call timed out
    #[error("Database cluster is starting (timeout after {timeout_ms}ms)")]
    ClusterStarting { timeout_ms: u64 },

    /// Waiting for a concurrency slot took too long
    #[error("Timed out after {timeout_ms}ms waiting for a free statement slot")]
    GateTimeout { timeout_ms: u64 },

    /// Error reported by the remote service, surfaced verbatim
    #[error("{message}")]
    Remote {
        remote_code: Option<String>,
        message: String,
        hint: Option<RemoteHint>,
    },

    /// Transaction lifecycle misuse
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Query execution failed for a non-remote reason
    #[error("Query execution failed: {0}")]
    ExecutionFailed(String),

    /// Invalid connection state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Errors related to the transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP level failure (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Response deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Error reported by the remote service
    #[error("Remote error ({code}): {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },
}

/// Human-readable hints attached to known remote quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteHint {
    /// The transaction is aborted; further statements are blocked until rollback
    TransactionAborted,
    /// The Data API cannot return columns of the postgres `name` type
    UnsupportedNameType,
}

impl RemoteHint {
    const ABORTED_MARKER: &'static str = "current transaction is aborted";

    /// Detect a known quirk from a remote error message.
    pub fn detect(message: &str) -> Option<Self> {
        let lower = message.to_lowercase();

        if lower.contains(Self::ABORTED_MARKER) {
            Some(Self::TransactionAborted)
        } else if lower.contains("unsupported")
            && lower
                .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .any(|word| word == "name")
        {
            Some(Self::UnsupportedNameType)
        } else {
            None
        }
    }

    /// Hint text.
    pub fn text(&self) -> &'static str {
        match self {
            RemoteHint::TransactionAborted => {
                "the transaction was aborted by an earlier error and has been rolled back; start a new transaction"
            }
            RemoteHint::UnsupportedNameType => {
                "columns of type 'name' are not supported by the Data API; cast them, e.g. tablename::text"
            }
        }
    }
}

impl fmt::Display for RemoteHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

impl DataApiError {
    /// Stable machine-readable code.
    pub fn code(&self) -> String {
        match self {
            DataApiError::Connection(e) => e.code(),
            DataApiError::Parameter(e) => e.code(),
            DataApiError::Query(e) => e.code(),
            DataApiError::Transport(e) => e.code(),
        }
    }

    /// Structured diagnostic parameters.
    pub fn params(&self) -> Map<String, JsonValue> {
        match self {
            DataApiError::Connection(e) => e.params(),
            DataApiError::Parameter(e) => e.params(),
            DataApiError::Query(e) => e.params(),
            DataApiError::Transport(e) => e.params(),
        }
    }

    /// Whether the caller may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        match self {
            DataApiError::Query(e) => e.is_retryable(),
            DataApiError::Transport(TransportError::Http(_)) => true,
            _ => false,
        }
    }

    /// Code and params as a single value.
    pub fn to_coded(&self) -> CodedError {
        CodedError::new(self.code(), self.params())
    }
}

impl ConnectionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> String {
        match self {
            ConnectionError::InvalidParameter { .. } => "invalid-config".to_string(),
            ConnectionError::ParseError(_) => "invalid-url".to_string(),
        }
    }

    /// Structured diagnostic parameters.
    pub fn params(&self) -> Map<String, JsonValue> {
        match self {
            ConnectionError::InvalidParameter { parameter, message } => {
                object(json!({ "parameter": parameter, "reason": message }))
            }
            ConnectionError::ParseError(reason) => object(json!({ "reason": reason })),
        }
    }
}

impl ParameterError {
    /// Stable machine-readable code.
    pub fn code(&self) -> String {
        match self {
            ParameterError::InvalidType { .. } => "invalid-type".to_string(),
            ParameterError::InvalidInput { .. } => "invalid-input".to_string(),
            ParameterError::MissingPositional { .. } => "missing-positional-value".to_string(),
        }
    }

    /// Structured diagnostic parameters.
    pub fn params(&self) -> Map<String, JsonValue> {
        match self {
            ParameterError::InvalidType { name, reason } => {
                object(json!({ "name": name, "reason": reason }))
            }
            ParameterError::InvalidInput { reason } => object(json!({ "reason": reason })),
            ParameterError::MissingPositional { index } => object(json!({ "index": index })),
        }
    }
}

impl QueryError {
    /// Stable machine-readable code.
    pub fn code(&self) -> String {
        match self {
            QueryError::StatementTimeout { .. } => "sql-statement-timeout".to_string(),
            QueryError::ClusterStarting { .. } => "db-cluster-is-starting".to_string(),
            QueryError::GateTimeout { .. } => "semaphore-timeout".to_string(),
            QueryError::Remote {
                hint: Some(RemoteHint::TransactionAborted),
                ..
            } => "transaction-aborted".to_string(),
            QueryError::Remote { .. } => "remote-error".to_string(),
            QueryError::TransactionError(_) => "transaction-error".to_string(),
            QueryError::ExecutionFailed(_) => "execution-failed".to_string(),
            QueryError::InvalidState(_) => "invalid-state".to_string(),
        }
    }

    /// Structured diagnostic parameters.
    pub fn params(&self) -> Map<String, JsonValue> {
        match self {
            QueryError::StatementTimeout { timeout_ms }
            | QueryError::ClusterStarting { timeout_ms } => {
                object(json!({ "timeoutInMS": timeout_ms, "retryable": true }))
            }
            QueryError::GateTimeout { timeout_ms } => object(json!({ "timeoutInMS": timeout_ms })),
            QueryError::Remote {
                remote_code,
                message,
                hint,
            } => {
                let mut params = object(json!({ "message": message }));
                if let Some(code) = remote_code {
                    params.insert("remoteCode".to_string(), json!(code));
                }
                if let Some(hint) = hint {
                    params.insert("hint".to_string(), json!(hint.text()));
                }
                params
            }
            QueryError::TransactionError(reason)
            | QueryError::ExecutionFailed(reason)
            | QueryError::InvalidState(reason) => object(json!({ "reason": reason })),
        }
    }

    /// Whether the caller may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QueryError::StatementTimeout { .. }
                | QueryError::ClusterStarting { .. }
                | QueryError::GateTimeout { .. }
        )
    }

    /// Check if this is the aborted-transaction quirk.
    pub fn is_transaction_aborted(&self) -> bool {
        matches!(
            self,
            QueryError::Remote {
                hint: Some(RemoteHint::TransactionAborted),
                ..
            }
        )
    }

    /// Hint attached to a remote error, if any.
    pub fn hint(&self) -> Option<RemoteHint> {
        match self {
            QueryError::Remote { hint, .. } => *hint,
            _ => None,
        }
    }
}

impl TransportError {
    /// Stable machine-readable code.
    pub fn code(&self) -> String {
        match self {
            TransportError::Http(_) => "transport-error".to_string(),
            TransportError::SerializationError(_) => "serialization-error".to_string(),
            TransportError::DeserializationError(_) => "deserialization-error".to_string(),
            TransportError::Remote { code, .. } => slugify(code),
        }
    }

    /// Structured diagnostic parameters.
    pub fn params(&self) -> Map<String, JsonValue> {
        match self {
            TransportError::Http(reason)
            | TransportError::SerializationError(reason)
            | TransportError::DeserializationError(reason) => object(json!({ "reason": reason })),
            TransportError::Remote {
                status, message, ..
            } => object(json!({ "status": status, "message": message })),
        }
    }
}

impl From<TransportError> for QueryError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Remote { code, message, .. } => QueryError::Remote {
                hint: RemoteHint::detect(&message),
                remote_code: Some(code),
                message,
            },
            other => QueryError::ExecutionFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::DeserializationError(err.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::DeserializationError(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

fn object(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    }
}

/// Reduce a free-form code to lowercase `[a-z0-9-]` with single dashes.
pub fn slugify(code: &str) -> String {
    let mut slug = String::with_capacity(code.len());

    for c in code.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' {
            c.to_ascii_lowercase()
        } else {
            '-'
        };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }

    slug.trim_matches('-').to_string()
}

/// An error reduced to its code and parameter bag.
///
/// Renders as `"<code>"` or `"<code> <json-params>"` and parses back from the
/// same form, for propagation across process boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct CodedError {
    pub code: String,
    pub params: Map<String, JsonValue>,
}

impl CodedError {
    /// Create a coded error; the code is slugified.
    pub fn new(code: impl AsRef<str>, params: Map<String, JsonValue>) -> Self {
        Self {
            code: slugify(code.as_ref()),
            params,
        }
    }

    /// The `retryable` flag from the parameter bag.
    pub fn retryable(&self) -> Option<bool> {
        self.params.get("retryable").and_then(JsonValue::as_bool)
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.code)
        } else {
            let params = JsonValue::Object(self.params.clone());
            write!(f, "{} {}", self.code, params)
        }
    }
}

impl FromStr for CodedError {
    type Err = std::convert::Infallible;

    /// Parse `"<code> <json-params>"`. Malformed params degrade to an empty bag.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, rest) = match s.split_once(' ') {
            Some((code, rest)) => (code, rest.trim()),
            None => (s, ""),
        };

        let params = if rest.starts_with('{') {
            match serde_json::from_str::<JsonValue>(rest) {
                Ok(JsonValue::Object(map)) => map,
                _ => {
                    log::warn!("Ignoring unparseable error params in '{}'", s);
                    Map::new()
                }
            }
        } else {
            Map::new()
        };

        Ok(CodedError::new(code, params))
    }
}

impl std::error::Error for CodedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  SQL Statement Timeout "), "sql-statement-timeout");
        assert_eq!(slugify("BadRequestException"), "badrequestexception");
        assert_eq!(slugify("--a__b--"), "a-b");
        assert_eq!(slugify("db-cluster-is-starting"), "db-cluster-is-starting");
    }

    #[test]
    fn test_query_error_codes() {
        assert_eq!(
            QueryError::StatementTimeout { timeout_ms: 50 }.code(),
            "sql-statement-timeout"
        );
        assert_eq!(
            QueryError::ClusterStarting { timeout_ms: 50 }.code(),
            "db-cluster-is-starting"
        );
        assert!(QueryError::ClusterStarting { timeout_ms: 50 }.is_retryable());
        assert!(!QueryError::TransactionError("x".to_string()).is_retryable());
    }

    #[test]
    fn test_remote_hint_detection() {
        assert_eq!(
            RemoteHint::detect(
                "ERROR: current transaction is aborted, commands ignored until end of transaction block"
            ),
            Some(RemoteHint::TransactionAborted)
        );
        assert_eq!(
            RemoteHint::detect("Unsupported result column type: name"),
            Some(RemoteHint::UnsupportedNameType)
        );
        assert_eq!(RemoteHint::detect("Unsupported column tablename"), None);
        assert_eq!(RemoteHint::detect("syntax error at or near"), None);
    }

    #[test]
    fn test_transport_remote_becomes_query_remote() {
        let err: QueryError = TransportError::Remote {
            status: 400,
            code: "BadRequestException".to_string(),
            message: "ERROR: current transaction is aborted".to_string(),
        }
        .into();

        assert!(err.is_transaction_aborted());
        assert_eq!(err.code(), "transaction-aborted");
        assert!(err.params().contains_key("hint"));
    }

    #[test]
    fn test_coded_error_round_trip() {
        let err = DataApiError::Query(QueryError::StatementTimeout { timeout_ms: 1500 });
        let coded = err.to_coded();
        let rendered = coded.to_string();

        assert!(rendered.starts_with("sql-statement-timeout {"));

        let parsed: CodedError = rendered.parse().unwrap();
        assert_eq!(parsed, coded);
        assert_eq!(parsed.retryable(), Some(true));
    }

    #[test]
    fn test_coded_error_without_params() {
        let parsed: CodedError = "Semaphore Timeout".parse().unwrap();
        assert_eq!(parsed.code, "semaphore-timeout");
        assert!(parsed.params.is_empty());
        assert_eq!(parsed.to_string(), "semaphore-timeout");
    }

    #[test]
    fn test_coded_error_bad_params() {
        let parsed: CodedError = "invalid-type {not json".parse().unwrap();
        assert_eq!(parsed.code, "invalid-type");
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn test_parameter_error_display() {
        let err = ParameterError::InvalidType {
            name: "id".to_string(),
            reason: "arrays cannot be bound".to_string(),
        };
        assert!(err.to_string().contains("'id'"));
        assert_eq!(err.params()["name"], json!("id"));
    }
}
