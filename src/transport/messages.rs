//! Request and response bodies of the Data API.
//!
//! Field names follow the service's camelCase JSON.

use crate::types::{ColumnMetadata, SqlParameter, WireValue};
use serde::{Deserialize, Serialize};

/// Execute a single statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteStatementRequest {
    /// ARN of the cluster
    pub resource_arn: String,
    /// ARN of the secret holding the database credentials
    pub secret_arn: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema: Option<String>,
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameters: Vec<SqlParameter>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub include_result_metadata: bool,
    #[serde(default)]
    pub continue_after_timeout: bool,
}

impl ExecuteStatementRequest {
    /// Create a request without parameters.
    pub fn new(
        resource_arn: impl Into<String>,
        secret_arn: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            resource_arn: resource_arn.into(),
            secret_arn: secret_arn.into(),
            database: None,
            schema: None,
            sql: sql.into(),
            parameters: Vec::new(),
            transaction_id: None,
            include_result_metadata: false,
            continue_after_timeout: false,
        }
    }

    /// Set the database.
    pub fn with_database(mut self, database: Option<String>) -> Self {
        self.database = database;
        self
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    /// Set bound parameters.
    pub fn with_parameters(mut self, parameters: Vec<SqlParameter>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Attach the statement to a transaction.
    pub fn with_transaction_id(mut self, transaction_id: Option<String>) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    /// Request column metadata with the result.
    pub fn with_result_metadata(mut self, include: bool) -> Self {
        self.include_result_metadata = include;
        self
    }
}

/// Execute one statement once per parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchExecuteStatementRequest {
    pub resource_arn: String,
    pub secret_arn: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema: Option<String>,
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameter_sets: Vec<Vec<SqlParameter>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction_id: Option<String>,
}

/// Start a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransactionRequest {
    pub resource_arn: String,
    pub secret_arn: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema: Option<String>,
}

/// Commit or roll back a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndTransactionRequest {
    pub resource_arn: String,
    pub secret_arn: String,
    pub transaction_id: String,
}

/// Result of a single statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecuteStatementResponse {
    /// Rows of typed fields
    pub records: Option<Vec<Vec<WireValue>>>,
    /// Present when result metadata was requested
    pub column_metadata: Option<Vec<ColumnMetadata>>,
    pub number_of_records_updated: Option<i64>,
    /// Auto-generated values, such as inserted keys
    pub generated_fields: Option<Vec<WireValue>>,
}

/// Generated fields of one batch row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateResultEntry {
    pub generated_fields: Vec<WireValue>,
}

/// Result of a batch statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchExecuteStatementResponse {
    pub update_results: Vec<UpdateResultEntry>,
}

/// Handle of a newly started transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransactionResponse {
    pub transaction_id: String,
}

/// Outcome of a commit or rollback.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndTransactionResponse {
    /// e.g. `"Transaction Committed"` or `"Rollback Complete"`
    pub transaction_status: Option<String>,
}

/// Error body returned by the service on non-success status codes.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct RemoteErrorBody {
    #[serde(alias = "Message")]
    pub message: Option<String>,
    #[serde(alias = "__type")]
    pub code: Option<String>,
}
