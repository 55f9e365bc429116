//! Data API calls over HTTP.
//!
//! Each operation is a JSON `POST` to `{endpoint}/{Operation}`. Request
//! signing is not done here; callers that need it supply a preconfigured
//! `reqwest::Client` or static headers.

use super::messages::{
    BatchExecuteStatementRequest, BatchExecuteStatementResponse, BeginTransactionRequest,
    BeginTransactionResponse, EndTransactionRequest, EndTransactionResponse,
    ExecuteStatementRequest, ExecuteStatementResponse, RemoteErrorBody,
};
use super::protocol::DataApiTransport;
use crate::error::TransportError;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Instant;

const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Data API transport over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpTransport {
    /// Create a transport for the given endpoint, e.g.
    /// `https://rds-data.eu-west-1.amazonaws.com`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    /// Create a transport using an existing client.
    pub fn with_client(endpoint: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: endpoint.into().trim_end_matches('/').to_string(),
            http_client,
            headers: HeaderMap::new(),
        }
    }

    /// Default endpoint of the Data API in a region.
    pub fn regional_endpoint(region: &str) -> String {
        format!("https://rds-data.{}.amazonaws.com", region)
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, TransportError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::SerializationError(format!("invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::SerializationError(format!("invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Endpoint base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp, TransportError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, operation);
        let body = serde_json::to_vec(request)
            .map_err(|e| TransportError::SerializationError(e.to_string()))?;

        let start = Instant::now();
        debug!("POST {} ({} bytes)", url, body.len());

        let response = self
            .http_client
            .post(&url)
            .headers(self.headers.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        debug!(
            "{} responded status={} duration_ms={}",
            operation,
            status,
            start.elapsed().as_millis()
        );

        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let error_type = response
            .headers()
            .get(ERROR_TYPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let err = remote_error(status.as_u16(), error_type.as_deref(), &text);
        warn!("{} failed: {}", operation, err);
        Err(err)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Build a remote error from a failed response.
///
/// The code comes from the body (`code` or `__type`), then the
/// `x-amzn-errortype` header, then the HTTP status.
pub(crate) fn remote_error(status: u16, error_type: Option<&str>, body: &str) -> TransportError {
    let parsed: RemoteErrorBody = serde_json::from_str(body).unwrap_or_default();

    let code = parsed
        .code
        .or_else(|| error_type.map(str::to_string))
        .map(|code| strip_type_namespace(&code))
        .unwrap_or_else(|| format!("http-{}", status));

    let message = parsed.message.unwrap_or_else(|| body.to_string());

    TransportError::Remote {
        status,
        code,
        message,
    }
}

/// `"ns#BadRequestException:http://..."` -> `"BadRequestException"`
fn strip_type_namespace(code: &str) -> String {
    let code = code.split(':').next().unwrap_or(code);
    code.rsplit('#').next().unwrap_or(code).to_string()
}

#[async_trait]
impl DataApiTransport for HttpTransport {
    async fn execute_statement(
        &self,
        request: ExecuteStatementRequest,
    ) -> Result<ExecuteStatementResponse, TransportError> {
        self.post("Execute", &request).await
    }

    async fn batch_execute_statement(
        &self,
        request: BatchExecuteStatementRequest,
    ) -> Result<BatchExecuteStatementResponse, TransportError> {
        self.post("BatchExecute", &request).await
    }

    async fn begin_transaction(
        &self,
        request: BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse, TransportError> {
        self.post("BeginTransaction", &request).await
    }

    async fn commit_transaction(
        &self,
        request: EndTransactionRequest,
    ) -> Result<EndTransactionResponse, TransportError> {
        self.post("CommitTransaction", &request).await
    }

    async fn rollback_transaction(
        &self,
        request: EndTransactionRequest,
    ) -> Result<EndTransactionResponse, TransportError> {
        self.post("RollbackTransaction", &request).await
    }
}
