//! Transport layer for Data API communication.
//!
//! # Architecture
//!
//! The transport layer is organized into:
//! - `protocol` - Transport trait definitions
//! - `messages` - Request and response bodies
//! - `http` - reqwest-based implementation
//!
//! # Example
//!
//! ```no_run
//! use dataapi_rs::transport::{DataApiTransport, ExecuteStatementRequest, HttpTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(HttpTransport::regional_endpoint("eu-west-1"));
//!
//! let request = ExecuteStatementRequest::new(
//!     "arn:aws:rds:eu-west-1:123456789012:cluster:my-cluster",
//!     "arn:aws:secretsmanager:eu-west-1:123456789012:secret:my-secret",
//!     "SELECT 1",
//! );
//! let response = transport.execute_statement(request).await?;
//! println!("{:?}", response.records);
//! # Ok(())
//! # }
//! ```

pub mod http;
pub mod messages;
pub mod protocol;

// Re-export commonly used types
pub use http::HttpTransport;
pub use messages::{
    BatchExecuteStatementRequest, BatchExecuteStatementResponse, BeginTransactionRequest,
    BeginTransactionResponse, EndTransactionRequest, EndTransactionResponse,
    ExecuteStatementRequest, ExecuteStatementResponse, UpdateResultEntry,
};
pub use protocol::{ClusterDescriber, DataApiTransport, CLUSTER_AVAILABLE};
