//! High-level client.
//!
//! [`Connection`] ties the pipeline together: placeholder rewriting and
//! parameter formatting, dispatch through the statement executor, and
//! result decoding.

pub mod connection;
pub mod options;

pub use connection::{ClientBuilder, Connection, TransactionStatement};
pub use options::QueryOptions;
