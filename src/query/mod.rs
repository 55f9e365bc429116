//! Parameter marshalling and result decoding.
//!
//! # Overview
//!
//! The query module is organized into:
//! - `normalize` - parameter input shapes and flattening
//! - `placeholders` - `$N`, `:name` and `::name` rewriting and binding
//! - `format` - host value to wire parameter conversion
//! - `results` - wire rows to host rows
//! - `hooks` - SQL rewrite hooks
//!
//! # Example
//!
//! ```
//! use dataapi_rs::query::{Params, PlaceholderRewriter, RewriteOptions};
//!
//! let prepared = PlaceholderRewriter::prepare(
//!     "select * from t where name = $1",
//!     Params::positional(["pg_tables"]),
//!     &RewriteOptions::default(),
//! )?;
//!
//! assert_eq!(prepared.sql, "select * from t where name = :posparam1");
//! # Ok::<(), dataapi_rs::error::ParameterError>(())
//! ```

pub mod format;
pub mod hooks;
pub mod normalize;
pub mod placeholders;
pub mod results;

pub use format::{
    format_timestamp, DatetimeConversion, FormatOptions, ParameterFormatter, TimeZoneMode,
};
pub use hooks::{SqlRewriteFn, SqlRewriteHooks};
pub use normalize::{ParamSet, Parameter, ParameterNormalizer, Params};
pub use placeholders::{
    Engine, PlaceholderKind, PlaceholderRewriter, PreparedParameters, PreparedStatement,
    RewriteOptions,
};
pub use results::{
    snake_to_camel, BatchResult, DeserializeOptions, QueryResult, RecordDeserializer, Row,
    UpdateResult,
};
