//! Per-call query options.

use crate::connection::{ConnectionParams, ExecuteOptions};
use crate::query::{DatetimeConversion, DeserializeOptions, FormatOptions};
use std::time::Duration;

/// Overrides of connection defaults for one call.
///
/// Unset fields fall back to the [`ConnectionParams`] of the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub hydrate_column_names: Option<bool>,
    pub convert_snake_to_camel: Option<bool>,
    pub format_options: Option<FormatOptions>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub query_timeout: Option<Duration>,
    pub skip_warmup_check: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key rows by column label.
    pub fn hydrate(mut self, hydrate: bool) -> Self {
        self.hydrate_column_names = Some(hydrate);
        self
    }

    pub fn snake_to_camel(mut self, convert: bool) -> Self {
        self.convert_snake_to_camel = Some(convert);
        self
    }

    pub fn format(mut self, options: FormatOptions) -> Self {
        self.format_options = Some(options);
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn skip_warmup_check(mut self) -> Self {
        self.skip_warmup_check = true;
        self
    }

    pub(crate) fn resolve(&self, params: &ConnectionParams) -> ResolvedOptions {
        let format = self
            .format_options
            .clone()
            .unwrap_or_else(|| params.format_options.clone());

        ResolvedOptions {
            deserialize: DeserializeOptions {
                hydrate: self
                    .hydrate_column_names
                    .unwrap_or(params.hydrate_column_names),
                snake_to_camel: self
                    .convert_snake_to_camel
                    .unwrap_or(params.convert_snake_to_camel),
                format,
            },
            database: self.database.clone().or_else(|| params.database.clone()),
            schema: self.schema.clone().or_else(|| params.schema.clone()),
            execute: ExecuteOptions {
                query_timeout: self.query_timeout,
                skip_warmup_check: self.skip_warmup_check,
            },
        }
    }
}

/// Options of one call after applying connection defaults.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub deserialize: DeserializeOptions,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub execute: ExecuteOptions,
}

impl ResolvedOptions {
    /// Column metadata is needed to key rows and to recognise date columns.
    pub fn include_result_metadata(&self) -> bool {
        self.deserialize.hydrate
            || self.deserialize.format.datetime_conversion != DatetimeConversion::KeepRaw
    }
}
