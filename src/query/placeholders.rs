//! Placeholder rewriting.
//!
//! SQL text may carry three kinds of placeholders:
//!
//! - `$1`, `$2`, ... positional values, rewritten to `:posparam1`, ...
//! - `:name` bound values, sent as typed parameters
//! - `::name` identifiers, escaped and substituted into the SQL text
//!
//! Substitution is lexical. Nothing here parses SQL.

use super::format::{FormatOptions, ParameterFormatter};
use super::normalize::{ParamSet, Parameter, ParameterNormalizer, Params};
use crate::error::ParameterError;
use crate::types::{SqlParameter, Value};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

static POSITIONAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\d+)").expect("valid regex"));

static LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r":{1,2}\w+").expect("valid regex"));

static DATE_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}[-_]\d{2}[-_]\d{0,2}\s\d{2}:\d{0,2}:\d{0,2}").expect("valid regex")
});

/// Prefix of parameters synthesized from positional placeholders.
pub const POSITIONAL_PREFIX: &str = "posparam";

/// SQL dialect of the target cluster, used for identifier quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    #[default]
    Postgres,
    MySql,
}

impl Engine {
    fn quote(&self) -> char {
        match self {
            Engine::Postgres => '"',
            Engine::MySql => '`',
        }
    }

    /// Quote an identifier. Dotted names are quoted per segment and embedded
    /// quote characters are doubled.
    pub fn escape_id(&self, identifier: &str) -> String {
        let quote = self.quote();
        let doubled: String = [quote, quote].iter().collect();

        identifier
            .split('.')
            .map(|segment| {
                format!(
                    "{q}{}{q}",
                    segment.replace(quote, &doubled),
                    q = quote
                )
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Engine::Postgres),
            "mysql" => Ok(Engine::MySql),
            other => Err(format!("unknown engine '{}'", other)),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Postgres => f.write_str("postgres"),
            Engine::MySql => f.write_str("mysql"),
        }
    }
}

/// Kind of a named placeholder found in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// `:name`
    Value,
    /// `::name`
    Identifier,
}

/// Options for [`PlaceholderRewriter::prepare`].
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    pub engine: Engine,
    pub format: FormatOptions,
    /// Parse positional string values that look like timestamps into
    /// timestamps before formatting
    pub sniff_positional_dates: bool,
}

/// Bound parameters of a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedParameters {
    Single(Vec<SqlParameter>),
    /// One list per batch row
    Batch(Vec<Vec<SqlParameter>>),
}

impl PreparedParameters {
    /// Check if this is a batch.
    pub fn is_batch(&self) -> bool {
        matches!(self, PreparedParameters::Batch(_))
    }
}

/// SQL text and parameters ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    pub sql: String,
    pub parameters: PreparedParameters,
}

/// Rewrites placeholders and binds parameters.
pub struct PlaceholderRewriter;

impl PlaceholderRewriter {
    /// Replace `$N` with `:posparamN`. Returns the rewritten SQL and the
    /// distinct 1-based indexes in order of first appearance.
    ///
    /// Placeholders are named by the parsed index, so `$01` and `$1` both
    /// become `:posparam1`. An index that does not fit is reported as 0.
    /// Rewritten text contains no `$N` tokens, so a second pass is a no-op.
    pub fn rewrite_positional(sql: &str) -> (String, Vec<usize>) {
        let mut indexes = Vec::new();

        let rewritten = POSITIONAL.replace_all(sql, |caps: &regex::Captures<'_>| {
            let index = caps[1].parse::<usize>().unwrap_or(0);
            if !indexes.contains(&index) {
                indexes.push(index);
            }
            format!(":{}{}", POSITIONAL_PREFIX, index)
        });

        (rewritten.into_owned(), indexes)
    }

    /// Scan SQL for `:name` and `::name` labels. A later occurrence of the
    /// same label overrides an earlier one.
    pub fn labels(sql: &str) -> HashMap<String, PlaceholderKind> {
        LABEL
            .find_iter(sql)
            .map(|m| {
                let token = m.as_str();
                match token.strip_prefix("::") {
                    Some(label) => (label.to_string(), PlaceholderKind::Identifier),
                    None => (token[1..].to_string(), PlaceholderKind::Value),
                }
            })
            .collect()
    }

    /// Rewrite placeholders in `sql` and bind `params` against them.
    ///
    /// Parameters whose name matches no placeholder are dropped.
    pub fn prepare(
        sql: &str,
        params: Params,
        options: &RewriteOptions,
    ) -> Result<PreparedStatement, ParameterError> {
        let (sql, params) = Self::resolve_positional(sql, params, options)?;
        let labels = Self::labels(&sql);

        match params {
            Params::Batch(rows) => {
                let rows = ParameterNormalizer::normalize_rows(rows);
                let mut sql = sql;
                let mut bound_rows = Vec::with_capacity(rows.len());

                for (index, row) in rows.into_iter().enumerate() {
                    let (row_sql, bound) =
                        Self::bind(sql, row, &labels, index == 0, options)?;
                    sql = row_sql;
                    bound_rows.push(bound);
                }

                Ok(PreparedStatement {
                    sql,
                    parameters: PreparedParameters::Batch(bound_rows),
                })
            }
            Params::Named(units) => {
                let (sql, bound) = Self::bind(
                    sql,
                    ParameterNormalizer::normalize(units),
                    &labels,
                    true,
                    options,
                )?;
                Ok(PreparedStatement {
                    sql,
                    parameters: PreparedParameters::Single(bound),
                })
            }
            Params::None | Params::Positional(_) => Ok(PreparedStatement {
                sql,
                parameters: PreparedParameters::Single(Vec::new()),
            }),
        }
    }

    fn resolve_positional(
        sql: &str,
        params: Params,
        options: &RewriteOptions,
    ) -> Result<(String, Params), ParameterError> {
        if !POSITIONAL.is_match(sql) {
            return match params {
                Params::Positional(values) if !values.is_empty() => {
                    Err(ParameterError::InvalidInput {
                        reason: "positional values supplied but the SQL has no $N placeholders"
                            .to_string(),
                    })
                }
                other => Ok((sql.to_string(), other)),
            };
        }

        let values = match params {
            Params::Positional(values) => values,
            Params::None => Vec::new(),
            _ => {
                return Err(ParameterError::InvalidInput {
                    reason: "SQL with $N placeholders requires positional values".to_string(),
                })
            }
        };

        let (rewritten, indexes) = Self::rewrite_positional(sql);
        let mut named = Vec::with_capacity(indexes.len());

        for index in indexes {
            let value = index
                .checked_sub(1)
                .and_then(|i| values.get(i))
                .cloned()
                .ok_or(ParameterError::MissingPositional { index })?;

            let value = if options.sniff_positional_dates {
                Self::sniff_date(value, options)
            } else {
                value
            };

            named.push((format!("{}{}", POSITIONAL_PREFIX, index), value));
        }

        Ok((rewritten, Params::Named(vec![ParamSet::Map(named)])))
    }

    fn sniff_date(value: Value, options: &RewriteOptions) -> Value {
        match &value {
            Value::String(s) if DATE_LIKE.is_match(s) => {
                match options.format.treat_as_time_zone.parse_sql(s) {
                    Some(parsed) => Value::Timestamp(parsed.with_timezone(&chrono::Utc)),
                    None => value,
                }
            }
            _ => value,
        }
    }

    fn bind(
        mut sql: String,
        params: Vec<Parameter>,
        labels: &HashMap<String, PlaceholderKind>,
        substitute_identifiers: bool,
        options: &RewriteOptions,
    ) -> Result<(String, Vec<SqlParameter>), ParameterError> {
        let mut bound = Vec::new();

        for param in params {
            match labels.get(&param.name) {
                Some(PlaceholderKind::Value) => {
                    bound.push(ParameterFormatter::format(
                        &param.name,
                        &param.value,
                        &options.format,
                    )?);
                }
                Some(PlaceholderKind::Identifier) if substitute_identifiers => {
                    let escaped = Self::escape_identifier(&param, options.engine)?;
                    sql = Self::substitute(&sql, &param.name, &escaped)?;
                }
                _ => {}
            }
        }

        Ok((sql, bound))
    }

    fn escape_identifier(param: &Parameter, engine: Engine) -> Result<String, ParameterError> {
        let invalid = || ParameterError::InvalidType {
            name: param.name.clone(),
            reason: "identifier values must be strings".to_string(),
        };

        match &param.value {
            Value::String(s) => Ok(engine.escape_id(s)),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(|s| engine.escape_id(s)).ok_or_else(invalid))
                .collect::<Result<Vec<_>, _>>()
                .map(|ids| ids.join(", ")),
            _ => Err(invalid()),
        }
    }

    fn substitute(sql: &str, label: &str, escaped: &str) -> Result<String, ParameterError> {
        let pattern = Regex::new(&format!(r"::{}\b", regex::escape(label))).map_err(|e| {
            ParameterError::InvalidInput {
                reason: format!("invalid identifier placeholder '{}': {}", label, e),
            }
        })?;
        Ok(pattern.replace_all(sql, NoExpand(escaped)).into_owned())
    }
}
