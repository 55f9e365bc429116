//! Parameter input shapes and their normalization into a flat list.
//!
//! Callers may supply values as key/value mappings, pre-tagged `{name, value}`
//! pairs, nested sequences of those, positional values for `$N` placeholders,
//! or per-row sets for batch execution. [`ParameterNormalizer`] reduces all of
//! them to ordered [`Parameter`] lists.

use crate::error::ParameterError;
use crate::types::Value;
use serde_json::Value as JsonValue;

/// A named parameter value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

impl Parameter {
    /// Create a new parameter.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One normalization unit.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSet {
    /// Key/value mapping, expanded into one parameter per key in key order
    Map(Vec<(String, Value)>),
    /// Pre-tagged name/value pair
    Named(Parameter),
    /// Nested units, flattened recursively
    Nested(Vec<ParamSet>),
}

impl ParamSet {
    /// Build a mapping unit from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        ParamSet::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn from_json_object(map: serde_json::Map<String, JsonValue>) -> Self {
        ParamSet::Map(
            map.into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect(),
        )
    }

    fn from_json(value: JsonValue) -> Result<Self, ParameterError> {
        match value {
            JsonValue::Object(map) => Ok(Self::from_json_object(map)),
            JsonValue::Array(items) => Ok(ParamSet::Nested(
                items
                    .into_iter()
                    .map(Self::from_json)
                    .collect::<Result<_, _>>()?,
            )),
            other => Err(ParameterError::InvalidInput {
                reason: format!("expected an object or array of objects, got {}", other),
            }),
        }
    }
}

impl From<Parameter> for ParamSet {
    fn from(param: Parameter) -> Self {
        ParamSet::Named(param)
    }
}

/// Values supplied with a statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    /// Values for `$1..$N`, 1-based
    Positional(Vec<Value>),
    /// Values for `:name` and `::name` placeholders
    Named(Vec<ParamSet>),
    /// One parameter set per row of a batch
    Batch(Vec<Vec<ParamSet>>),
}

impl Params {
    /// Named parameters from a single mapping.
    pub fn named<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Params::Named(vec![ParamSet::map(entries)])
    }

    /// Positional parameters.
    pub fn positional<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Interpret a JSON document as statement values.
    ///
    /// - `null` means no values
    /// - an object is a single named mapping
    /// - an array of objects is a list of named units
    /// - an array of arrays is a batch, one inner array per row
    /// - any other array is positional
    pub fn from_json(value: JsonValue) -> Result<Self, ParameterError> {
        match value {
            JsonValue::Null => Ok(Params::None),
            JsonValue::Object(map) => Ok(Params::Named(vec![ParamSet::from_json_object(map)])),
            JsonValue::Array(items) if !items.is_empty() && items.iter().all(JsonValue::is_array) => {
                let rows = items
                    .into_iter()
                    .map(|row| -> Result<Vec<ParamSet>, ParameterError> {
                        match ParamSet::from_json(row)? {
                            ParamSet::Nested(units) => Ok(units),
                            unit => Ok(vec![unit]),
                        }
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Params::Batch(rows))
            }
            JsonValue::Array(items) if !items.is_empty() && items.iter().all(JsonValue::is_object) => {
                Ok(Params::Named(
                    items
                        .into_iter()
                        .map(ParamSet::from_json)
                        .collect::<Result<_, _>>()?,
                ))
            }
            JsonValue::Array(items) => Ok(Params::Positional(
                items.into_iter().map(Value::from).collect(),
            )),
            other => Err(ParameterError::InvalidInput {
                reason: format!("values must be an object or array, got {}", other),
            }),
        }
    }

    /// Check if no values were supplied.
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(values) => values.is_empty(),
            Params::Named(units) => units.is_empty(),
            Params::Batch(rows) => rows.is_empty(),
        }
    }
}

impl From<Vec<ParamSet>> for Params {
    fn from(units: Vec<ParamSet>) -> Self {
        Params::Named(units)
    }
}

impl From<ParamSet> for Params {
    fn from(unit: ParamSet) -> Self {
        Params::Named(vec![unit])
    }
}

/// Build named [`Params`] from `key => value` pairs.
///
/// ```
/// use dataapi_rs::params;
///
/// let params = params! { "id" => 7, "table" => "users" };
/// assert!(!params.is_empty());
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::query::Params::None
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::query::Params::Named(vec![$crate::query::ParamSet::Map(vec![
            $((::std::string::String::from($key), $crate::types::Value::from($value))),+
        ])])
    };
}

/// Flattens normalization units into ordered parameter lists.
pub struct ParameterNormalizer;

impl ParameterNormalizer {
    /// Flatten units into one ordered list. Duplicate names are kept in
    /// encounter order.
    pub fn normalize(units: Vec<ParamSet>) -> Vec<Parameter> {
        let mut out = Vec::new();
        for unit in units {
            Self::push_unit(unit, &mut out);
        }
        out
    }

    /// Flatten each row of a batch independently.
    pub fn normalize_rows(rows: Vec<Vec<ParamSet>>) -> Vec<Vec<Parameter>> {
        rows.into_iter().map(Self::normalize).collect()
    }

    fn push_unit(unit: ParamSet, out: &mut Vec<Parameter>) {
        match unit {
            ParamSet::Named(param) => out.push(param),
            ParamSet::Nested(units) => {
                for unit in units {
                    Self::push_unit(unit, out);
                }
            }
            ParamSet::Map(entries) => match Self::as_pair(&entries) {
                Some(param) => out.push(param),
                None => out.extend(
                    entries
                        .into_iter()
                        .map(|(name, value)| Parameter { name, value }),
                ),
            },
        }
    }

    /// A mapping with exactly the keys `name` and `value`, both truthy and
    /// `name` a string, is a pre-tagged pair.
    fn as_pair(entries: &[(String, Value)]) -> Option<Parameter> {
        if entries.len() != 2 {
            return None;
        }
        let name = entries.iter().find(|(k, _)| k == "name")?;
        let value = entries.iter().find(|(k, _)| k == "value")?;

        match (&name.1, value.1.is_truthy()) {
            (Value::String(n), true) if !n.is_empty() => Some(Parameter {
                name: n.clone(),
                value: value.1.clone(),
            }),
            _ => None,
        }
    }
}
