//! Result decoding.
//!
//! This module turns typed wire rows into host rows, optionally keyed by
//! column label, and extracts update counts and generated keys.

use super::format::{DatetimeConversion, FormatOptions};
use crate::transport::messages::{BatchExecuteStatementResponse, ExecuteStatementResponse};
use crate::types::{ArrayValue, ColumnMetadata, Value, WireValue};
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

static SNAKE_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_][a-z]").expect("valid regex"));

/// Column type names treated as date/time.
const DATE_TYPE_NAMES: [&str; 5] = [
    "date",
    "datetime",
    "timestamp",
    "timestamptz",
    "timestamp with time zone",
];

/// Convert `snake_case` (or `kebab-case`) segments to camelCase.
pub fn snake_to_camel(label: &str) -> String {
    SNAKE_SEGMENT
        .replace_all(label, |caps: &regex::Captures<'_>| caps[0][1..].to_uppercase())
        .into_owned()
}

/// Decoding options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializeOptions {
    /// Key rows by column label instead of position
    pub hydrate: bool,
    /// Convert labels containing `_` to camelCase
    pub snake_to_camel: bool,
    pub format: FormatOptions,
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self {
            hydrate: true,
            snake_to_camel: false,
            format: FormatOptions::default(),
        }
    }
}

/// One decoded row.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Positional(Vec<Value>),
    /// Label/value pairs in column order
    Hydrated(Vec<(String, Value)>),
}

impl Row {
    /// Value by column label. Positional rows have no labels.
    pub fn get(&self, label: &str) -> Option<&Value> {
        match self {
            Row::Positional(_) => None,
            Row::Hydrated(fields) => fields.iter().find(|(l, _)| l == label).map(|(_, v)| v),
        }
    }

    /// Value by column position.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            Row::Positional(values) => values.get(index),
            Row::Hydrated(fields) => fields.get(index).map(|(_, v)| v),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Row::Positional(values) => values.len(),
            Row::Hydrated(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in column order.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Row::Positional(values) => values,
            Row::Hydrated(fields) => fields.into_iter().map(|(_, v)| v).collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Row::Positional(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Row::Hydrated(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (label, value) in fields {
                    map.serialize_entry(label, value)?;
                }
                map.end()
            }
        }
    }
}

/// Result of a single statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_metadata: Option<Vec<ColumnMetadata>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Row>>,
    /// Only set when the statement returned no records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_records_updated: Option<i64>,
    /// First generated field, when it is a long
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_status: Option<String>,
}

impl QueryResult {
    /// Decoded rows, or an empty slice.
    pub fn rows(&self) -> &[Row] {
        self.records.as_deref().unwrap_or(&[])
    }
}

/// Generated key of one batch row.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<i64>,
}

/// Result of a batch statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub update_results: Vec<UpdateResult>,
}

impl BatchResult {
    /// Extract per-row generated keys.
    pub fn from_response(response: BatchExecuteStatementResponse) -> Self {
        Self {
            update_results: response
                .update_results
                .iter()
                .map(|entry| UpdateResult {
                    insert_id: first_long(&entry.generated_fields),
                })
                .collect(),
        }
    }
}

fn first_long(fields: &[WireValue]) -> Option<i64> {
    match fields.first() {
        Some(WireValue::Long(id)) => Some(*id),
        _ => None,
    }
}

/// Column label and type for one field position.
struct FieldInfo<'a> {
    label: String,
    type_name: Option<&'a str>,
}

impl FieldInfo<'_> {
    fn is_date(&self) -> bool {
        self.type_name
            .map(|t| DATE_TYPE_NAMES.contains(&t.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// Decodes typed wire rows into host rows.
pub struct RecordDeserializer;

impl RecordDeserializer {
    /// Build a [`QueryResult`] from a statement response.
    pub fn from_response(
        response: ExecuteStatementResponse,
        options: &DeserializeOptions,
    ) -> QueryResult {
        let mut columns = response.column_metadata;
        let insert_id = response.generated_fields.as_deref().and_then(first_long);

        let (records, number_of_records_updated) = match response.records {
            Some(records) => (
                Some(Self::format_records(records, columns.as_deref_mut(), options)),
                None,
            ),
            None => (None, response.number_of_records_updated),
        };

        QueryResult {
            column_metadata: columns,
            records,
            number_of_records_updated,
            insert_id,
            transaction_id: None,
            transaction_status: None,
        }
    }

    /// Decode rows against the given column metadata.
    ///
    /// With `snake_to_camel` set, labels are converted in `columns` once,
    /// before any row is decoded.
    pub fn format_records(
        records: Vec<Vec<WireValue>>,
        columns: Option<&mut [ColumnMetadata]>,
        options: &DeserializeOptions,
    ) -> Vec<Row> {
        let columns: &[ColumnMetadata] = match columns {
            Some(columns) => {
                if options.snake_to_camel {
                    for column in columns.iter_mut().filter(|c| c.label.contains('_')) {
                        column.label = snake_to_camel(&column.label);
                    }
                }
                &*columns
            }
            None => &[],
        };

        let width = records.first().map(Vec::len).unwrap_or(0);
        let fields: Vec<FieldInfo<'_>> = (0..width)
            .map(|i| match columns.get(i) {
                Some(column) => FieldInfo {
                    label: column.label.clone(),
                    type_name: column.type_name.as_deref(),
                },
                None => FieldInfo {
                    label: format!("col{}", i),
                    type_name: None,
                },
            })
            .collect();

        records
            .into_iter()
            .map(|record| Self::format_record(record, &fields, options))
            .collect()
    }

    fn format_record(
        record: Vec<WireValue>,
        fields: &[FieldInfo<'_>],
        options: &DeserializeOptions,
    ) -> Row {
        if !options.hydrate {
            return Row::Positional(
                record
                    .into_iter()
                    .enumerate()
                    .map(|(i, field)| {
                        Self::decode_field(field, fields.get(i), &options.format)
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            );
        }

        let mut row: Vec<(String, Value)> = Vec::with_capacity(record.len());
        for (i, field) in record.into_iter().enumerate() {
            let info = fields.get(i);
            let label = info
                .map(|f| f.label.clone())
                .unwrap_or_else(|| format!("col{}", i));
            let Some(value) = Self::decode_field(field, info, &options.format) else {
                continue;
            };

            match row.iter_mut().find(|(l, _)| *l == label) {
                Some(existing) => existing.1 = value,
                None => row.push((label, value)),
            }
        }
        Row::Hydrated(row)
    }

    /// Decode one field of a record. A field carrying only `isNull: false`
    /// holds no value and decodes to `None`.
    fn decode_field(
        field: WireValue,
        info: Option<&FieldInfo<'_>>,
        format: &FormatOptions,
    ) -> Option<Value> {
        match field {
            WireValue::IsNull(true) => Some(Value::Null),
            WireValue::IsNull(false) => None,
            WireValue::Array(array) => {
                let values = Self::decode_array(array, info, format);
                if format.stringify_arrays {
                    Some(Value::String(Value::Array(values).to_json().to_string()))
                } else {
                    Some(Value::Array(values))
                }
            }
            other => Some(Self::decode_value(other, info, format)),
        }
    }

    fn decode_array(array: ArrayValue, info: Option<&FieldInfo<'_>>, format: &FormatOptions) -> Vec<Value> {
        match array {
            ArrayValue::Booleans(values) => values.into_iter().map(Value::Bool).collect(),
            ArrayValue::Longs(values) => values.into_iter().map(Value::Int).collect(),
            ArrayValue::Doubles(values) => values.into_iter().map(Value::Float).collect(),
            ArrayValue::Strings(values) => values
                .into_iter()
                .map(|s| Self::decode_value(WireValue::String(s), info, format))
                .collect(),
            ArrayValue::Arrays(values) => values
                .into_iter()
                .map(|inner| Value::Array(Self::decode_array(inner, info, format)))
                .collect(),
        }
    }

    fn decode_value(value: WireValue, info: Option<&FieldInfo<'_>>, format: &FormatOptions) -> Value {
        match value {
            WireValue::IsNull(_) => Value::Null,
            WireValue::Boolean(b) => Value::Bool(b),
            WireValue::Long(i) => Value::Int(i),
            WireValue::Double(f) => Value::Float(f),
            WireValue::Blob(bytes) => Value::Bytes(bytes),
            WireValue::String(s) if info.map(FieldInfo::is_date).unwrap_or(false) => {
                Self::convert_datetime(s, format)
            }
            WireValue::String(s) => Value::String(s),
            WireValue::Array(array) => Value::Array(Self::decode_array(array, info, format)),
            WireValue::Struct(_) => Value::Wire(value),
        }
    }

    fn convert_datetime(raw: String, format: &FormatOptions) -> Value {
        let zone = &format.treat_as_time_zone;

        match format.datetime_conversion {
            DatetimeConversion::KeepRaw => Value::String(raw),
            DatetimeConversion::ToDate => match zone.parse_sql(&raw) {
                Some(parsed) => Value::Timestamp(parsed.with_timezone(&Utc)),
                None => Value::String(raw),
            },
            DatetimeConversion::ToIsoString => match zone.parse_sql(&raw) {
                Some(parsed) => Value::String(parsed.to_rfc3339_opts(SecondsFormat::Millis, true)),
                None => Value::String(raw),
            },
        }
    }
}
