//! Wire format of the Data API.
//!
//! Parameters and result fields are typed unions with exactly one populated
//! tag, e.g. `{"stringValue": "a"}` or `{"isNull": true}`. Serde's externally
//! tagged enums produce exactly that shape.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Tag names the service recognises for a single field value.
pub const SUPPORTED_TAGS: [&str; 8] = [
    "arrayValue",
    "blobValue",
    "booleanValue",
    "doubleValue",
    "isNull",
    "longValue",
    "stringValue",
    "structValue",
];

/// A single typed value on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// NULL marker; carries a flag instead of a payload
    #[serde(rename = "isNull")]
    IsNull(bool),
    #[serde(rename = "booleanValue")]
    Boolean(bool),
    #[serde(rename = "longValue")]
    Long(i64),
    #[serde(rename = "doubleValue")]
    Double(f64),
    #[serde(rename = "stringValue")]
    String(String),
    /// Base64 encoded on the wire
    #[serde(rename = "blobValue", with = "base64_bytes")]
    Blob(Vec<u8>),
    #[serde(rename = "arrayValue")]
    Array(ArrayValue),
    #[serde(rename = "structValue")]
    Struct(StructValue),
}

impl WireValue {
    /// A NULL value.
    pub fn null() -> Self {
        WireValue::IsNull(true)
    }

    /// Check if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::IsNull(_))
    }

    /// Wire tag name of this value.
    pub fn tag(&self) -> &'static str {
        match self {
            WireValue::IsNull(_) => "isNull",
            WireValue::Boolean(_) => "booleanValue",
            WireValue::Long(_) => "longValue",
            WireValue::Double(_) => "doubleValue",
            WireValue::String(_) => "stringValue",
            WireValue::Blob(_) => "blobValue",
            WireValue::Array(_) => "arrayValue",
            WireValue::Struct(_) => "structValue",
        }
    }
}

/// Homogeneous array value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayValue {
    #[serde(rename = "booleanValues")]
    Booleans(Vec<bool>),
    #[serde(rename = "longValues")]
    Longs(Vec<i64>),
    #[serde(rename = "doubleValues")]
    Doubles(Vec<f64>),
    #[serde(rename = "stringValues")]
    Strings(Vec<String>),
    #[serde(rename = "arrayValues")]
    Arrays(Vec<ArrayValue>),
}

impl ArrayValue {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Booleans(v) => v.len(),
            ArrayValue::Longs(v) => v.len(),
            ArrayValue::Doubles(v) => v.len(),
            ArrayValue::Strings(v) => v.len(),
            ArrayValue::Arrays(v) => v.len(),
        }
    }

    /// Check if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Struct value (postgres composite types).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructValue {
    #[serde(default)]
    pub attributes: Vec<WireValue>,
}

/// Secondary storage type tag for values whose kind cannot be inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeHint {
    Date,
    Decimal,
    Json,
    Time,
    Timestamp,
    Uuid,
}

/// A named, typed statement parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlParameter {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub type_hint: Option<TypeHint>,
    pub value: WireValue,
}

/// Column metadata returned when result metadata is requested.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnMetadata {
    pub name: Option<String>,
    pub label: String,
    pub type_name: Option<String>,
    #[serde(rename = "type")]
    pub type_code: Option<i32>,
    pub nullable: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
    pub is_auto_increment: Option<bool>,
    pub is_signed: Option<bool>,
    pub is_case_sensitive: Option<bool>,
    pub array_base_column_type: Option<i32>,
}

impl ColumnMetadata {
    /// Metadata with just a label and type name.
    pub fn new(label: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            type_name: Some(type_name.into()),
            ..Default::default()
        }
    }
}

mod base64_bytes {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
