//! Inference of the wire value kind for host values.

use super::value::Value;
use super::wire::TypeHint;

/// Wire tag a host value is encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    String,
    Boolean,
    Long,
    Double,
    Null,
    Blob,
}

/// Outcome of classifying a host value.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Encode with the given tag and optional type hint
    Kind(WireKind, Option<TypeHint>),
    /// Value is already wire-shaped
    PassThrough,
    /// Value cannot be bound
    Unsupported(&'static str),
}

/// Total classification over [`Value`].
pub struct TypeClassifier;

impl TypeClassifier {
    /// Classify a host value. First match wins: string, boolean, integral
    /// number, float, null, timestamp, bytes, wire-shaped, otherwise
    /// unsupported.
    pub fn classify(value: &Value) -> Classification {
        match value {
            Value::String(_) => Classification::Kind(WireKind::String, None),
            Value::Bool(_) => Classification::Kind(WireKind::Boolean, None),
            Value::Int(_) => Classification::Kind(WireKind::Long, None),
            Value::Float(f) if !f.is_finite() => {
                Classification::Unsupported("non-finite numbers cannot be bound")
            }
            Value::Float(f) if Self::is_integral(*f) => Classification::Kind(WireKind::Long, None),
            Value::Float(_) => Classification::Kind(WireKind::Double, None),
            Value::Null => Classification::Kind(WireKind::Null, None),
            Value::Timestamp(_) => Classification::Kind(WireKind::String, Some(TypeHint::Timestamp)),
            Value::Bytes(_) => Classification::Kind(WireKind::Blob, None),
            Value::Wire(_) => Classification::PassThrough,
            Value::Array(_) => Classification::Unsupported("array parameters are not supported"),
            Value::Json(_) => {
                Classification::Unsupported("objects must be shaped as exactly one wire value")
            }
        }
    }

    /// Type hint for a host value, if its storage type needs one.
    pub fn type_hint(value: &Value) -> Option<TypeHint> {
        match Self::classify(value) {
            Classification::Kind(_, hint) => hint,
            _ => None,
        }
    }

    fn is_integral(f: f64) -> bool {
        f.trunc() == f && f >= i64::MIN as f64 && f < i64::MAX as f64
    }
}
