//! Host values, wire values and the mapping between them.

mod classify;
mod value;
mod wire;

pub use classify::{Classification, TypeClassifier, WireKind};
pub use value::Value;
pub use wire::{
    ArrayValue, ColumnMetadata, SqlParameter, StructValue, TypeHint, WireValue, SUPPORTED_TAGS,
};
