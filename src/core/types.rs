use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::Value;

/// Explicit protocol-level cell type, used when a field's mapping overrides the
/// type inferred from its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireType {
    Boolean,
    BigInt,
    DoublePrecision,
    Text,
    Uuid,
    TimestampTz,
}

impl WireType {
    /// Whether a value can be serialized under this wire type. NULL is accepted
    /// everywhere; nullability is the store's concern, not this layer's.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::BigInt, Value::Integer(_)) => true,
            (Self::DoublePrecision, Value::Float(_) | Value::Integer(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Uuid, Value::Uuid(_)) => true,
            (Self::TimestampTz, Value::Timestamp(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::BigInt => "bigint",
            Self::DoublePrecision => "double precision",
            Self::Text => "text",
            Self::Uuid => "uuid",
            Self::TimestampTz => "timestamptz",
        };
        write!(f, "{}", name)
    }
}
