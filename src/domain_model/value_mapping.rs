//! Column value mappings: how a raw store value is extracted into a typed
//! [`Value`] and how a caller-supplied value is encoded for binding.
//!
//! Mappings are plain `Copy` descriptors. The constants at the bottom of this
//! module are the shared stateless instances used throughout the pipeline.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Int64,
    Uint64,
    Float64,
    String,
    Bool,
    DateTime,
    Uuid,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Int64 => "int64",
            SqlType::Uint64 => "uint64",
            SqlType::Float64 => "float64",
            SqlType::String => "string",
            SqlType::Bool => "bool",
            SqlType::DateTime => "date_time",
            SqlType::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("cannot convert {found} value '{value}' to {expected}")]
pub struct ValueConversionError {
    pub expected: SqlType,
    pub found: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueMapping {
    pub sql_type: SqlType,
    pub nullable: bool,
}

impl ValueMapping {
    pub const fn new(sql_type: SqlType, nullable: bool) -> Self {
        ValueMapping { sql_type, nullable }
    }

    pub const fn non_null(self) -> Self {
        ValueMapping {
            sql_type: self.sql_type,
            nullable: false,
        }
    }

    pub const fn into_nullable(self) -> Self {
        ValueMapping {
            sql_type: self.sql_type,
            nullable: true,
        }
    }

    /// Best-effort mapping for a value with no column context.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null | Value::Text(_) => STRING,
            Value::Bool(_) => BOOL,
            Value::Int(_) => INT64,
            Value::UInt(_) => UINT64,
            Value::Float(_) => FLOAT64,
            Value::Timestamp(_) => DATE_TIME,
            Value::Uuid(_) => UUID,
        }
    }

    /// Read a raw row cell. NULL always passes through; absence of a value is
    /// meaningful to the caller (e.g. an unmatched outer join).
    pub fn extract(&self, raw: &Value) -> Result<Value, ValueConversionError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        self.coerce(raw)
    }

    /// Prepare a caller-supplied value for binding against this column.
    pub fn encode(&self, value: &Value) -> Result<Value, ValueConversionError> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(self.error(value))
            };
        }
        self.coerce(value)
    }

    fn coerce(&self, raw: &Value) -> Result<Value, ValueConversionError> {
        let converted = match (self.sql_type, raw) {
            (SqlType::Int64, Value::Int(i)) => Some(Value::Int(*i)),
            (SqlType::Int64, Value::UInt(u)) => i64::try_from(*u).ok().map(Value::Int),
            (SqlType::Int64, Value::Float(f)) if f.fract() == 0.0 && f.abs() < 9.2e18 => {
                Some(Value::Int(*f as i64))
            }
            (SqlType::Int64, Value::Text(s)) => s.trim().parse::<i64>().ok().map(Value::Int),

            (SqlType::Uint64, Value::UInt(u)) => Some(Value::UInt(*u)),
            (SqlType::Uint64, Value::Int(i)) => u64::try_from(*i).ok().map(Value::UInt),
            (SqlType::Uint64, Value::Float(f)) if f.fract() == 0.0 && *f >= 0.0 && *f < 1.8e19 => {
                Some(Value::UInt(*f as u64))
            }
            (SqlType::Uint64, Value::Text(s)) => s.trim().parse::<u64>().ok().map(Value::UInt),

            (SqlType::Float64, Value::Float(f)) => Some(Value::Float(*f)),
            (SqlType::Float64, Value::Int(i)) => Some(Value::Float(*i as f64)),
            (SqlType::Float64, Value::UInt(u)) => Some(Value::Float(*u as f64)),
            (SqlType::Float64, Value::Text(s)) => s.trim().parse::<f64>().ok().map(Value::Float),

            (SqlType::String, Value::Text(s)) => Some(Value::Text(s.clone())),
            (SqlType::String, Value::Uuid(u)) => Some(Value::Text(u.to_string())),

            (SqlType::Bool, Value::Bool(b)) => Some(Value::Bool(*b)),
            (SqlType::Bool, Value::Int(0)) | (SqlType::Bool, Value::UInt(0)) => {
                Some(Value::Bool(false))
            }
            (SqlType::Bool, Value::Int(1)) | (SqlType::Bool, Value::UInt(1)) => {
                Some(Value::Bool(true))
            }
            (SqlType::Bool, Value::Text(s)) => match s.trim() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },

            (SqlType::DateTime, Value::Timestamp(ts)) => Some(Value::Timestamp(*ts)),
            (SqlType::DateTime, Value::Text(s)) => parse_timestamp(s).map(Value::Timestamp),
            (SqlType::DateTime, Value::Int(secs)) => {
                Utc.timestamp_opt(*secs, 0).single().map(Value::Timestamp)
            }

            (SqlType::Uuid, Value::Uuid(u)) => Some(Value::Uuid(*u)),
            (SqlType::Uuid, Value::Text(s)) => Uuid::parse_str(s.trim()).ok().map(Value::Uuid),

            _ => None,
        };
        converted.ok_or_else(|| self.error(raw))
    }

    fn error(&self, raw: &Value) -> ValueConversionError {
        ValueConversionError {
            expected: self.sql_type,
            found: raw.type_name(),
            value: raw.to_string(),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub const INT64: ValueMapping = ValueMapping::new(SqlType::Int64, true);
pub const UINT64: ValueMapping = ValueMapping::new(SqlType::Uint64, true);
pub const FLOAT64: ValueMapping = ValueMapping::new(SqlType::Float64, true);
pub const STRING: ValueMapping = ValueMapping::new(SqlType::String, true);
pub const BOOL: ValueMapping = ValueMapping::new(SqlType::Bool, true);
pub const DATE_TIME: ValueMapping = ValueMapping::new(SqlType::DateTime, true);
pub const UUID: ValueMapping = ValueMapping::new(SqlType::Uuid, true);

/// Mapping for a column of `sql_type`.
pub const fn for_type(sql_type: SqlType, nullable: bool) -> ValueMapping {
    ValueMapping::new(sql_type, nullable)
}
