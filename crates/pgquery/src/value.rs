//! Loosely-typed values carried by filters, write data, binds and fetched rows.

use crate::error::{QueryError, QueryResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use std::str::FromStr;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type};
use uuid::Uuid;

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// `NUMERIC`, e.g. the result of `AVG` over integers or `SUM` over `int8`.
    Decimal(Decimal),
    Text(String),
    Json(serde_json::Value),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
}

/// Declared type of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Json,
    Uuid,
    Timestamp,
    List,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of the value. Text holding an integer is accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn param_type(&self) -> ParamType {
        match self {
            Value::Null => ParamType::Null,
            Value::Bool(_) => ParamType::Bool,
            Value::Int(_) => ParamType::Int,
            Value::Float(_) => ParamType::Float,
            Value::Decimal(_) => ParamType::Decimal,
            Value::Text(_) => ParamType::Text,
            Value::Json(_) => ParamType::Json,
            Value::Uuid(_) => ParamType::Uuid,
            Value::Timestamp(_) => ParamType::Timestamp,
            Value::List(_) => ParamType::List,
        }
    }

    /// Split a comma-joined string into a list. Pieces that parse as integers
    /// become [`Value::Int`], everything else stays text.
    pub fn split_comma(s: &str) -> Value {
        Value::List(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| match p.parse::<i64>() {
                    Ok(i) => Value::Int(i),
                    Err(_) => Value::Text(p.to_string()),
                })
                .collect(),
        )
    }

    /// Convert the value to the declared parameter type.
    pub fn coerce(self, ty: ParamType) -> QueryResult<Value> {
        if self.param_type() == ty || self.is_null() {
            return Ok(self);
        }
        let mismatch = |v: &Value| {
            QueryError::invalid_input(format!("cannot bind {:?} as {:?}", v.param_type(), ty))
        };
        let out = match (ty, &self) {
            (ParamType::Null, _) => Value::Null,
            (ParamType::Int, Value::Bool(b)) => Value::Int(i64::from(*b)),
            (ParamType::Int, Value::Float(f)) => Value::Int(f.trunc() as i64),
            (ParamType::Int, Value::Text(s)) => {
                Value::Int(s.trim().parse().map_err(|_| mismatch(&self))?)
            }
            (ParamType::Float, Value::Int(i)) => Value::Float(*i as f64),
            (ParamType::Float, Value::Decimal(d)) => {
                Value::Float(d.to_f64().ok_or_else(|| mismatch(&self))?)
            }
            (ParamType::Int, Value::Decimal(d)) => {
                Value::Int(d.trunc().to_i64().ok_or_else(|| mismatch(&self))?)
            }
            (ParamType::Decimal, Value::Int(i)) => Value::Decimal(Decimal::from(*i)),
            (ParamType::Decimal, Value::Float(f)) => {
                Value::Decimal(Decimal::try_from(*f).map_err(|_| mismatch(&self))?)
            }
            (ParamType::Decimal, Value::Text(s)) => {
                Value::Decimal(Decimal::from_str(s.trim()).map_err(|_| mismatch(&self))?)
            }
            (ParamType::Float, Value::Text(s)) => {
                Value::Float(s.trim().parse().map_err(|_| mismatch(&self))?)
            }
            (ParamType::Bool, Value::Int(i)) => Value::Bool(*i != 0),
            (ParamType::Bool, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "yes" => Value::Bool(true),
                "0" | "false" | "f" | "no" | "" => Value::Bool(false),
                _ => return Err(mismatch(&self)),
            },
            (ParamType::Text, Value::Bool(b)) => Value::Text(b.to_string()),
            (ParamType::Text, Value::Int(i)) => Value::Text(i.to_string()),
            (ParamType::Text, Value::Float(f)) => Value::Text(f.to_string()),
            (ParamType::Text, Value::Decimal(d)) => Value::Text(d.to_string()),
            (ParamType::Text, Value::Uuid(u)) => Value::Text(u.to_string()),
            (ParamType::Text, Value::Timestamp(t)) => Value::Text(t.to_rfc3339()),
            (ParamType::Text, Value::Json(j)) => Value::Text(j.to_string()),
            (ParamType::Uuid, Value::Text(s)) => {
                Value::Uuid(Uuid::parse_str(s.trim()).map_err(|_| mismatch(&self))?)
            }
            (ParamType::Timestamp, Value::Text(s)) => Value::Timestamp(
                DateTime::parse_from_rfc3339(s.trim())
                    .map_err(|_| mismatch(&self))?
                    .with_timezone(&Utc),
            ),
            (ParamType::Json, _) => Value::Json(self.to_json()),
            (ParamType::List, _) => Value::List(vec![self]),
            _ => return Err(mismatch(&self)),
        };
        Ok(out)
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => J::from(*f),
            // exact digits, as a JSON string
            Value::Decimal(d) => J::String(d.to_string()),
            Value::Text(s) => J::String(s.clone()),
            Value::Json(j) => j.clone(),
            Value::Uuid(u) => J::String(u.to_string()),
            Value::Timestamp(t) => J::String(t.to_rfc3339()),
            Value::List(items) => J::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v.and_utc())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(v: &[T]) -> Self {
        Value::List(v.iter().cloned().map(Into::into).collect())
    }
}

/// JSON scalars map onto native variants, arrays become lists and objects stay JSON.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            J::String(s) => Value::Text(s),
            J::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            obj @ J::Object(_) => Value::Json(obj),
        }
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => i.to_string().to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*f)?.to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::Decimal(d) => match *ty {
                Type::FLOAT4 => d.to_f32().ok_or("decimal out of range for float4")?.to_sql(ty, out),
                Type::FLOAT8 => d.to_f64().ok_or("decimal out of range for float8")?.to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => d.to_string().to_sql(ty, out),
                _ => d.to_sql(ty, out),
            },
            Value::Text(s) => match *ty {
                Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
                Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
                Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
                Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
                Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
                Type::NUMERIC => Decimal::from_str(s.trim())?.to_sql(ty, out),
                Type::UUID => Uuid::parse_str(s.trim())?.to_sql(ty, out),
                _ => s.as_str().to_sql(ty, out),
            },
            Value::Json(j) => j.to_sql(ty, out),
            Value::Uuid(u) => u.to_sql(ty, out),
            Value::Timestamp(t) => match *ty {
                Type::TIMESTAMP => t.naive_utc().to_sql(ty, out),
                _ => t.to_sql(ty, out),
            },
            Value::List(items) => match ty.kind() {
                Kind::Array(_) => items.to_sql(ty, out),
                _ => Err(format!("list value cannot be bound to non-array type {}", ty).into()),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}
