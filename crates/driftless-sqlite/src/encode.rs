//! Conversions between driftless cells and rusqlite values.

use driftless_core::Value;
use rusqlite::types::{Value as SqlValue, ValueRef};

pub(crate) fn encode_params(params: &[Value]) -> Vec<SqlValue> {
  params
    .iter()
    .map(|v| match v {
      Value::Null => SqlValue::Null,
      Value::Integer(i) => SqlValue::Integer(*i),
      Value::Real(r) => SqlValue::Real(*r),
      Value::Text(s) => SqlValue::Text(s.clone()),
    })
    .collect()
}

/// Blobs never appear in catalog or history reads; they decode as lossy
/// text rather than failing the row.
pub(crate) fn decode_value(value: ValueRef<'_>) -> Value {
  match value {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) => Value::Integer(i),
    ValueRef::Real(r) => Value::Real(r),
    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
      Value::Text(String::from_utf8_lossy(bytes).into_owned())
    }
  }
}
