//! Parameter binding and cell decoding shared by both backends.

use driftless_core::{Row, Value};
use sqlx::{Column, ColumnIndex, Decode, Encode, Type, TypeInfo, query::Query};

use crate::{Error, Result};

type Args<'q, DB> = <DB as sqlx::Database>::Arguments<'q>;

pub(crate) fn bind_values<'q, DB>(
  mut query: Query<'q, DB, Args<'q, DB>>,
  params: &[Value],
) -> Query<'q, DB, Args<'q, DB>>
where
  DB: sqlx::Database,
  Option<String>: Encode<'q, DB> + Type<DB>,
  String: Encode<'q, DB> + Type<DB>,
  i64: Encode<'q, DB> + Type<DB>,
  f64: Encode<'q, DB> + Type<DB>,
{
  for param in params {
    query = match param {
      Value::Null => query.bind(Option::<String>::None),
      Value::Integer(i) => query.bind(*i),
      Value::Real(r) => query.bind(*r),
      Value::Text(s) => query.bind(s.clone()),
    };
  }
  query
}

pub(crate) fn decode_row<R>(row: &R) -> Result<Row>
where
  R: sqlx::Row,
  usize: ColumnIndex<R>,
  for<'r> String: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> i64: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> i32: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> f64: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> bool: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
  let columns: Vec<String> = row
    .columns()
    .iter()
    .map(|c| c.name().to_owned())
    .collect();

  let values = (0..columns.len())
    .map(|i| decode_cell(row, i))
    .collect::<Result<Vec<_>>>()?;

  Ok(Row::new(columns, values))
}

fn decode_cell<R>(row: &R, i: usize) -> Result<Value>
where
  R: sqlx::Row,
  usize: ColumnIndex<R>,
  for<'r> String: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> i64: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> i32: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> f64: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> bool: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
  cell_value(&RowCell { row, index: i }).ok_or_else(|| {
    let column = &row.columns()[i];
    Error::Decode {
      column:    column.name().to_owned(),
      type_name: column.type_info().name().to_owned(),
    }
  })
}

// ─── Cells ───────────────────────────────────────────────────────────────────

/// One cell read as a given Rust type. The outer `None` means the column
/// does not decode as that type; the inner one is SQL `NULL`.
trait Cell {
  fn text(&self) -> Option<Option<String>>;
  fn int64(&self) -> Option<Option<i64>>;
  fn int32(&self) -> Option<Option<i32>>;
  fn float(&self) -> Option<Option<f64>>;
  fn boolean(&self) -> Option<Option<bool>>;
  fn bytes(&self) -> Option<Option<Vec<u8>>>;
}

struct RowCell<'r, R> {
  row:   &'r R,
  index: usize,
}

impl<R> Cell for RowCell<'_, R>
where
  R: sqlx::Row,
  usize: ColumnIndex<R>,
  for<'r> String: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> i64: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> i32: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> f64: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> bool: Decode<'r, R::Database> + Type<R::Database>,
  for<'r> Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
  fn text(&self) -> Option<Option<String>> { self.row.try_get(self.index).ok() }

  fn int64(&self) -> Option<Option<i64>> { self.row.try_get(self.index).ok() }

  fn int32(&self) -> Option<Option<i32>> { self.row.try_get(self.index).ok() }

  fn float(&self) -> Option<Option<f64>> { self.row.try_get(self.index).ok() }

  fn boolean(&self) -> Option<Option<bool>> { self.row.try_get(self.index).ok() }

  fn bytes(&self) -> Option<Option<Vec<u8>>> { self.row.try_get(self.index).ok() }
}

/// Text first, then integers, float, bool and finally raw bytes.
fn cell_value(cell: &impl Cell) -> Option<Value> {
  if let Some(v) = cell.text() {
    return Some(v.map_or(Value::Null, Value::Text));
  }
  if let Some(v) = cell.int64() {
    return Some(v.map_or(Value::Null, Value::Integer));
  }
  if let Some(v) = cell.int32() {
    return Some(v.map_or(Value::Null, |n| Value::Integer(n.into())));
  }
  if let Some(v) = cell.float() {
    return Some(v.map_or(Value::Null, Value::Real));
  }
  if let Some(v) = cell.boolean() {
    return Some(v.map_or(Value::Null, |b| Value::Integer(b.into())));
  }
  // MySQL reports some information_schema columns with binary collations.
  cell.bytes().map(|v| {
    v.map_or(Value::Null, |bytes| {
      Value::Text(String::from_utf8_lossy(&bytes).into_owned())
    })
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  /// A cell of exactly one type, holding `Some(value)` or `NULL`.
  #[derive(Default)]
  struct Fixed {
    text:    Option<Option<String>>,
    int64:   Option<Option<i64>>,
    int32:   Option<Option<i32>>,
    float:   Option<Option<f64>>,
    boolean: Option<Option<bool>>,
    bytes:   Option<Option<Vec<u8>>>,
  }

  impl Cell for Fixed {
    fn text(&self) -> Option<Option<String>> { self.text.clone() }

    fn int64(&self) -> Option<Option<i64>> { self.int64 }

    fn int32(&self) -> Option<Option<i32>> { self.int32 }

    fn float(&self) -> Option<Option<f64>> { self.float }

    fn boolean(&self) -> Option<Option<bool>> { self.boolean }

    fn bytes(&self) -> Option<Option<Vec<u8>>> { self.bytes.clone() }
  }

  #[test]
  fn text_wins_over_later_types() {
    let cell = Fixed {
      text: Some(Some("7".into())),
      int64: Some(Some(7)),
      ..Fixed::default()
    };
    assert_eq!(cell_value(&cell), Some(Value::Text("7".into())));
  }

  #[test]
  fn narrow_integers_and_booleans_become_integers() {
    let int4 = Fixed { int32: Some(Some(42)), ..Fixed::default() };
    assert_eq!(cell_value(&int4), Some(Value::Integer(42)));

    let flag = Fixed { boolean: Some(Some(true)), ..Fixed::default() };
    assert_eq!(cell_value(&flag), Some(Value::Integer(1)));

    let real = Fixed { float: Some(Some(1.5)), ..Fixed::default() };
    assert_eq!(cell_value(&real), Some(Value::Real(1.5)));
  }

  #[test]
  fn binary_collated_text_is_decoded_lossily() {
    let cell = Fixed { bytes: Some(Some(b"idx_\xffa".to_vec())), ..Fixed::default() };
    assert_eq!(cell_value(&cell), Some(Value::Text("idx_\u{fffd}a".into())));
  }

  #[test]
  fn null_stays_null_whatever_the_type() {
    let cell = Fixed { int64: Some(None), ..Fixed::default() };
    assert_eq!(cell_value(&cell), Some(Value::Null));
  }

  #[test]
  fn undecodable_cell_yields_nothing() {
    assert_eq!(cell_value(&Fixed::default()), None);
  }
}
