//! A scripted in-memory [`Database`] for unit tests.
//!
//! Queries are answered from canned rows keyed by a SQL fragment and,
//! optionally, the first bound parameter. Executed statements are recorded.

use std::sync::{
  Mutex,
  atomic::{AtomicI64, Ordering},
};

use crate::database::{Database, Execution, Row, Value};

#[derive(Debug, thiserror::Error)]
pub enum FakeError {
  #[error("scripted failure on {0:?}")]
  Scripted(String),
}

struct Response {
  fragment: String,
  param:    Option<String>,
  rows:     Vec<Row>,
}

pub struct FakeDatabase {
  dialect:   String,
  responses: Vec<Response>,
  fail_on:   Vec<String>,
  panic_on:  Vec<String>,
  executed:  Mutex<Vec<String>>,
  next_id:   AtomicI64,
}

impl FakeDatabase {
  pub fn new(dialect: &str) -> Self {
    Self {
      dialect:   dialect.to_owned(),
      responses: vec![],
      fail_on:   vec![],
      panic_on:  vec![],
      executed:  Mutex::new(vec![]),
      next_id:   AtomicI64::new(1),
    }
  }

  /// Answer any query containing `fragment` with `rows`.
  pub fn respond(mut self, fragment: &str, rows: Vec<Row>) -> Self {
    self.responses.push(Response {
      fragment: fragment.to_owned(),
      param: None,
      rows,
    });
    self
  }

  /// Answer queries containing `fragment` whose first parameter is `param`.
  pub fn respond_for(mut self, fragment: &str, param: &str, rows: Vec<Row>) -> Self {
    self.responses.push(Response {
      fragment: fragment.to_owned(),
      param: Some(param.to_owned()),
      rows,
    });
    self
  }

  pub fn fail_on(mut self, fragment: &str) -> Self {
    self.fail_on.push(fragment.to_owned());
    self
  }

  pub fn panic_on(mut self, fragment: &str) -> Self {
    self.panic_on.push(fragment.to_owned());
    self
  }

  /// Statements passed to `execute`, in order.
  pub fn executed(&self) -> Vec<String> {
    self.executed.lock().unwrap().clone()
  }

  fn check(&self, sql: &str) -> Result<(), FakeError> {
    if self.panic_on.iter().any(|f| sql.contains(f.as_str())) {
      panic!("scripted panic on {sql:?}");
    }
    match self.fail_on.iter().find(|f| sql.contains(f.as_str())) {
      Some(fragment) => Err(FakeError::Scripted(fragment.clone())),
      None => Ok(()),
    }
  }

  fn answer(&self, sql: &str, params: &[Value]) -> Vec<Row> {
    let first = params.first().and_then(Value::as_str);
    self
      .responses
      .iter()
      .find(|r| {
        sql.contains(r.fragment.as_str())
          && r.param.as_deref().is_none_or(|p| Some(p) == first)
      })
      .map(|r| r.rows.clone())
      .unwrap_or_default()
  }
}

impl Database for FakeDatabase {
  type Error = FakeError;

  fn dialect_name(&self) -> &str { &self.dialect }

  async fn execute<'a>(
    &'a self,
    sql: &'a str,
    _params: &'a [Value],
  ) -> Result<Execution, FakeError> {
    self.check(sql)?;
    self.executed.lock().unwrap().push(sql.to_owned());
    Ok(Execution {
      rows_affected:  1,
      last_insert_id: Some(self.next_id.fetch_add(1, Ordering::SeqCst)),
    })
  }

  async fn query<'a>(
    &'a self,
    sql: &'a str,
    params: &'a [Value],
  ) -> Result<Vec<Row>, FakeError> {
    self.check(sql)?;
    Ok(self.answer(sql, params))
  }
}

/// A row from `(column, value)` pairs.
pub fn row<const N: usize>(cells: [(&str, Value); N]) -> Row {
  let (columns, values) = cells
    .into_iter()
    .map(|(c, v)| (c.to_owned(), v))
    .unzip();
  Row::new(columns, values)
}
