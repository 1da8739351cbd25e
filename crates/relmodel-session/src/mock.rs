//! Scripted connection for unit tests.

use relmodel_core::{Connection, Cx, ExecResult, Result, Row, Value};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

/// Records every statement and answers from scripted queues.
///
/// Queries pop the next queued row set (empty when none is queued). Writes
/// pop the next queued result, defaulting to one affected row and no row id.
#[derive(Default)]
pub struct MockConnection {
    pub log: RefCell<Vec<(String, Vec<Value>)>>,
    rows: RefCell<VecDeque<Vec<Vec<Value>>>>,
    results: RefCell<VecDeque<ExecResult>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rows(&self, rows: Vec<Vec<Value>>) {
        self.rows.borrow_mut().push_back(rows);
    }

    pub fn push_result(&self, rows_affected: u64, last_insert_id: i64) {
        self.results.borrow_mut().push_back(ExecResult {
            rows_affected,
            last_insert_id,
        });
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.borrow().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn params(&self, index: usize) -> Vec<Value> {
        self.log.borrow()[index].1.clone()
    }
}

impl Connection for MockConnection {
    fn query(&self, _cx: &Cx, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.log.borrow_mut().push((sql.to_string(), params.to_vec()));
        let rows = self.rows.borrow_mut().pop_front().unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|values| {
                let columns: Arc<[String]> =
                    (0..values.len()).map(|i| format!("c{i}")).collect();
                Row::new(columns, values)
            })
            .collect())
    }

    fn execute(&self, _cx: &Cx, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.log.borrow_mut().push((sql.to_string(), params.to_vec()));
        Ok(self.results.borrow_mut().pop_front().unwrap_or(ExecResult {
            rows_affected: 1,
            last_insert_id: 0,
        }))
    }
}
