// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # In-memory `SqlExecutor`/`RowCursor` pair
//!
//! [`FixedRowsExecutor`] ignores the SQL text it's given and always hands
//! back the rows it was constructed with, in order. Tests configure one
//! response per expected statement and assert on the SQL the loader/engine
//! actually generated by capturing it separately.

use std::sync::Mutex;

use async_trait::async_trait;
use rolap_loader::{CellValue, ExecutionContext, LoaderError, RowCursor, SqlExecutor};

/// Forward-only cursor over a fixed row set.
pub struct FixedRowCursor {
    rows: Vec<Vec<CellValue>>,
    column_count: usize,
    position: Option<usize>,
}

impl FixedRowCursor {
    pub fn new(column_count: usize, rows: Vec<Vec<CellValue>>) -> Self {
        for row in &rows {
            debug_assert_eq!(row.len(), column_count, "row width must match column_count");
        }
        Self {
            rows,
            column_count,
            position: None,
        }
    }
}

impl RowCursor for FixedRowCursor {
    fn next(&mut self) -> Result<bool, LoaderError> {
        let next_position = self.position.map_or(0, |p| p + 1);
        if next_position >= self.rows.len() {
            self.position = Some(next_position);
            return Ok(false);
        }
        self.position = Some(next_position);
        Ok(true)
    }

    fn get_value(&self, column_index: usize) -> Result<CellValue, LoaderError> {
        let row_index = self.position.ok_or_else(|| LoaderError::SqlFailure("get_value called before next".into()))?;
        self.rows
            .get(row_index)
            .and_then(|row| row.get(column_index))
            .cloned()
            .ok_or_else(|| LoaderError::TypeMismatch {
                column: column_index,
                message: "column index out of range".into(),
            })
    }

    fn was_null(&self, column_index: usize) -> bool {
        matches!(self.get_value(column_index), Ok(CellValue::Null))
    }

    fn column_count(&self) -> usize {
        self.column_count
    }
}

/// An executor that replays pre-recorded row sets, one per call to
/// `execute`, in the order they were pushed. Captures every SQL string it
/// was asked to run so the test can assert on the generated query.
pub struct FixedRowsExecutor {
    column_count: usize,
    responses: Mutex<Vec<Vec<Vec<CellValue>>>>,
    captured_sql: Mutex<Vec<String>>,
}

impl FixedRowsExecutor {
    /// `responses` is consumed front-to-back: the first `execute` call gets
    /// `responses[0]`, the second gets `responses[1]`, and so on. An
    /// executor that runs out of configured responses returns an empty
    /// result set rather than panicking, so tests that only care about the
    /// first few statements don't need to enumerate every one.
    pub fn new(column_count: usize, responses: Vec<Vec<Vec<CellValue>>>) -> Self {
        Self {
            column_count,
            responses: Mutex::new(responses),
            captured_sql: Mutex::new(Vec::new()),
        }
    }

    /// A single-response convenience constructor for the common case of one
    /// statement per test.
    pub fn single(column_count: usize, rows: Vec<Vec<CellValue>>) -> Self {
        Self::new(column_count, vec![rows])
    }

    /// The SQL text passed to every `execute` call so far, in order.
    pub fn captured_sql(&self) -> Vec<String> {
        self.captured_sql.lock().expect("captured_sql poisoned").clone()
    }
}

#[async_trait]
impl SqlExecutor for FixedRowsExecutor {
    async fn execute(&self, sql: &str, context: &ExecutionContext) -> Result<Box<dyn RowCursor>, LoaderError> {
        context.checked_cancel_or_timeout()?;
        self.captured_sql.lock().expect("captured_sql poisoned").push(sql.to_string());
        let rows = self
            .responses
            .lock()
            .expect("responses poisoned")
            .pop_or_empty_front();
        Ok(Box::new(FixedRowCursor::new(self.column_count, rows)))
    }
}

/// `Vec::remove(0)`-style pop-front that returns an empty vec instead of
/// panicking once the configured responses are exhausted.
trait PopFront<T> {
    fn pop_or_empty_front(&mut self) -> Vec<T>;
}

impl<T> PopFront<T> for Vec<Vec<T>> {
    fn pop_or_empty_front(&mut self) -> Vec<T> {
        if self.is_empty() { Vec::new() } else { self.remove(0) }
    }
}
