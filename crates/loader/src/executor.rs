// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # SQL execution boundary
//!
//! [`SqlExecutor`]/[`RowCursor`] are the only place this crate assumes
//! anything about a concrete database client. `rolap-engine` supplies the
//! implementation; everything else in the loader talks to rows through
//! [`RowCursor::get_value`]/[`RowCursor::was_null`] rather than a driver's
//! own typed getters, so swapping the backing database never touches
//! ingestion logic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use rolap_predicate::PredicateValue;
use rolap_segment::Cell;

use crate::error::LoaderError;

/// A typed, nullable result-column value, read by position rather than by
/// driver-specific getter name.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn to_predicate(&self) -> PredicateValue {
        match self {
            CellValue::Null => PredicateValue::Null,
            CellValue::Integer(i) => PredicateValue::Integer(*i),
            CellValue::Float(f) => PredicateValue::Float(*f),
            CellValue::Text(s) => PredicateValue::Text(s.clone()),
        }
    }

    /// Measure columns are always numeric; a text value at this position is
    /// a driver/query mismatch, not a representable state.
    pub fn to_cell(&self, column_index: usize) -> Result<Cell, LoaderError> {
        match self {
            CellValue::Null => Ok(Cell::Null),
            CellValue::Integer(i) => Ok(Cell::Int(*i)),
            CellValue::Float(f) => Ok(Cell::Float(*f)),
            CellValue::Text(s) => Err(LoaderError::TypeMismatch {
                column: column_index,
                message: format!("expected a numeric measure value, found text {s:?}"),
            }),
        }
    }
}

/// An opaque handle to a live statement/cursor, registered with an
/// [`ExecutionContext`] so a concurrent `cancel` can reach it. The loader
/// never inspects its contents — only the `SqlExecutor` implementation that
/// created it knows what to do with it on cancellation.
#[derive(Debug, Clone)]
pub struct StatementHandle(pub String);

/// Runs one SQL statement against a database, returning rows through a
/// [`RowCursor`] rather than a driver-specific result type.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str, context: &ExecutionContext) -> Result<Box<dyn RowCursor>, LoaderError>;
}

/// A forward-only cursor over a result set, read by column position.
pub trait RowCursor: Send {
    /// Advance to the next row. Returns `false` when the result set is
    /// exhausted.
    fn next(&mut self) -> Result<bool, LoaderError>;

    fn get_value(&self, column_index: usize) -> Result<CellValue, LoaderError>;

    fn was_null(&self, column_index: usize) -> bool;

    fn column_count(&self) -> usize;
}

/// Per-execution cancellation/timeout/statement-registry state, threaded
/// through SQL generation, execution, and row ingestion so a caller's
/// `cancel` (or a deadline passing mid-scan) is observed promptly rather
/// than only between statements.
pub struct ExecutionContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
    statements: Mutex<Vec<StatementHandle>>,
}

impl ExecutionContext {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self {
            deadline,
            cancelled: Arc::new(AtomicBool::new(false)),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cancel_handle(deadline: Option<Instant>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            deadline,
            cancelled,
            statements: Mutex::new(Vec::new()),
        }
    }

    /// A clone of the cancellation flag, so an external canceller (e.g. the
    /// cache actor's `CancelExecution` handler) can flip it without holding
    /// a reference to this context.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Remember a statement handle so it can be targeted by an external
    /// cancellation. The loader never reads these back itself.
    pub fn register_statement(&self, handle: StatementHandle) {
        self.statements.lock().expect("statement registry poisoned").push(handle);
    }

    pub fn registered_statements(&self) -> Vec<StatementHandle> {
        self.statements.lock().expect("statement registry poisoned").clone()
    }

    /// Returns `Err(LoaderError::Cancelled)` if this execution has been
    /// cancelled or its deadline has already passed. Called before issuing
    /// SQL and again between every row scanned, so a long-running scan
    /// doesn't outlive a cancellation or timeout.
    pub fn checked_cancel_or_timeout(&self) -> Result<(), LoaderError> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(LoaderError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(LoaderError::Cancelled);
        }
        Ok(())
    }
}
