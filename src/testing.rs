//! Testing utilities for verifying what a flush submits.
//!
//! This module is gated behind the `testing` feature.
//!
//! # Provided helpers
//!
//! - [`RecordingExecutor`]: an in-memory [`StatementExecutor`] recording every
//!   call, counting batches and statements per SQL text, and optionally
//!   failing on a chosen statement.
//! - [`Call`]: one recorded executor call.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use crate::{StatementExecutor, Value, builders::IndexMap};

/// One call received by a [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// A statement was prepared.
    Prepare(String),
    /// A parameter set was added to the batch of a statement.
    AddToBatch {
        /// The statement's SQL text.
        sql: String,
        /// The bound parameters.
        params: Vec<Value>,
    },
    /// The batch of a statement was executed.
    ExecuteBatch {
        /// The statement's SQL text.
        sql: String,
        /// Number of parameter sets in the batch.
        statements: usize,
    },
}

/// Failure injected by a [`RecordingExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("injected failure executing `{sql}`")]
pub struct InjectedFailure {
    /// The SQL text of the failing batch.
    pub sql: String,
}

/// A statement executor that records calls instead of touching a database.
///
/// Every executed batch reports one affected row per parameter set.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    calls: Vec<Call>,
    /// SQL text and pending parameter sets of each prepared handle.
    prepared: Vec<(String, Vec<Vec<Value>>)>,
    batches: IndexMap<String, usize>,
    statements: IndexMap<String, usize>,
    fail_on: Option<String>,
}

impl RecordingExecutor {
    /// Creates an executor accepting every batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor failing when a batch of `sql` is executed.
    #[must_use]
    pub fn failing_on(sql: impl Into<String>) -> Self {
        Self {
            fail_on: Some(sql.into()),
            ..Self::default()
        }
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Number of batches executed for `sql`.
    #[must_use]
    pub fn batches_for(&self, sql: &str) -> usize {
        self.batches.get(sql).copied().unwrap_or_default()
    }

    /// Number of statements added to executed batches of `sql`.
    #[must_use]
    pub fn statements_for(&self, sql: &str) -> usize {
        self.statements.get(sql).copied().unwrap_or_default()
    }

    /// Total number of batches executed.
    #[must_use]
    pub fn total_batches(&self) -> usize {
        self.batches.values().sum()
    }

    /// SQL text of every executed batch, in execution order.
    #[must_use]
    pub fn executed(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::ExecuteBatch { sql, .. } => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Parameter sets added for `sql`, in order.
    #[must_use]
    pub fn rows_for(&self, sql: &str) -> Vec<&[Value]> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::AddToBatch { sql: added, params } if added == sql => Some(params.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Forgets every recorded call and count.
    pub fn reset(&mut self) {
        let fail_on = self.fail_on.take();
        *self = Self {
            fail_on,
            ..Self::default()
        };
    }
}

impl StatementExecutor for RecordingExecutor {
    type Handle = usize;
    type Error = InjectedFailure;

    fn prepare(&mut self, sql: &str) -> Result<usize, InjectedFailure> {
        self.calls.push(Call::Prepare(sql.to_string()));
        self.prepared.push((sql.to_string(), Vec::new()));
        Ok(self.prepared.len() - 1)
    }

    fn add_to_batch(&mut self, handle: &usize, params: &[Value]) -> Result<(), InjectedFailure> {
        let (sql, pending) = &mut self.prepared[*handle];
        pending.push(params.to_vec());
        self.calls.push(Call::AddToBatch {
            sql: sql.clone(),
            params: params.to_vec(),
        });
        Ok(())
    }

    fn execute_batch(&mut self, handle: &usize) -> Result<Vec<u64>, InjectedFailure> {
        let (sql, pending) = &mut self.prepared[*handle];
        let statements = core::mem::take(pending).len();
        if self.fail_on.as_deref() == Some(sql.as_str()) {
            return Err(InjectedFailure { sql: sql.clone() });
        }
        self.calls.push(Call::ExecuteBatch {
            sql: sql.clone(),
            statements,
        });
        *self.batches.entry(sql.clone()).or_default() += 1;
        *self.statements.entry(sql.clone()).or_default() += statements;
        Ok(vec![1; statements])
    }
}
