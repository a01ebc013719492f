//! Emission of an execution plan against an external statement executor.
//!
//! Every [`BatchGroup`] becomes exactly one batch: its statement is prepared
//! (once per SQL text for the whole emission), each action's parameters are
//! added in group order, and the batch is executed as a single round trip.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::{
    builders::{IndexMap, PendingAction},
    errors::Error,
    scheduler::{BatchGroup, ExecutionPlan},
    value::{ActionId, Value},
};

/// A JDBC-like parameterized statement executor.
///
/// Implementations wrap a connection; the engine only ever calls these three
/// operations, in order, for each batch. `execute_batch` is the only call
/// expected to block on the database.
pub trait StatementExecutor {
    /// A prepared statement.
    type Handle;
    /// The executor's failure type.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Prepares a parameterized statement.
    ///
    /// # Errors
    ///
    /// Returns the executor's error if the statement cannot be prepared.
    fn prepare(&mut self, sql: &str) -> Result<Self::Handle, Self::Error>;

    /// Adds one set of parameter values to the pending batch of `handle`.
    ///
    /// # Errors
    ///
    /// Returns the executor's error if the parameters cannot be bound.
    fn add_to_batch(&mut self, handle: &Self::Handle, params: &[Value]) -> Result<(), Self::Error>;

    /// Executes the pending batch of `handle` and returns one row count per
    /// added parameter set.
    ///
    /// # Errors
    ///
    /// Returns the executor's error if the batch fails.
    fn execute_batch(&mut self, handle: &Self::Handle) -> Result<Vec<u64>, Self::Error>;
}

/// What an emission submitted, for verifying batching efficiency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmitReport {
    /// Batches executed per SQL text, in first-execution order.
    batches: IndexMap<String, usize>,
    /// Statements added per SQL text, in first-execution order.
    statements: IndexMap<String, usize>,
    /// Row counts returned by the executor, in execution order.
    row_counts: Vec<u64>,
}

impl EmitReport {
    /// Number of batches executed for `sql`.
    #[must_use]
    pub fn batches_for(&self, sql: &str) -> usize {
        self.batches.get(sql).copied().unwrap_or_default()
    }

    /// Number of statements added to batches of `sql`.
    #[must_use]
    pub fn statements_for(&self, sql: &str) -> usize {
        self.statements.get(sql).copied().unwrap_or_default()
    }

    /// Iterates over `(sql, batches executed)` in first-execution order.
    pub fn batches(&self) -> impl Iterator<Item = (&str, usize)> {
        self.batches.iter().map(|(sql, count)| (sql.as_str(), *count))
    }

    /// Total number of batches executed.
    #[must_use]
    pub fn total_batches(&self) -> usize {
        self.batches.values().sum()
    }

    /// Total number of statements added.
    #[must_use]
    pub fn total_statements(&self) -> usize {
        self.statements.values().sum()
    }

    /// Row counts returned by the executor, in execution order.
    #[must_use]
    pub fn row_counts(&self) -> &[u64] {
        &self.row_counts
    }

    fn record(&mut self, sql: &str, statements: usize, row_counts: Vec<u64>) {
        *self.batches.entry(sql.to_string()).or_default() += 1;
        *self.statements.entry(sql.to_string()).or_default() += statements;
        self.row_counts.extend(row_counts);
    }
}

/// Identifier values of the actions emitted so far.
#[derive(Debug, Default)]
struct Resolver {
    written: HashMap<ActionId, Value>,
}

impl Resolver {
    fn resolve(&self, value: &Value) -> Result<Value, Error> {
        match value {
            Value::Pending(id) => self
                .written
                .get(id)
                .cloned()
                .ok_or(Error::UnresolvedReference(*id)),
            other => Ok(other.clone()),
        }
    }

    fn parameters(&self, action: &PendingAction) -> Result<Vec<Value>, Error> {
        action.parameters().map(|value| self.resolve(value)).collect()
    }

    /// Records the identifier `action` wrote, so later rows may reference it.
    fn written(&mut self, action: &PendingAction) -> Result<(), Error> {
        if let Some(identifier) = action.identifier() {
            let identifier = self.resolve(identifier)?;
            self.written.insert(action.id(), identifier);
        }
        Ok(())
    }
}

fn execution_error<E>(group: &BatchGroup, source: E) -> Error
where
    E: core::error::Error + Send + Sync + 'static,
{
    Error::StatementExecution {
        sql: group.sql().to_string(),
        source: Box::new(source),
    }
}

/// Submits every group of `plan` to `executor`, one batch per group.
///
/// Parameters holding a [`Value::Pending`] reference are replaced by the
/// identifier value written by the referenced action, which the plan order
/// guarantees was emitted earlier. A group is resolved in full before any
/// of its rows is handed to the executor, so an unresolved reference leaves
/// no partially filled batch behind.
///
/// # Errors
///
/// * `StatementExecution` - If the executor fails; no further statement is issued.
/// * `UnresolvedReference` - If a referenced action wrote no identifier value.
/// * `BatchRowCountMismatch` - If a batch reports a row count vector of the wrong length.
pub fn emit<E: StatementExecutor>(
    plan: &ExecutionPlan,
    executor: &mut E,
) -> Result<EmitReport, Error> {
    let mut handles: IndexMap<&str, E::Handle> = IndexMap::default();
    let mut resolver = Resolver::default();
    let mut report = EmitReport::default();

    for group in plan.groups() {
        // The whole group is resolved before the executor sees any of it.
        let mut rows = Vec::with_capacity(group.len());
        for action in group.actions() {
            rows.push(resolver.parameters(action)?);
            resolver.written(action)?;
        }

        if !handles.contains_key(group.sql()) {
            let handle = executor
                .prepare(group.sql())
                .map_err(|err| execution_error(group, err))?;
            handles.insert(group.sql(), handle);
        }
        let handle = &handles[group.sql()];

        for params in &rows {
            executor
                .add_to_batch(handle, params)
                .map_err(|err| execution_error(group, err))?;
        }

        let row_counts = executor
            .execute_batch(handle)
            .map_err(|err| execution_error(group, err))?;
        if row_counts.len() != group.len() {
            return Err(Error::BatchRowCountMismatch {
                sql: group.sql().to_string(),
                expected: group.len(),
                got: row_counts.len(),
            });
        }

        tracing::trace!(sql = group.sql(), statements = group.len(), "executed batch");
        report.record(group.sql(), group.len(), row_counts);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::{ActionQueue, BatchConfig, DependencyGraph, EntityMapping, Insert, schedule};

    /// Minimal executor recording calls as strings.
    #[derive(Default)]
    struct Log {
        calls: Vec<String>,
        pending: usize,
        fail_on_execute: bool,
        short_counts: bool,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("connection lost")]
    struct ConnectionLost;

    impl StatementExecutor for Log {
        type Handle = String;
        type Error = ConnectionLost;

        fn prepare(&mut self, sql: &str) -> Result<String, ConnectionLost> {
            self.calls.push(alloc::format!("prepare {sql}"));
            Ok(sql.to_string())
        }

        fn add_to_batch(&mut self, _handle: &String, params: &[Value]) -> Result<(), ConnectionLost> {
            let rendered: Vec<String> = params.iter().map(ToString::to_string).collect();
            self.calls.push(alloc::format!("add {}", rendered.join(",")));
            self.pending += 1;
            Ok(())
        }

        fn execute_batch(&mut self, _handle: &String) -> Result<Vec<u64>, ConnectionLost> {
            if self.fail_on_execute {
                return Err(ConnectionLost);
            }
            self.calls.push("execute".to_string());
            let n = core::mem::take(&mut self.pending);
            Ok(vec![1; if self.short_counts { n - 1 } else { n }])
        }
    }

    fn cascade_plan() -> ExecutionPlan {
        let address = EntityMapping::new("Address", "Address", &["ID"], &["ID"]).unwrap();
        let person =
            EntityMapping::new("Person", "Person", &["address_ID", "ID"], &["ID"]).unwrap();
        let mut queue = ActionQueue::new();
        for (a, p) in [(1i64, 2i64), (3, 4)] {
            let parent = queue.enqueue(Insert::from(&address).set("ID", a).unwrap()).unwrap();
            queue
                .enqueue(
                    Insert::from(&person)
                        .set("address_ID", parent)
                        .unwrap()
                        .set("ID", p)
                        .unwrap(),
                )
                .unwrap();
        }
        let actions = queue.drain_for_flush();
        let graph = DependencyGraph::build(&actions).unwrap();
        schedule(&graph, actions, &BatchConfig::new(10).unwrap())
    }

    #[test]
    fn test_emit_resolves_pending_foreign_keys() {
        let mut log = Log::default();
        let report = emit(&cascade_plan(), &mut log).unwrap();
        assert_eq!(
            log.calls,
            vec![
                "prepare insert into Address (ID) values (?)",
                "add 1",
                "add 3",
                "execute",
                "prepare insert into Person (address_ID, ID) values (?, ?)",
                "add 1,2",
                "add 3,4",
                "execute",
            ]
        );
        assert_eq!(report.batches_for("insert into Address (ID) values (?)"), 1);
        assert_eq!(report.statements_for("insert into Person (address_ID, ID) values (?, ?)"), 2);
        assert_eq!(report.total_batches(), 2);
        assert_eq!(report.total_statements(), 4);
        assert_eq!(report.row_counts(), &[1, 1, 1, 1]);
    }

    #[test]
    fn test_executor_failure_is_wrapped() {
        let mut log = Log {
            fail_on_execute: true,
            ..Log::default()
        };
        let err = emit(&cascade_plan(), &mut log).unwrap_err();
        assert!(matches!(
            err,
            Error::StatementExecution { ref sql, .. } if sql == "insert into Address (ID) values (?)"
        ));
        assert!(core::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_row_count_mismatch() {
        let mut log = Log {
            short_counts: true,
            ..Log::default()
        };
        let err = emit(&cascade_plan(), &mut log).unwrap_err();
        assert!(matches!(
            err,
            Error::BatchRowCountMismatch { expected: 2, got: 1, .. }
        ));
    }

    #[test]
    fn test_reference_to_row_without_identifier() {
        let address = EntityMapping::new("Address", "Address", &["ID", "city"], &["ID"]).unwrap();
        let person =
            EntityMapping::new("Person", "Person", &["address_ID", "ID"], &["ID"]).unwrap();
        let mut queue = ActionQueue::new();
        let assigned = queue
            .enqueue(Insert::from(&address).set("ID", 5i64).unwrap().set("city", "Bergen").unwrap())
            .unwrap();
        // Identity-generated key: the row is inserted without an ID value.
        let generated = queue.enqueue(Insert::from(&address).set("city", "Oslo").unwrap()).unwrap();
        for (parent, id) in [(assigned, 1i64), (generated, 2)] {
            queue
                .enqueue(Insert::from(&person).set("address_ID", parent).unwrap().set("ID", id).unwrap())
                .unwrap();
        }
        let actions = queue.drain_for_flush();
        let graph = DependencyGraph::build(&actions).unwrap();
        let plan = schedule(&graph, actions, &BatchConfig::default());

        let mut log = Log::default();
        let err = emit(&plan, &mut log).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference(id) if id == generated));
        // No row of the failing group reached the executor.
        assert_eq!(
            log.calls,
            vec![
                "prepare insert into Address (ID, city) values (?, ?)",
                "add 5,'Bergen'",
                "add NULL,'Oslo'",
                "execute",
            ]
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_report_serde_keeps_execution_order() {
        let report = emit(&cascade_plan(), &mut Log::default()).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let decoded: EmitReport = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, report);
        assert_eq!(
            decoded.batches().map(|(sql, _)| sql).collect::<Vec<_>>(),
            vec![
                "insert into Address (ID) values (?)",
                "insert into Person (address_ID, ID) values (?, ?)",
            ]
        );
    }
}
