//! The flush cycle of one unit-of-work.
//!
//! ```text
//! Idle ──enqueue──▶ Collecting ──flush──▶ Building ──▶ Scheduling ──▶ Emitting ──▶ Idle
//!                                            │                           │
//!                                            └──────────▶ Failed ◀───────┘
//! ```
//!
//! A failed flush leaves the cycle in [`FlushState::Failed`]: the
//! unit-of-work must be rolled back before it accepts new actions.

use crate::{
    BatchConfig,
    builders::Operation,
    emitter::{EmitReport, StatementExecutor, emit},
    errors::Error,
    graph::DependencyGraph,
    queue::ActionQueue,
    scheduler::{ExecutionPlan, schedule},
    value::ActionId,
};

/// Where a flush cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlushState {
    /// No pending action.
    #[default]
    Idle,
    /// Actions are being enqueued.
    Collecting,
    /// The dependency graph is being built.
    Building,
    /// Actions are being ordered and grouped.
    Scheduling,
    /// Batches are being submitted to the executor.
    Emitting,
    /// The last flush failed; the unit-of-work is marked for rollback.
    Failed,
}

/// Pending actions of one unit-of-work and the machinery to flush them.
///
/// A cycle is driven through `&mut self`, so a single unit-of-work can never
/// flush concurrently. Independent cycles share no state.
#[derive(Debug, Clone, Default)]
pub struct FlushCycle {
    config: BatchConfig,
    queue: ActionQueue,
    state: FlushState,
    last_report: Option<EmitReport>,
}

impl FlushCycle {
    /// Creates an idle cycle with the given configuration.
    #[must_use]
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The configuration of the cycle.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// The current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> FlushState {
        self.state
    }

    /// The pending actions not flushed yet.
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// What the last successful flush submitted.
    #[inline]
    #[must_use]
    pub fn last_report(&self) -> Option<&EmitReport> {
        self.last_report.as_ref()
    }

    fn ensure_usable(&self) -> Result<(), Error> {
        if self.state == FlushState::Failed {
            return Err(Error::MarkedForRollback);
        }
        Ok(())
    }

    /// Schedules a write for the next flush.
    ///
    /// # Errors
    ///
    /// * `MarkedForRollback` - If the previous flush failed.
    /// * `MissingIdentifier` - If an update or delete lacks an identifier value.
    /// * `EmptyUpdate` - If an update assigns no non-identifier column.
    pub fn enqueue<'a>(&mut self, operation: impl Into<Operation<'a>>) -> Result<ActionId, Error> {
        self.ensure_usable()?;
        let id = self.queue.enqueue(operation)?;
        self.state = FlushState::Collecting;
        Ok(id)
    }

    /// Records that `action` must run after `on`.
    ///
    /// # Errors
    ///
    /// * `MarkedForRollback` - If the previous flush failed.
    /// * `UnknownAction` - If `action` is not pending.
    pub fn add_dependency(&mut self, action: ActionId, on: ActionId) -> Result<(), Error> {
        self.ensure_usable()?;
        self.queue.add_dependency(action, on)?;
        self.state = FlushState::Collecting;
        Ok(())
    }

    /// Builds and schedules the pending actions without executing them.
    ///
    /// The pending actions are consumed, exactly as by [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// * `MarkedForRollback` - If the previous flush failed.
    /// * `CyclicDependency` - If the pending actions cannot be ordered.
    /// * `UnknownAction` - If an action references an action outside of this flush.
    pub fn plan(&mut self) -> Result<ExecutionPlan, Error> {
        self.ensure_usable()?;
        let actions = self.queue.drain_for_flush();
        if actions.is_empty() {
            self.state = FlushState::Idle;
            return Ok(ExecutionPlan::default());
        }

        tracing::debug!(actions = actions.len(), "building flush plan");
        self.state = FlushState::Building;
        let graph = match DependencyGraph::build(&actions) {
            Ok(graph) => graph,
            Err(err) => {
                tracing::warn!(error = %err, "flush aborted while building the dependency graph");
                self.state = FlushState::Failed;
                return Err(err);
            }
        };

        self.state = FlushState::Scheduling;
        let plan = schedule(&graph, actions, &self.config);
        self.state = FlushState::Idle;
        Ok(plan)
    }

    /// Flushes every pending action to `executor`.
    ///
    /// Nothing is executed unless the whole plan could be built; once
    /// emission starts, the first executor failure aborts the flush and the
    /// remaining batches are discarded.
    ///
    /// # Errors
    ///
    /// * `MarkedForRollback` - If the previous flush failed.
    /// * `CyclicDependency` - If the pending actions cannot be ordered.
    /// * `UnknownAction` - If an action references an action outside of this flush.
    /// * `StatementExecution` - If the executor fails.
    /// * `UnresolvedReference` - If a referenced row wrote no identifier value.
    /// * `BatchRowCountMismatch` - If the executor reports the wrong number of row counts.
    pub fn flush<E: StatementExecutor>(&mut self, executor: &mut E) -> Result<ExecutionPlan, Error> {
        let pending = self.queue.len();
        let plan = self.plan()?;
        if plan.is_empty() {
            return Ok(plan);
        }

        self.state = FlushState::Emitting;
        match emit(&plan, executor) {
            Ok(report) => {
                tracing::debug!(
                    actions = pending,
                    batches = report.total_batches(),
                    "flush completed"
                );
                self.last_report = Some(report);
                self.state = FlushState::Idle;
                Ok(plan)
            }
            Err(err) => {
                tracing::warn!(error = %err, "flush aborted while emitting batches");
                self.state = FlushState::Failed;
                Err(err)
            }
        }
    }

    /// Discards every pending action and returns the cycle to `Idle`.
    pub fn rollback(&mut self) {
        self.queue.clear();
        self.last_report = None;
        self.state = FlushState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::{EntityMapping, Insert, Value};

    #[derive(Debug, thiserror::Error)]
    #[error("unique constraint violated")]
    struct Violation;

    /// Executor failing on the first batch.
    struct Failing;

    impl StatementExecutor for Failing {
        type Handle = ();
        type Error = Violation;

        fn prepare(&mut self, _sql: &str) -> Result<(), Violation> {
            Ok(())
        }

        fn add_to_batch(&mut self, _handle: &(), _params: &[Value]) -> Result<(), Violation> {
            Ok(())
        }

        fn execute_batch(&mut self, _handle: &()) -> Result<Vec<u64>, Violation> {
            Err(Violation)
        }
    }

    /// Executor accepting everything.
    #[derive(Default)]
    struct Accepting {
        prepared: Vec<String>,
        added: usize,
    }

    impl StatementExecutor for Accepting {
        type Handle = ();
        type Error = Violation;

        fn prepare(&mut self, sql: &str) -> Result<(), Violation> {
            self.prepared.push(String::from(sql));
            Ok(())
        }

        fn add_to_batch(&mut self, _handle: &(), _params: &[Value]) -> Result<(), Violation> {
            self.added += 1;
            Ok(())
        }

        fn execute_batch(&mut self, _handle: &()) -> Result<Vec<u64>, Violation> {
            Ok(vec![1; core::mem::take(&mut self.added)])
        }
    }

    fn address() -> EntityMapping {
        EntityMapping::new("Address", "Address", &["ID"], &["ID"]).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let mapping = address();
        let mut cycle = FlushCycle::new(BatchConfig::default());
        assert_eq!(cycle.state(), FlushState::Idle);

        cycle.enqueue(Insert::from(&mapping).set("ID", 1i64).unwrap()).unwrap();
        assert_eq!(cycle.state(), FlushState::Collecting);

        let plan = cycle.flush(&mut Accepting::default()).unwrap();
        assert_eq!(plan.action_count(), 1);
        assert_eq!(cycle.state(), FlushState::Idle);
        assert!(cycle.queue().is_empty());
        assert_eq!(cycle.last_report().unwrap().total_batches(), 1);
    }

    #[test]
    fn test_add_dependency_keeps_collecting() {
        let mapping = address();
        let mut cycle = FlushCycle::default();
        assert!(matches!(
            cycle.add_dependency(ActionId::new(0), ActionId::new(1)),
            Err(Error::UnknownAction(_))
        ));
        assert_eq!(cycle.state(), FlushState::Idle);

        let a = cycle.enqueue(Insert::from(&mapping).set("ID", 1i64).unwrap()).unwrap();
        let b = cycle.enqueue(Insert::from(&mapping).set("ID", 2i64).unwrap()).unwrap();
        cycle.add_dependency(a, b).unwrap();
        assert_eq!(cycle.state(), FlushState::Collecting);

        assert_eq!(cycle.plan().unwrap().order(), vec![b, a]);
        assert_eq!(cycle.state(), FlushState::Idle);
    }

    #[test]
    fn test_empty_flush_executes_nothing() {
        let mut cycle = FlushCycle::default();
        let mut executor = Accepting::default();
        assert!(cycle.flush(&mut executor).unwrap().is_empty());
        assert!(executor.prepared.is_empty());
        assert_eq!(cycle.state(), FlushState::Idle);
    }

    #[test]
    fn test_cycle_fails_before_emission() {
        let mapping = address();
        let mut cycle = FlushCycle::default();
        let a = cycle.enqueue(Insert::from(&mapping).set("ID", 1i64).unwrap()).unwrap();
        let b = cycle.enqueue(Insert::from(&mapping).set("ID", 2i64).unwrap()).unwrap();
        cycle.add_dependency(a, b).unwrap();
        cycle.add_dependency(b, a).unwrap();

        let mut executor = Accepting::default();
        let err = cycle.flush(&mut executor).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
        assert!(executor.prepared.is_empty());
        assert_eq!(cycle.state(), FlushState::Failed);
    }

    #[test]
    fn test_failed_cycle_requires_rollback() {
        let mapping = address();
        let mut cycle = FlushCycle::default();
        cycle.enqueue(Insert::from(&mapping).set("ID", 1i64).unwrap()).unwrap();

        let err = cycle.flush(&mut Failing).unwrap_err();
        assert!(matches!(err, Error::StatementExecution { .. }));
        assert_eq!(cycle.state(), FlushState::Failed);

        assert!(matches!(
            cycle.enqueue(Insert::from(&mapping).set("ID", 2i64).unwrap()),
            Err(Error::MarkedForRollback)
        ));
        assert!(matches!(cycle.flush(&mut Failing), Err(Error::MarkedForRollback)));

        cycle.rollback();
        assert_eq!(cycle.state(), FlushState::Idle);
        cycle.enqueue(Insert::from(&mapping).set("ID", 2i64).unwrap()).unwrap();
        assert_eq!(cycle.queue().len(), 1);
    }
}
