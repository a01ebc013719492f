//! Topological ordering and batch grouping of pending actions.
//!
//! # Algorithm
//!
//! 1. Kahn's algorithm over the [`DependencyGraph`]. When several actions
//!    are ready, the next one is:
//!    - the lowest-program-order ready action with the same statement shape
//!      as the action placed last, if reordering is enabled for its kind;
//!    - otherwise the lowest-program-order ready action.
//! 2. The order is cut into groups: an action joins the current group when
//!    it has the same statement shape and the group holds fewer than
//!    `max_batch_size` actions; otherwise a new group is opened.
//!
//! Grouping happens strictly after ordering, so two same-shape actions that
//! a dependency keeps apart end up in different groups. The affinity rule in
//! step 1 is what pulls same-shape actions of independent dependency chains
//! next to each other (e.g. the parent rows of two cascades) so that they
//! share one batch.
//!
//! When every action of the flush is of a kind whose reordering is disabled
//! (e.g. an insert-only flush with `order_inserts` off), the graph is
//! bypassed and the order is the raw program order.

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;

use crate::{
    BatchConfig,
    builders::{ActionKind, IndexMap, PendingAction},
    graph::DependencyGraph,
    value::ActionId,
};

/// Consecutive actions sharing one parameterized statement, executed as a
/// single batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchGroup {
    /// The statement shared by every action of the group.
    sql: String,
    /// Actions in execution order.
    actions: Vec<PendingAction>,
}

impl BatchGroup {
    fn open(action: PendingAction) -> Self {
        Self {
            sql: String::from(action.sql()),
            actions: alloc::vec![action],
        }
    }

    /// The parameterized SQL shared by the group.
    #[inline]
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The kind of statement of the group.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.actions[0].kind()
    }

    /// The table the group writes to.
    #[must_use]
    pub fn table_name(&self) -> &str {
        self.actions[0].table_name()
    }

    /// The actions of the group, in execution order.
    #[inline]
    #[must_use]
    pub fn actions(&self) -> &[PendingAction] {
        &self.actions
    }

    /// The identifiers of the actions of the group, in execution order.
    #[must_use]
    pub fn ids(&self) -> Vec<ActionId> {
        self.actions.iter().map(PendingAction::id).collect()
    }

    /// Returns the number of actions in the group.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Always false: a group holds at least one action.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Ordered batch groups of one flush.
///
/// For every dependency edge `A → B`, A's group comes before B's group, or
/// both are in the same group with A first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    groups: Vec<BatchGroup>,
}

impl ExecutionPlan {
    /// The batch groups, in execution order.
    #[inline]
    #[must_use]
    pub fn groups(&self) -> &[BatchGroup] {
        &self.groups
    }

    /// Returns the number of batch groups.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if the plan has no group.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns the number of actions across all groups.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.groups.iter().map(BatchGroup::len).sum()
    }

    /// All action identifiers in execution order.
    #[must_use]
    pub fn order(&self) -> Vec<ActionId> {
        self.groups.iter().flat_map(BatchGroup::ids).collect()
    }

    /// Index of the group holding `id`, if any.
    #[must_use]
    pub fn group_of(&self, id: ActionId) -> Option<usize> {
        self.groups
            .iter()
            .position(|group| group.actions.iter().any(|action| action.id() == id))
    }

    /// Consumes the plan and returns its groups.
    #[must_use]
    pub fn into_groups(self) -> Vec<BatchGroup> {
        self.groups
    }
}

/// Orders `actions` along `graph` and groups them into batches.
///
/// `actions` must be the list `graph` was built from, in program order.
/// Scheduling never fails: cycles are rejected when the graph is built.
/// Identical input always yields an identical plan.
#[must_use]
pub fn schedule(
    graph: &DependencyGraph,
    actions: Vec<PendingAction>,
    config: &BatchConfig,
) -> ExecutionPlan {
    debug_assert_eq!(graph.len(), actions.len(), "graph built from other actions");

    let in_program_order = actions
        .iter()
        .all(|action| config.keeps_program_order(action.kind()));
    let order = if in_program_order {
        (0..actions.len()).collect()
    } else {
        topological_order(graph, &actions, config)
    };

    let mut slots: Vec<Option<PendingAction>> = actions.into_iter().map(Some).collect();
    let mut groups: Vec<BatchGroup> = Vec::new();
    let max_batch_size = config.max_batch_size();

    for pos in order {
        let Some(action) = slots[pos].take() else {
            continue;
        };
        match groups.last_mut() {
            Some(group) if group.sql == action.sql() && group.len() < max_batch_size => {
                group.actions.push(action);
            }
            _ => groups.push(BatchGroup::open(action)),
        }
    }

    tracing::debug!(
        actions = graph.len(),
        edges = graph.edges().len(),
        groups = groups.len(),
        "scheduled flush"
    );

    ExecutionPlan { groups }
}

/// Kahn's algorithm with program order and shape affinity as tie-breaks.
fn topological_order(
    graph: &DependencyGraph,
    actions: &[PendingAction],
    config: &BatchConfig,
) -> Vec<usize> {
    let n = actions.len();

    // Intern statement shapes so ready sets can be kept per shape.
    let mut shapes: IndexMap<&str, ActionKind> = IndexMap::default();
    let shape_of: Vec<usize> = actions
        .iter()
        .map(|action| shapes.insert_full(action.sql(), action.kind()).0)
        .collect();

    let mut in_degree = graph.in_degrees().to_vec();
    let mut ready: BTreeSet<usize> = BTreeSet::new();
    let mut ready_by_shape: Vec<BTreeSet<usize>> = alloc::vec![BTreeSet::new(); shapes.len()];
    for (pos, &degree) in in_degree.iter().enumerate() {
        if degree == 0 {
            ready.insert(pos);
            ready_by_shape[shape_of[pos]].insert(pos);
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut last_shape: Option<usize> = None;

    while let Some(&lowest) = ready.first() {
        let pos = last_shape
            .filter(|&shape| config.reorders(shapes[shape]))
            .and_then(|shape| ready_by_shape[shape].first().copied())
            .unwrap_or(lowest);

        ready.remove(&pos);
        ready_by_shape[shape_of[pos]].remove(&pos);
        order.push(pos);
        last_shape = Some(shape_of[pos]);

        for &next in graph.successors(pos) {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
                ready_by_shape[shape_of[next]].insert(next);
            }
        }
    }

    debug_assert_eq!(order.len(), n, "cycle survived graph construction");
    debug_assert!(order.iter().all(|&pos| graph.id_at(pos) == actions[pos].id()));
    order
}
