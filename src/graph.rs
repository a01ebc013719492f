//! Dependency graph between the pending actions of one flush.
//!
//! An edge `A → B` means A's statement must execute before B's. Edges come
//! from owning-side references only:
//!
//! | Referencing action | Referenced action | Edge |
//! |--------------------|-------------------|------|
//! | any | any, not both deletes | referenced → referencing |
//! | delete | delete | referencing → referenced |
//!
//! Inverse-side (`mappedBy`) references never produce an edge, which is how
//! a bidirectional one-to-one or many-to-many pair avoids a logical cycle:
//! the owning side alone decides which row is written first.

use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::{
    builders::{ActionKind, PendingAction},
    errors::Error,
    value::ActionId,
};

/// A derived ordering constraint between two pending actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyEdge {
    /// The action that runs first.
    pub before: ActionId,
    /// The action that runs after `before`.
    pub after: ActionId,
}

/// Directed acyclic graph over the actions of one flush.
///
/// Nodes are addressed by their position in the action list the graph was
/// built from, which is program order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Action identifiers by position.
    ids: Vec<ActionId>,
    /// Position of each action identifier.
    positions: HashMap<ActionId, usize>,
    /// For each position, the positions that must run after it (ascending).
    successors: Vec<Vec<usize>>,
    /// For each position, the number of positions that must run before it.
    in_degree: Vec<usize>,
    /// All edges, sorted by (before, after) position.
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Links the actions of a flush into a dependency graph.
    ///
    /// `actions` must be in program order, as returned by
    /// [`ActionQueue::drain_for_flush`](crate::ActionQueue::drain_for_flush).
    ///
    /// # Errors
    ///
    /// * `CyclicDependency` - If an action references itself, or owning-side
    ///   references form a cycle. The error lists the actions caught in the
    ///   cycle (or the self-referencing action) in program order.
    /// * `UnknownAction` - If an owning-side reference points to an action
    ///   that is not part of `actions`.
    pub fn build(actions: &[PendingAction]) -> Result<Self, Error> {
        let positions: HashMap<ActionId, usize> = actions
            .iter()
            .enumerate()
            .map(|(pos, action)| (action.id(), pos))
            .collect();

        let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (pos, action) in actions.iter().enumerate() {
            for target in action.owning_references() {
                if target == action.id() {
                    return Err(Error::CyclicDependency {
                        actions: vec![target],
                    });
                }
                let target_pos = *positions.get(&target).ok_or(Error::UnknownAction(target))?;
                let both_deletes = action.kind() == ActionKind::Delete
                    && actions[target_pos].kind() == ActionKind::Delete;
                if both_deletes {
                    pairs.insert((pos, target_pos));
                } else {
                    pairs.insert((target_pos, pos));
                }
            }
            for inverse in action.inverse_of() {
                if !positions.contains_key(inverse) {
                    tracing::trace!(
                        action = %action.id(),
                        inverse = %inverse,
                        "inverse-side reference outside of this flush"
                    );
                }
            }
        }

        let mut successors = vec![Vec::new(); actions.len()];
        let mut in_degree = vec![0usize; actions.len()];
        let mut edges = Vec::with_capacity(pairs.len());
        for (before, after) in pairs {
            successors[before].push(after);
            in_degree[after] += 1;
            edges.push(DependencyEdge {
                before: actions[before].id(),
                after: actions[after].id(),
            });
        }

        let graph = Self {
            ids: actions.iter().map(PendingAction::id).collect(),
            positions,
            successors,
            in_degree,
            edges,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Runs Kahn's algorithm once; positions never released are on a cycle
    /// or downstream of one.
    fn check_acyclic(&self) -> Result<(), Error> {
        let mut in_degree = self.in_degree.clone();
        let mut ready: Vec<usize> = (0..self.len()).filter(|&pos| in_degree[pos] == 0).collect();
        let mut released = vec![false; self.len()];
        let mut count = 0;

        while let Some(pos) = ready.pop() {
            released[pos] = true;
            count += 1;
            for &next in &self.successors[pos] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(next);
                }
            }
        }

        if count == self.len() {
            return Ok(());
        }

        let actions: Vec<ActionId> = (0..self.len())
            .filter(|&pos| !released[pos])
            .map(|pos| self.ids[pos])
            .collect();
        tracing::warn!(?actions, "dependency cycle between pending actions");
        Err(Error::CyclicDependency { actions })
    }

    /// Returns the number of actions in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the graph holds no action.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All edges, ordered by the program order of `before`, then of `after`.
    #[must_use]
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// The actions that must run before `id`, in program order.
    #[must_use]
    pub fn dependencies_of(&self, id: ActionId) -> Vec<ActionId> {
        let Some(&pos) = self.positions.get(&id) else {
            return Vec::new();
        };
        let mut deps: Vec<ActionId> = self
            .edges
            .iter()
            .filter(|edge| edge.after == self.ids[pos])
            .map(|edge| edge.before)
            .collect();
        deps.sort_by_key(|dep| self.positions[dep]);
        deps
    }

    /// The actions that must run after `id`, in program order.
    #[must_use]
    pub fn dependents_of(&self, id: ActionId) -> Vec<ActionId> {
        self.positions
            .get(&id)
            .map(|&pos| self.successors[pos].iter().map(|&next| self.ids[next]).collect())
            .unwrap_or_default()
    }

    /// Action identifier at `pos`.
    pub(crate) fn id_at(&self, pos: usize) -> ActionId {
        self.ids[pos]
    }

    /// Positions that must run after `pos`.
    pub(crate) fn successors(&self, pos: usize) -> &[usize] {
        &self.successors[pos]
    }

    /// Number of positions that must run before each position.
    pub(crate) fn in_degrees(&self) -> &[usize] {
        &self.in_degree
    }
}
