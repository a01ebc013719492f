//! Buffer of pending actions collected during a unit-of-work.
//!
//! The queue never reorders: the order in which actions are enqueued is the
//! program order that the scheduler later uses as its tie-break.

use alloc::vec::Vec;

use crate::{
    builders::{Operation, PendingAction},
    errors::Error,
    value::ActionId,
};

/// Ordered buffer of pending actions awaiting flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionQueue {
    /// Queued actions in program order.
    actions: Vec<PendingAction>,
    /// The next identifier to hand out.
    next_id: u64,
}

impl ActionQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation, assigning it the next action identifier.
    ///
    /// Identifiers keep increasing across flushes, so an identifier is never
    /// reused within the lifetime of the queue.
    ///
    /// # Errors
    ///
    /// * `MissingIdentifier` - If an update or delete lacks an identifier value.
    /// * `EmptyUpdate` - If an update assigns no non-identifier column.
    pub fn enqueue<'a>(&mut self, operation: impl Into<Operation<'a>>) -> Result<ActionId, Error> {
        let id = ActionId::new(self.next_id);
        let action = operation.into().into_action(id)?;
        self.next_id += 1;
        self.actions.push(action);
        Ok(id)
    }

    /// Records that `action` must run after `on`.
    ///
    /// Dependency annotations are the only change allowed on a queued action.
    /// `on` is not checked here: dangling or self references are reported
    /// when the dependency graph is built.
    ///
    /// # Errors
    ///
    /// * `UnknownAction` - If `action` is not queued.
    pub fn add_dependency(&mut self, action: ActionId, on: ActionId) -> Result<(), Error> {
        let pending = self
            .actions
            .iter_mut()
            .find(|pending| pending.id() == action)
            .ok_or(Error::UnknownAction(action))?;
        pending.add_dependency(on);
        Ok(())
    }

    /// Returns the queued action with the given identifier.
    #[must_use]
    pub fn get(&self, id: ActionId) -> Option<&PendingAction> {
        self.actions.iter().find(|pending| pending.id() == id)
    }

    /// Returns all queued actions in program order and empties the queue.
    ///
    /// A second drain without intervening enqueues returns nothing.
    pub fn drain_for_flush(&mut self) -> Vec<PendingAction> {
        core::mem::take(&mut self.actions)
    }

    /// Discards every queued action.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Returns the number of queued actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if no action is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::{EntityMapping, Insert, Update};

    fn address() -> EntityMapping {
        EntityMapping::new("Address", "Address", &["ID"], &["ID"]).unwrap()
    }

    #[test]
    fn test_enqueue_assigns_monotonic_ids() {
        let mapping = address();
        let mut queue = ActionQueue::new();
        let a = queue.enqueue(Insert::from(&mapping).set("ID", 1i64).unwrap()).unwrap();
        let b = queue.enqueue(Insert::from(&mapping).set("ID", 2i64).unwrap()).unwrap();
        assert!(a < b);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get(b).unwrap().identifier(), Some(&crate::Value::Integer(2)));
    }

    #[test]
    fn test_drain_is_at_most_once() {
        let mapping = address();
        let mut queue = ActionQueue::new();
        let first = queue.enqueue(Insert::from(&mapping).set("ID", 1i64).unwrap()).unwrap();
        let drained = queue.drain_for_flush();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id(), first);
        assert!(queue.drain_for_flush().is_empty());
        assert!(queue.is_empty());

        // Identifiers are not reused after a drain.
        let second = queue.enqueue(Insert::from(&mapping).set("ID", 2i64).unwrap()).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_failed_enqueue_consumes_no_id() {
        let mapping = address();
        let mut queue = ActionQueue::new();
        assert!(queue.enqueue(Update::from(&mapping)).is_err());
        let id = queue.enqueue(Insert::from(&mapping)).unwrap();
        assert_eq!(id, ActionId::new(0));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_add_dependency() {
        let mapping = address();
        let mut queue = ActionQueue::new();
        let a = queue.enqueue(Insert::from(&mapping).set("ID", 1i64).unwrap()).unwrap();
        let b = queue.enqueue(Insert::from(&mapping).set("ID", 2i64).unwrap()).unwrap();
        queue.add_dependency(a, b).unwrap();
        assert_eq!(queue.get(a).unwrap().depends_on().iter().copied().collect::<Vec<_>>(), vec![b]);
        assert!(matches!(
            queue.add_dependency(ActionId::new(99), a),
            Err(Error::UnknownAction(id)) if id == ActionId::new(99)
        ));
    }
}
