//! Submodule defining the errors used across the crate.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::value::ActionId;

/// Boxed error produced by a [`StatementExecutor`](crate::StatementExecutor).
pub type ExecutorError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Errors that can occur while collecting, ordering or emitting pending actions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The dependency graph contains a cycle that the ownership side of the
    /// involved associations cannot break, or an action references itself.
    #[error("Cyclic dependency between pending actions {actions:?}")]
    CyclicDependency {
        /// The actions left unordered by the cycle, in program order.
        actions: Vec<ActionId>,
    },
    /// The external executor failed while preparing, batching or executing a statement.
    #[error("Statement execution failed for `{sql}`: {source}")]
    StatementExecution {
        /// The parameterized SQL of the failing statement.
        sql: String,
        /// The executor's error.
        #[source]
        source: ExecutorError,
    },
    /// The batching configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// The column does not belong to the entity mapping.
    #[error("Column `{column}` is not mapped by entity `{entity}`")]
    UnknownColumn {
        /// The entity type name.
        entity: String,
        /// The offending column name.
        column: String,
    },
    /// The referenced action is not part of the current flush cycle.
    #[error("Pending action {0} is not part of this flush")]
    UnknownAction(ActionId),
    /// An update or delete was built without a value for an identifier column.
    #[error("Identifier column `{column}` of entity `{entity}` has no value")]
    MissingIdentifier {
        /// The entity type name.
        entity: String,
        /// The identifier column lacking a value.
        column: String,
    },
    /// An update was built without assigning any non-identifier column.
    #[error("Update of entity `{entity}` assigns no column")]
    EmptyUpdate {
        /// The entity type name.
        entity: String,
    },
    /// The entity mapping descriptor is malformed.
    #[error("Invalid mapping for entity `{entity}`: {reason}")]
    InvalidMapping {
        /// The entity type name.
        entity: String,
        /// Why the mapping was rejected.
        reason: String,
    },
    /// A pending reference could not be resolved to a written identifier.
    #[error("Pending action {0} has no resolvable identifier at emission time")]
    UnresolvedReference(ActionId),
    /// The executor returned a row count vector whose length differs from the batch size.
    #[error("Batch for `{sql}` held {expected} statements but reported {got} row counts")]
    BatchRowCountMismatch {
        /// The parameterized SQL of the batch.
        sql: String,
        /// The number of statements added to the batch.
        expected: usize,
        /// The number of row counts returned.
        got: usize,
    },
    /// A previous flush failed; the unit-of-work must be rolled back first.
    #[error("The unit-of-work is marked for rollback after a failed flush")]
    MarkedForRollback,
}
