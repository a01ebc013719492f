//! Builders for the pending write actions of a unit-of-work.

mod delete_operation;
mod insert_operation;
mod operation;
mod sql_output;
mod update_operation;

pub use delete_operation::Delete;
pub use insert_operation::Insert;
pub use operation::{ActionKind, Operation, PendingAction};
pub(crate) use operation::{IndexMap, Row};
pub use update_operation::Update;
