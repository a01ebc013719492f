//! Submodule defining a builder for an update operation.

use crate::{
    EntityMapping,
    builders::Row,
    errors::Error,
    value::{ActionId, Value},
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Builder for an update operation.
///
/// Only the assigned columns appear in the `set` clause, so updates of the
/// same entity that assign different columns have different statement shapes
/// and never share a batch. Identifier columns go to the `where` clause.
pub struct Update<'a> {
    row: Row<'a>,
}

impl<'a> From<&'a EntityMapping> for Update<'a> {
    #[inline]
    fn from(mapping: &'a EntityMapping) -> Self {
        Self {
            row: Row::new(mapping),
        }
    }
}

impl AsRef<EntityMapping> for Update<'_> {
    #[inline]
    fn as_ref(&self) -> &EntityMapping {
        self.row.mapping
    }
}

impl<'a> Update<'a> {
    pub(crate) fn into_row(self) -> Row<'a> {
        self.row
    }

    /// Assigns a column, or sets the identifier value when `column` is an
    /// identifier column.
    ///
    /// # Errors
    ///
    /// * `UnknownColumn` - If the column is not part of the entity mapping.
    ///
    /// # Example
    ///
    /// ```
    /// use dml_batcher::{ActionQueue, EntityMapping, Update};
    ///
    /// let person = EntityMapping::new("Person", "Person", &["ID", "name"], &["ID"]).unwrap();
    /// let mut queue = ActionQueue::new();
    /// queue
    ///     .enqueue(Update::from(&person).set("ID", 1i64).unwrap().set("name", "Ada").unwrap())
    ///     .unwrap();
    /// let action = &queue.drain_for_flush()[0];
    /// assert_eq!(action.sql(), "update Person set name=? where ID=?");
    /// ```
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Result<Self, Error> {
        self.row.set(column, value.into())?;
        Ok(self)
    }

    /// Records that `action` must be written before this update.
    #[must_use]
    pub fn depends_on(mut self, action: ActionId) -> Self {
        self.row.depends_on.insert(action);
        self
    }

    /// Records an inverse-side (`mappedBy`) reference to `action`.
    #[must_use]
    pub fn mapped_by(mut self, action: ActionId) -> Self {
        self.row.inverse_of.insert(action);
        self
    }
}
