//! Submodule defining a builder for an insert operation.

use crate::{
    EntityMapping,
    builders::Row,
    errors::Error,
    value::{ActionId, Value},
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Builder for an insert operation.
///
/// Inserts always bind every mapped column; columns that are never set are
/// bound as NULL, so all inserts built from the same mapping share one
/// statement shape.
pub struct Insert<'a> {
    row: Row<'a>,
}

impl<'a> From<&'a EntityMapping> for Insert<'a> {
    #[inline]
    fn from(mapping: &'a EntityMapping) -> Self {
        Self {
            row: Row::new(mapping),
        }
    }
}

impl AsRef<EntityMapping> for Insert<'_> {
    #[inline]
    fn as_ref(&self) -> &EntityMapping {
        self.row.mapping
    }
}

impl<'a> Insert<'a> {
    pub(crate) fn into_row(self) -> Row<'a> {
        self.row
    }

    /// Sets the value for a column.
    ///
    /// A [`Value::Pending`] value (any [`ActionId`] converts into one) marks
    /// the column as a foreign key to a row that is not written yet: the
    /// referenced action will be emitted before this one.
    ///
    /// # Arguments
    ///
    /// * `column` - The name of the column to set.
    /// * `value` - The value to set for the column.
    ///
    /// # Errors
    ///
    /// * `UnknownColumn` - If the column is not part of the entity mapping.
    ///
    /// # Example
    ///
    /// ```
    /// use dml_batcher::{ActionQueue, EntityMapping, Insert};
    ///
    /// let address = EntityMapping::new("Address", "Address", &["ID"], &["ID"]).unwrap();
    /// let person = EntityMapping::new("Person", "Person", &["address_ID", "ID"], &["ID"]).unwrap();
    ///
    /// let mut queue = ActionQueue::new();
    /// let home = queue.enqueue(Insert::from(&address).set("ID", 1i64).unwrap()).unwrap();
    /// let insert = Insert::from(&person)
    ///     .set("address_ID", home).unwrap()
    ///     .set("ID", 2i64).unwrap();
    /// queue.enqueue(insert).unwrap();
    /// ```
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Result<Self, Error> {
        self.row.set(column, value.into())?;
        Ok(self)
    }

    /// Sets a column to NULL.
    ///
    /// This is a convenience method equivalent to `.set(column, Value::Null)`.
    ///
    /// # Errors
    ///
    /// * `UnknownColumn` - If the column is not part of the entity mapping.
    pub fn set_null(self, column: &str) -> Result<Self, Error> {
        self.set(column, Value::Null)
    }

    /// Records that `action` must be written before this row, without a
    /// foreign-key column carrying the reference (cascades, join rows).
    #[must_use]
    pub fn depends_on(mut self, action: ActionId) -> Self {
        self.row.depends_on.insert(action);
        self
    }

    /// Records that this row is the inverse (`mappedBy`) side of a
    /// bidirectional association with `action`.
    ///
    /// The reference is kept for inspection but never orders the two rows:
    /// the owning side alone decides which one is written first.
    #[must_use]
    pub fn mapped_by(mut self, action: ActionId) -> Self {
        self.row.inverse_of.insert(action);
        self
    }
}
