//! Submodule defining a builder for a delete operation.

use crate::{
    EntityMapping,
    builders::Row,
    errors::Error,
    value::{ActionId, Value},
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Builder for a delete operation.
///
/// The statement binds the identifier columns only. Other columns may still
/// be set: a [`Value::Pending`] foreign key on a deleted row tells the graph
/// builder that this row must be deleted before the row it references.
pub struct Delete<'a> {
    row: Row<'a>,
}

impl<'a> From<&'a EntityMapping> for Delete<'a> {
    #[inline]
    fn from(mapping: &'a EntityMapping) -> Self {
        Self {
            row: Row::new(mapping),
        }
    }
}

impl AsRef<EntityMapping> for Delete<'_> {
    #[inline]
    fn as_ref(&self) -> &EntityMapping {
        self.row.mapping
    }
}

impl<'a> Delete<'a> {
    pub(crate) fn into_row(self) -> Row<'a> {
        self.row
    }

    /// Sets the value for a column of the deleted row.
    ///
    /// # Errors
    ///
    /// * `UnknownColumn` - If the column is not part of the entity mapping.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Result<Self, Error> {
        self.row.set(column, value.into())?;
        Ok(self)
    }

    /// Records an explicit ordering reference to `action`.
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
