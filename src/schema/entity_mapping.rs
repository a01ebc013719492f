//! Precomputed mapping descriptor of one entity type.
//!
//! This module provides [`EntityMapping`], the only entity metadata the
//! batching engine ever sees: the table an entity type is persisted to, its
//! columns in schema order, and the identifier columns used in the `where`
//! clause of updates and deletes.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::errors::Error;

/// Mapping of an entity type onto a table.
///
/// # Example
///
/// ```rust
/// use dml_batcher::EntityMapping;
///
/// let person = EntityMapping::new("Person", "Person", &["address_ID", "ID"], &["ID"]).unwrap();
/// assert_eq!(person.table_name(), "Person");
/// assert_eq!(person.column_index("ID"), Some(1));
/// assert_eq!(person.id_indices(), &[1]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityMapping {
    /// The entity type name.
    entity: String,
    /// The table the entity is persisted to.
    table: String,
    /// Column names in schema order.
    columns: Vec<String>,
    /// Indices of the identifier columns, in identifier order.
    id_indices: Vec<usize>,
}

impl EntityMapping {
    /// Create a new mapping descriptor.
    ///
    /// # Arguments
    ///
    /// * `entity` - The entity type name.
    /// * `table` - The table name.
    /// * `columns` - The column names in schema order.
    /// * `id_columns` - The identifier column names, in identifier order.
    ///
    /// # Errors
    ///
    /// * `InvalidMapping` - If the mapping has no columns, repeats a column,
    ///   has no identifier column, or names an identifier column that is not
    ///   part of `columns`.
    pub fn new(
        entity: impl Into<String>,
        table: impl Into<String>,
        columns: &[&str],
        id_columns: &[&str],
    ) -> Result<Self, Error> {
        let entity = entity.into();
        let invalid = |reason: &str| Error::InvalidMapping {
            entity: entity.clone(),
            reason: reason.to_string(),
        };

        if columns.is_empty() {
            return Err(invalid("no columns"));
        }
        if id_columns.is_empty() {
            return Err(invalid("no identifier column"));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(invalid("duplicate column"));
            }
        }

        let id_indices = id_columns
            .iter()
            .map(|id| {
                columns
                    .iter()
                    .position(|c| c == id)
                    .ok_or_else(|| invalid("identifier column is not mapped"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            table: table.into(),
            columns: columns.iter().map(ToString::to_string).collect(),
            id_indices,
            entity,
        })
    }

    /// The entity type name.
    #[inline]
    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity
    }

    /// The table name.
    #[inline]
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// The column names in schema order.
    #[inline]
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// The number of mapped columns.
    #[inline]
    #[must_use]
    pub fn number_of_columns(&self) -> usize {
        self.columns.len()
    }

    /// Get the column index by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Get a column name by index.
    #[must_use]
    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    /// Indices of the identifier columns, in identifier order.
    #[inline]
    #[must_use]
    pub fn id_indices(&self) -> &[usize] {
        &self.id_indices
    }

    /// Whether the column at `index` is an identifier column.
    #[inline]
    #[must_use]
    pub fn is_id_column(&self, index: usize) -> bool {
        self.id_indices.contains(&index)
    }
}
