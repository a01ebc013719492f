//! Enumeration of write operations (insert, update, delete) and the pending
//! action they become once enqueued.

use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use indexmap::IndexMap as IndexMapRaw;

use crate::{
    EntityMapping,
    builders::{Delete, Insert, Update},
    errors::Error,
    value::{ActionId, Value},
};

/// `IndexMap` alias using hashbrown's default hasher for `no_std` compatibility.
pub(crate) type IndexMap<K, V> = IndexMapRaw<K, V, hashbrown::DefaultHashBuilder>;

/// The kind of statement a pending action issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionKind {
    /// A row is inserted.
    Insert,
    /// A row is updated.
    Update,
    /// A row is deleted.
    Delete,
}

/// Column values and association references shared by every builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Row<'a> {
    /// The mapping of the entity being written.
    pub(crate) mapping: &'a EntityMapping,
    /// Values by column index; `None` when the column was never set.
    pub(crate) values: Vec<Option<Value>>,
    /// Owning-side references: these actions run first.
    pub(crate) depends_on: BTreeSet<ActionId>,
    /// Inverse-side (`mappedBy`) references: recorded, never ordered on.
    pub(crate) inverse_of: BTreeSet<ActionId>,
}

impl<'a> Row<'a> {
    pub(crate) fn new(mapping: &'a EntityMapping) -> Self {
        Self {
            mapping,
            values: alloc::vec![None; mapping.number_of_columns()],
            depends_on: BTreeSet::new(),
            inverse_of: BTreeSet::new(),
        }
    }

    pub(crate) fn set(&mut self, column: &str, value: Value) -> Result<(), Error> {
        let col_idx =
            self.mapping
                .column_index(column)
                .ok_or_else(|| Error::UnknownColumn {
                    entity: self.mapping.entity_name().to_string(),
                    column: column.to_string(),
                })?;
        self.values[col_idx] = Some(value);
        Ok(())
    }

    /// Fails when an identifier column has no value.
    fn require_ids(&self) -> Result<(), Error> {
        for &idx in self.mapping.id_indices() {
            if self.values[idx].is_none() {
                return Err(Error::MissingIdentifier {
                    entity: self.mapping.entity_name().to_string(),
                    column: self.mapping.column_names()[idx].clone(),
                });
            }
        }
        Ok(())
    }

    /// Finalizes the row into a pending action whose statement binds
    /// `statement_columns` (column indices, in SQL parameter order).
    fn into_action(
        self,
        id: ActionId,
        kind: ActionKind,
        statement_columns: &[usize],
        sql: String,
    ) -> PendingAction {
        let mapping = self.mapping;
        let names = mapping.column_names();
        let identifier = mapping
            .id_indices()
            .first()
            .and_then(|&idx| self.values[idx].clone());
        let values: IndexMap<String, Value> = self
            .values
            .into_iter()
            .enumerate()
            .filter_map(|(idx, value)| value.map(|v| (names[idx].clone(), v)))
            .collect();

        PendingAction {
            id,
            kind,
            entity: mapping.entity_name().to_string(),
            table: mapping.table_name().to_string(),
            statement_columns: statement_columns.iter().map(|&i| names[i].clone()).collect(),
            sql,
            values,
            identifier,
            depends_on: self.depends_on,
            inverse_of: self.inverse_of,
        }
    }
}

/// A write operation waiting for an identifier from the action queue.
///
/// Any builder converts into an `Operation`, which is what
/// [`ActionQueue::enqueue`](crate::ActionQueue::enqueue) accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation<'a> {
    /// A row insert.
    Insert(Insert<'a>),
    /// A row update.
    Update(Update<'a>),
    /// A row delete.
    Delete(Delete<'a>),
}

impl<'a> From<Insert<'a>> for Operation<'a> {
    fn from(insert: Insert<'a>) -> Self {
        Self::Insert(insert)
    }
}

impl<'a> From<Update<'a>> for Operation<'a> {
    fn from(update: Update<'a>) -> Self {
        Self::Update(update)
    }
}

impl<'a> From<Delete<'a>> for Operation<'a> {
    fn from(delete: Delete<'a>) -> Self {
        Self::Delete(delete)
    }
}

impl Operation<'_> {
    /// The kind of statement this operation issues.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Operation::Insert(_) => ActionKind::Insert,
            Operation::Update(_) => ActionKind::Update,
            Operation::Delete(_) => ActionKind::Delete,
        }
    }

    /// Assigns `id` and freezes the operation into a pending action.
    ///
    /// # Errors
    ///
    /// * `MissingIdentifier` - If an update or delete lacks an identifier value.
    /// * `EmptyUpdate` - If an update assigns no non-identifier column.
    pub(crate) fn into_action(self, id: ActionId) -> Result<PendingAction, Error> {
        match self {
            Operation::Insert(insert) => {
                let row = insert.into_row();
                let columns: Vec<usize> = (0..row.mapping.number_of_columns()).collect();
                let sql = super::sql_output::format_insert(row.mapping, &columns);
                Ok(row.into_action(id, ActionKind::Insert, &columns, sql))
            }
            Operation::Update(update) => {
                let row = update.into_row();
                row.require_ids()?;
                let assigned: Vec<usize> = row
                    .values
                    .iter()
                    .enumerate()
                    .filter(|(idx, value)| value.is_some() && !row.mapping.is_id_column(*idx))
                    .map(|(idx, _)| idx)
                    .collect();
                if assigned.is_empty() {
                    return Err(Error::EmptyUpdate {
                        entity: row.mapping.entity_name().to_string(),
                    });
                }
                let sql = super::sql_output::format_update(row.mapping, &assigned);
                let mut columns = assigned;
                columns.extend_from_slice(row.mapping.id_indices());
                Ok(row.into_action(id, ActionKind::Update, &columns, sql))
            }
            Operation::Delete(delete) => {
                let row = delete.into_row();
                row.require_ids()?;
                let sql = super::sql_output::format_delete(row.mapping);
                let columns = row.mapping.id_indices().to_vec();
                Ok(row.into_action(id, ActionKind::Delete, &columns, sql))
            }
        }
    }
}

/// A write action scheduled by a unit-of-work and waiting for flush.
///
/// The column values and references are a snapshot taken at enqueue time;
/// only dependency annotations may be added afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    id: ActionId,
    kind: ActionKind,
    entity: String,
    table: String,
    /// Parameter columns of `sql`, in parameter order.
    statement_columns: Vec<String>,
    sql: String,
    /// Set columns in schema order.
    values: IndexMap<String, Value>,
    /// Value of the first identifier column, used to resolve references.
    identifier: Option<Value>,
    depends_on: BTreeSet<ActionId>,
    inverse_of: BTreeSet<ActionId>,
}

impl PendingAction {
    /// The identifier assigned at enqueue time.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ActionId {
        self.id
    }

    /// The kind of statement.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// The entity type name.
    #[inline]
    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity
    }

    /// The target table name.
    #[inline]
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// The parameterized SQL text of the action.
    ///
    /// Two actions can share a batch exactly when their SQL text is equal,
    /// which implies equal table, kind and column shape.
    #[inline]
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The columns bound as statement parameters, in parameter order.
    #[inline]
    #[must_use]
    pub fn statement_columns(&self) -> &[String] {
        &self.statement_columns
    }

    /// Returns the value set for `column`, if any.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Iterates over the set columns in schema order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The value written to the first identifier column.
    #[inline]
    #[must_use]
    pub fn identifier(&self) -> Option<&Value> {
        self.identifier.as_ref()
    }

    /// Explicit owning-side dependencies.
    #[inline]
    #[must_use]
    pub fn depends_on(&self) -> &BTreeSet<ActionId> {
        &self.depends_on
    }

    /// Inverse-side (`mappedBy`) references.
    #[inline]
    #[must_use]
    pub fn inverse_of(&self) -> &BTreeSet<ActionId> {
        &self.inverse_of
    }

    /// All owning-side references: pending column values and explicit
    /// dependencies, in ascending order without duplicates.
    #[must_use]
    pub fn owning_references(&self) -> BTreeSet<ActionId> {
        let mut refs = self.depends_on.clone();
        refs.extend(self.values.values().filter_map(Value::pending));
        refs
    }

    /// The statement parameters, in parameter order.
    pub(crate) fn parameters(&self) -> impl Iterator<Item = &Value> {
        self.statement_columns
            .iter()
            .map(|column| self.values.get(column).unwrap_or(&Value::Null))
    }

    pub(crate) fn add_dependency(&mut self, on: ActionId) {
        self.depends_on.insert(on);
    }
}
