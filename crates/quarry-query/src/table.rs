//! Query-scoped table references.

use std::{collections::BTreeSet, sync::Arc};

use quarry_schema::{EntityDescriptor, FieldDescriptor};

use crate::{
    condition::Comparison,
    error::{QueryError, Result},
    expr::ColumnRef,
};

/// Position of a table in its query, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub(crate) usize);

impl TableId {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// Handle to a table registered in a query builder.
///
/// Cheap to clone; columns are reached through [`Table::col`].
#[derive(Debug, Clone)]
pub struct Table {
    pub(crate) id: TableId,
    pub(crate) entity: Arc<EntityDescriptor>,
}

impl Table {
    pub const fn id(&self) -> TableId {
        self.id
    }

    pub fn entity(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    pub fn col(&self, property: &str) -> Result<ColumnRef> {
        let index = self
            .entity
            .field_index(property)
            .ok_or_else(|| QueryError::UnknownProperty {
                entity: self.entity.name().to_string(),
                property: property.to_string(),
            })?;
        Ok(self.column(index))
    }

    /// The primary key column.
    pub fn key(&self) -> ColumnRef {
        self.column(self.entity.primary_key_index())
    }

    pub(crate) fn column(&self, index: usize) -> ColumnRef {
        ColumnRef {
            table: self.id,
            entity: Arc::clone(&self.entity),
            index,
        }
    }
}

/// A table as it participates in one query.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub(crate) id: TableId,
    pub(crate) entity: Arc<EntityDescriptor>,
    pub(crate) alias: String,
    pub(crate) role: String,
    pub(crate) used: BTreeSet<usize>,
    pub(crate) joins: Vec<Comparison>,
    pub(crate) kind: JoinKind,
    pub(crate) cte: bool,
}

impl TableRef {
    pub const fn id(&self) -> TableId {
        self.id
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Registration role; empty for the default role.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Fields referenced anywhere in the query, in declaration order.
    pub fn used(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.used.iter().map(|&i| &self.entity.fields()[i])
    }

    /// Conditions attaching this table to earlier ones; empty for the root.
    pub fn joins(&self) -> &[Comparison] {
        &self.joins
    }

    pub const fn join_kind(&self) -> JoinKind {
        self.kind
    }

    /// Whether this table names a `WITH` subquery rather than a stored table.
    pub const fn is_cte(&self) -> bool {
        self.cte
    }

    pub(crate) fn handle(&self) -> Table {
        Table {
            id: self.id,
            entity: Arc::clone(&self.entity),
        }
    }
}
