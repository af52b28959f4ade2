//! Flat column listings for schema export tooling.

use serde::Serialize;

use crate::{entity::EntityDescriptor, kind::Dialect};

/// One stored column as seen by a `dialect` database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub column: String,
    pub datatype: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub foreign_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_table: Option<String>,
}

impl EntityDescriptor {
    /// Lists the stored columns in declaration order.
    pub fn columns(&self, dialect: Dialect) -> Vec<ColumnInfo> {
        self.fields
            .iter()
            .map(|field| ColumnInfo {
                column: field.column.clone(),
                datatype: field.datatype(dialect),
                nullable: field.nullable,
                primary_key: field.primary_key,
                foreign_key: field.foreign.is_some(),
                foreign_table: field.foreign.as_ref().map(|fk| fk.table.clone()),
            })
            .collect()
    }
}
