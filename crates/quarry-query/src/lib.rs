//! Query construction and SQL generation over quarry entities.
//!
//! Queries are built by a callback that registers tables, follows
//! relationships and adds conditions against a [`QueryContext`]. The
//! finished [`Query`] is rendered by a [`Generator`] for a particular SQL
//! dialect, either once into a [`Statement`] or repeatedly through a
//! [`Template`].

pub mod condition;
pub mod context;
pub mod driver;
pub mod error;
pub mod expr;
pub mod generator;
pub mod query;
pub mod selection;
pub mod statement;
pub mod table;
pub mod template;

pub use condition::{Comparison, Condition, Node, Operand, Operator};
pub use context::QueryContext;
pub use driver::{Driver, DriverError};
pub use error::{QueryError, Result};
pub use expr::{Aggregate, ColumnRef, Expr, Param};
pub use generator::{
    for_dialect, GenericGenerator, Generator, MySqlGenerator, PostgresGenerator, Rendered,
    SqliteGenerator,
};
pub use query::{Order, Query, StatementKind};
pub use selection::Selection;
pub use statement::Statement;
pub use table::{JoinKind, Table, TableId, TableRef};
pub use template::Template;

#[cfg(test)]
pub(crate) mod fixtures;
