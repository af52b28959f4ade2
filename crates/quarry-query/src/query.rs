//! Finished queries.

use quarry_schema::{Registry, Value};
use tracing::debug;

use crate::{
    condition::Condition,
    context::QueryContext,
    driver::Driver,
    error::{QueryError, Result},
    expr::{ColumnRef, Expr, Param},
    generator::{Generator, Rendered},
    selection::Selection,
    statement::Statement,
    table::{TableId, TableRef},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub expr: Expr,
    pub order: Order,
}

/// `column = value` in an `UPDATE`.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Expr,
}

/// Rows of an `INSERT`. `columns` are field indexes of the target entity and
/// every row holds one expression per column.
#[derive(Debug, Clone)]
pub struct Insert {
    pub table: TableId,
    pub columns: Vec<usize>,
    pub rows: Vec<Vec<Expr>>,
}

/// A subquery exposed to the outer query under the name of `table`.
#[derive(Debug, Clone)]
pub struct Cte {
    pub table: TableId,
    pub query: Box<Query>,
}

/// A fully built query.
///
/// Produced by [`Query::build`], which runs a builder callback against a
/// [`QueryContext`] and checks the result. A query is immutable once built
/// and can be rendered any number of times by any generator.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub(crate) tables: Vec<TableRef>,
    pub(crate) condition: Condition,
    pub(crate) selection: Selection,
    pub(crate) assignments: Vec<Assignment>,
    pub(crate) deletes: Vec<TableId>,
    pub(crate) insert: Option<Insert>,
    pub(crate) sort: Vec<SortKey>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) ctes: Vec<Cte>,
    pub(crate) params: Vec<Param>,
}

impl Query {
    /// Runs `build` against a fresh context and returns the checked query.
    ///
    /// ```ignore
    /// let query = Query::build(&registry, |q| {
    ///     let item = q.table(&item);
    ///     let number = item.col("number")?;
    ///     q.filter(number.gt(3))?;
    ///     q.select(number)?;
    ///     q.limit(5);
    ///     Ok(())
    /// })?;
    /// ```
    pub fn build<F>(registry: &Registry, build: F) -> Result<Query>
    where
        F: FnOnce(&mut QueryContext<'_>) -> Result<()>,
    {
        let mut context = QueryContext::new(registry);
        build(&mut context)?;
        context.finish()
    }

    pub fn kind(&self) -> StatementKind {
        if self.insert.is_some() {
            StatementKind::Insert
        } else if !self.assignments.is_empty() {
            StatementKind::Update
        } else if !self.deletes.is_empty() {
            StatementKind::Delete
        } else {
            StatementKind::Select
        }
    }

    pub fn tables(&self) -> &[TableRef] {
        &self.tables
    }

    pub fn table(&self, id: TableId) -> Option<&TableRef> {
        self.tables.get(id.0)
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Tables written by the `UPDATE`, in first-assignment order.
    pub fn update_targets(&self) -> Vec<TableId> {
        let mut targets: Vec<TableId> = Vec::new();
        for assignment in &self.assignments {
            if !targets.contains(&assignment.column.table) {
                targets.push(assignment.column.table);
            }
        }
        targets
    }

    pub fn deletes(&self) -> &[TableId] {
        &self.deletes
    }

    pub fn insert(&self) -> Option<&Insert> {
        self.insert.as_ref()
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    pub const fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub const fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn ctes(&self) -> &[Cte] {
        &self.ctes
    }

    /// Declared template parameters, in declaration order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Renders the query with no parameters bound.
    pub fn render(&self, generator: &dyn Generator, pretty: bool) -> Result<Rendered> {
        generator.render(self, pretty)
    }

    /// Renders a parameterless query into an executable statement.
    pub fn statement(&self, generator: &dyn Generator) -> Result<Statement> {
        self.render(generator, false)?.bind(generator, &[])
    }

    /// Renders, executes and shapes the rows as JSON.
    ///
    /// `SELECT`s are shaped by their selection (see [`Selection`]); other
    /// statements return whatever rows the driver produced as arrays.
    pub async fn fetch<D: Driver>(
        &self,
        driver: &D,
        generator: &dyn Generator,
    ) -> Result<serde_json::Value> {
        let statement = {
            let escape = |name: &str| driver.escape_identifier(name);
            generator
                .render_with(self, false, Some(&escape))?
                .bind(generator, &[])?
        };
        self.run(driver, generator, statement).await
    }

    pub(crate) async fn run<D: Driver>(
        &self,
        driver: &D,
        generator: &dyn Generator,
        statement: Statement,
    ) -> Result<serde_json::Value> {
        debug!(
            dialect = %generator.dialect(),
            params = statement.params().len(),
            "executing query"
        );
        let rows = driver
            .execute(statement.text(), statement.params())
            .await
            .map_err(QueryError::Execution)?;

        Ok(match self.kind() {
            StatementKind::Select => self.selection.shape(generator.dialect(), rows),
            _ => serde_json::Value::Array(
                rows.into_iter()
                    .map(|row| {
                        serde_json::Value::Array(row.into_iter().map(Value::into).collect())
                    })
                    .collect(),
            ),
        })
    }
}
