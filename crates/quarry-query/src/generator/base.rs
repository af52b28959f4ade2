//! Dialect-neutral clause steps.
//!
//! These are the default bodies of the [`Generator`] steps. They render
//! ANSI-style SQL with `?` placeholders and, for statements touching several
//! tables, the `UPDATE a INNER JOIN b ... SET` / `DELETE a FROM a INNER JOIN
//! b` forms.

use crate::{
    condition::{Comparison, Condition, Node, Operand, Operator},
    error::Result,
    generator::{Generator, Writer},
    query::{Order, Query, StatementKind},
    selection::Selection,
    table::TableRef,
};

pub fn with_clause<G: Generator + ?Sized>(g: &G, w: &mut Writer<'_>, query: &Query) -> Result<()> {
    if query.ctes().is_empty() {
        return Ok(());
    }
    w.clause("WITH ");
    for (i, cte) in query.ctes().iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        if let Some(table) = query.table(cte.table) {
            g.write_identifier(w, table.entity().table());
        }
        w.push(" AS (");
        g.write_query(w, &cte.query)?;
        w.push(")");
    }
    Ok(())
}

pub fn select_clause<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
) -> Result<()> {
    if query.kind() != StatementKind::Select {
        return Ok(());
    }
    w.clause("SELECT ");
    match query.selection() {
        Selection::Count => w.push("COUNT(*)"),
        Selection::Single(expr) => g.write_expr(w, query, expr, None)?,
        Selection::Named(entries) => {
            for (i, (label, expr)) in entries.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                g.write_expr(w, query, expr, None)?;
                w.push(" AS ");
                g.write_identifier(w, label);
            }
        }
    }
    Ok(())
}

pub fn insert_clause<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
) -> Result<()> {
    let (Some(insert), Some(table)) = (query.insert(), query.tables().first()) else {
        return Ok(());
    };
    w.clause("INSERT INTO ");
    g.write_table_name(w, table);
    w.push(" (");
    let handle = table.handle();
    for (i, &index) in insert.columns.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        g.write_identifier(w, table.entity().fields()[index].column());
    }
    w.push(") VALUES ");
    for (r, row) in insert.rows.iter().enumerate() {
        if r > 0 {
            w.push(", ");
        }
        w.push("(");
        for (i, (expr, &index)) in row.iter().zip(&insert.columns).enumerate() {
            if i > 0 {
                w.push(", ");
            }
            let column = handle.column(index);
            g.write_expr(w, query, expr, Some(&column))?;
        }
        w.push(")");
    }
    Ok(())
}

/// `UPDATE root [JOIN ...]`
pub fn update_clause<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
) -> Result<()> {
    let Some(root) = root_of(query, StatementKind::Update) else {
        return Ok(());
    };
    w.clause("UPDATE ");
    g.write_table(w, root);
    joins(g, w, query)
}

/// `DELETE` for a lone table, `DELETE a, b` when joins are involved.
pub fn delete_clause<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
) -> Result<()> {
    if query.kind() != StatementKind::Delete {
        return Ok(());
    }
    if query.tables().len() == 1 {
        w.clause("DELETE");
        return Ok(());
    }
    w.clause("DELETE ");
    for (i, id) in query.deletes().iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        if let Some(table) = query.table(*id) {
            g.write_identifier(w, table.alias());
        }
    }
    Ok(())
}

/// `FROM root [JOIN ...]` for `SELECT` and `DELETE`.
pub fn from_clause<G: Generator + ?Sized>(g: &G, w: &mut Writer<'_>, query: &Query) -> Result<()> {
    if !matches!(query.kind(), StatementKind::Select | StatementKind::Delete) {
        return Ok(());
    }
    let Some(root) = query.tables().first() else {
        return Ok(());
    };
    w.clause("FROM ");
    g.write_table(w, root);
    joins(g, w, query)
}

/// ` INNER JOIN t ON ...` for every table after the root.
pub fn joins<G: Generator + ?Sized>(g: &G, w: &mut Writer<'_>, query: &Query) -> Result<()> {
    for table in query.tables().iter().skip(1) {
        w.push(" ");
        w.push(table.join_kind().sql());
        w.push(" ");
        g.write_table(w, table);
        w.push(" ON ");
        for (i, comparison) in table.joins().iter().enumerate() {
            if i > 0 {
                w.push(" AND ");
            }
            g.write_comparison(w, query, comparison)?;
        }
    }
    Ok(())
}

/// `SET column = value, ...`; columns are qualified when `qualified` is set.
pub fn set_clause<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
    qualified: bool,
) -> Result<()> {
    if query.assignments().is_empty() {
        return Ok(());
    }
    w.clause("SET ");
    for (i, assignment) in query.assignments().iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        g.write_column(w, query, &assignment.column, qualified)?;
        w.push(" = ");
        g.write_expr(w, query, &assignment.value, Some(&assignment.column))?;
    }
    Ok(())
}

/// `WHERE <condition>`; nothing when `condition` is empty.
pub fn where_clause<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
    condition: &Node,
) -> Result<()> {
    if condition.is_empty() {
        return Ok(());
    }
    w.clause("WHERE ");
    g.write_condition(w, query, condition, false)
}

pub fn order_by_clause<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
) -> Result<()> {
    if query.sort().is_empty() {
        return Ok(());
    }
    w.clause("ORDER BY ");
    for (i, key) in query.sort().iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        g.write_expr(w, query, &key.expr, None)?;
        if key.order == Order::Desc {
            w.push(" DESC");
        }
    }
    Ok(())
}

/// `LIMIT n` and `OFFSET m`, inlined.
pub fn limit_clause<G: Generator + ?Sized>(
    _g: &G,
    w: &mut Writer<'_>,
    query: &Query,
) -> Result<()> {
    if let Some(limit) = query.limit() {
        w.clause(&format!("LIMIT {limit}"));
    }
    if let Some(offset) = query.offset() {
        w.clause(&format!("OFFSET {offset}"));
    }
    Ok(())
}

/// `left <op> right`. Empty `IN` lists render as constant predicates.
pub fn comparison<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
    comparison: &Comparison,
) -> Result<()> {
    let operator = comparison.operator();
    let target = operator
        .validates_operand()
        .then_some(comparison.left());

    match comparison.right() {
        Operand::List(list) if list.is_empty() => {
            w.push(if operator == Operator::NotIn {
                "1 = 1"
            } else {
                "1 = 0"
            });
        }
        Operand::List(list) => {
            g.write_column(w, query, comparison.left(), true)?;
            w.push(" ");
            w.push(operator.sql());
            w.push(" (");
            for (i, expr) in list.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                g.write_expr(w, query, expr, target)?;
            }
            w.push(")");
        }
        Operand::Expr(expr) => {
            g.write_column(w, query, comparison.left(), true)?;
            w.push(" ");
            w.push(operator.sql());
            w.push(" ");
            g.write_expr(w, query, expr, target)?;
        }
        Operand::None => {
            g.write_column(w, query, comparison.left(), true)?;
            w.push(" ");
            w.push(operator.sql());
        }
    }
    Ok(())
}

/// The root table when `query` is a statement of `kind`.
pub(crate) fn root_of(query: &Query, kind: StatementKind) -> Option<&TableRef> {
    if query.kind() == kind {
        query.tables().first()
    } else {
        None
    }
}

/// Join conditions of every non-root table followed by `condition`, as one
/// conjunction. Used by dialects that list joined tables in `FROM`/`USING`
/// and filter on the join conditions instead.
pub(crate) fn restated_joins(query: &Query) -> Node {
    let joins = query
        .tables()
        .iter()
        .skip(1)
        .flat_map(|table| table.joins().iter().cloned())
        .map(Condition::compare);
    Condition::all(joins.chain(std::iter::once(query.condition().clone()))).0
}
