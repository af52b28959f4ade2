use quarry_schema::Dialect;

use super::{base, quote_with, Generator, Writer};
use crate::{
    error::{QueryError, Result},
    query::{Query, StatementKind},
    table::{JoinKind, TableId},
};

/// PostgreSQL: always-quoted identifiers, `$n` placeholders, and
/// `UPDATE ... SET ... FROM` / `DELETE ... USING` for joined tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGenerator;

impl Generator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '"')
    }

    fn placeholder(&self, position: usize) -> String {
        format!("${position}")
    }

    fn update_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        update_target(self, w, query)
    }

    fn delete_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        if query.kind() != StatementKind::Delete {
            return Ok(());
        }
        check_single_target(self.dialect(), query, query.deletes(), "DELETE")?;
        w.clause("DELETE FROM ");
        if let Some(root) = query.tables().first() {
            self.write_table(w, root);
        }
        Ok(())
    }

    fn from_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        match query.kind() {
            StatementKind::Delete => secondary_tables(self, w, query, "USING "),
            _ => base::from_clause(self, w, query),
        }
    }

    fn set_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::set_clause(self, w, query, false)?;
        if query.kind() == StatementKind::Update {
            secondary_tables(self, w, query, "FROM ")?;
        }
        Ok(())
    }

    fn where_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        where_with_joins(self, w, query)
    }
}

/// `UPDATE root`, rejecting shapes a single-target `UPDATE ... FROM` cannot
/// express.
pub(super) fn update_target<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
) -> Result<()> {
    let Some(root) = base::root_of(query, StatementKind::Update) else {
        return Ok(());
    };
    check_single_target(g.dialect(), query, &query.update_targets(), "UPDATE")?;
    w.clause("UPDATE ");
    g.write_table(w, root);
    Ok(())
}

/// Lists every non-root table after `keyword`; their join conditions are
/// restated in `WHERE`.
pub(super) fn secondary_tables<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
    keyword: &str,
) -> Result<()> {
    let mut secondary = query.tables().iter().skip(1).peekable();
    if secondary.peek().is_none() {
        return Ok(());
    }
    w.clause(keyword);
    for (i, table) in secondary.enumerate() {
        if i > 0 {
            w.push(", ");
        }
        g.write_table(w, table);
    }
    Ok(())
}

/// `WHERE`, with join conditions folded in for multi-table writes.
pub(super) fn where_with_joins<G: Generator + ?Sized>(
    g: &G,
    w: &mut Writer<'_>,
    query: &Query,
) -> Result<()> {
    let writes = matches!(query.kind(), StatementKind::Update | StatementKind::Delete);
    if writes && query.tables().len() > 1 {
        let condition = base::restated_joins(query);
        base::where_clause(g, w, query, &condition)
    } else {
        base::where_clause(g, w, query, query.condition().node())
    }
}

fn check_single_target(
    dialect: Dialect,
    query: &Query,
    targets: &[TableId],
    statement: &str,
) -> Result<()> {
    if targets.len() > 1 {
        return Err(QueryError::unsupported(
            dialect,
            format!("{statement} of several tables at once"),
        ));
    }
    if targets.first().is_some_and(|id| id.index() != 0) {
        return Err(QueryError::unsupported(
            dialect,
            format!("{statement} of a joined table; register the target first"),
        ));
    }
    if query
        .tables()
        .iter()
        .skip(1)
        .any(|t| t.join_kind() == JoinKind::Left)
    {
        return Err(QueryError::unsupported(
            dialect,
            format!("LEFT JOIN in a multi-table {statement}"),
        ));
    }
    Ok(())
}
