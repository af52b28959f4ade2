use quarry_schema::Dialect;

use super::{base, postgres, Generator, Writer};
use crate::{
    error::{QueryError, Result},
    query::{Query, StatementKind},
};

/// SQLite 3.33+: `UPDATE ... SET ... FROM` for joined updates; joined
/// deletes are not supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGenerator;

impl Generator for SqliteGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn update_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        postgres::update_target(self, w, query)
    }

    fn delete_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        if query.kind() == StatementKind::Delete && query.tables().len() > 1 {
            return Err(QueryError::unsupported(self.dialect(), "DELETE with joins"));
        }
        base::delete_clause(self, w, query)
    }

    fn set_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::set_clause(self, w, query, false)?;
        if query.kind() == StatementKind::Update {
            postgres::secondary_tables(self, w, query, "FROM ")?;
        }
        Ok(())
    }

    fn where_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        postgres::where_with_joins(self, w, query)
    }

    fn limit_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        if let (None, Some(_)) = (query.limit(), query.offset()) {
            w.clause("LIMIT -1");
        }
        base::limit_clause(self, w, query)
    }
}
