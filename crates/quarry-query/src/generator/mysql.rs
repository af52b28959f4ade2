use quarry_schema::Dialect;

use super::{needs_quoting, quote_with, Generator, Writer};
use crate::{error::Result, query::Query};

// MySQL has no OFFSET without LIMIT; this is the documented "no limit" value.
const UNBOUNDED: u64 = u64::MAX;

/// MySQL and MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGenerator;

impl Generator for MySqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        if needs_quoting(name) {
            quote_with(name, '`')
        } else {
            name.to_string()
        }
    }

    fn limit_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        match (query.limit(), query.offset()) {
            (limit, Some(offset)) => {
                w.clause(&format!("LIMIT {}", limit.unwrap_or(UNBOUNDED)));
                w.clause(&format!("OFFSET {offset}"));
            }
            (Some(limit), None) => w.clause(&format!("LIMIT {limit}")),
            (None, None) => {}
        }
        Ok(())
    }
}
