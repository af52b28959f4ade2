//! SQL generation.
//!
//! A [`Generator`] renders a finished [`Query`] clause by clause. Every
//! clause is its own overridable step, called in a fixed order by
//! [`Generator::write_query`]:
//!
//! `WITH`, `SELECT`, `INSERT`, `UPDATE`, `DELETE`, `FROM`/joins, `SET`,
//! `WHERE`, `ORDER BY`, `LIMIT`.
//!
//! The provided implementations render dialect-neutral SQL and live in
//! [`base`] as free functions, so a dialect overriding a step can still fall
//! back to the neutral rendering for the cases it does not change. A step
//! with nothing to emit writes nothing.
//!
//! Rendering produces a [`Rendered`] statement: placeholder text plus one
//! [`Slot`] per placeholder. Literal values are already encoded for the
//! dialect; template parameters are resolved when the statement is bound.

pub mod base;
mod generic;
mod mysql;
mod postgres;
mod sqlite;

use quarry_schema::{naming::is_identifier, Dialect, Value, TIME_FORMAT};
use tracing::{debug, trace};

pub use generic::GenericGenerator;
pub use mysql::MySqlGenerator;
pub use postgres::PostgresGenerator;
pub use sqlite::SqliteGenerator;

use crate::{
    condition::{Comparison, Node},
    error::{QueryError, Result},
    expr::{ColumnRef, Expr, Param},
    query::Query,
    statement::Statement,
    table::TableRef,
};

/// Driver-supplied identifier escaping, consulted before the generator's own
/// quoting.
pub type Escape<'a> = &'a dyn Fn(&str) -> Option<String>;

const RESERVED: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "check", "column", "create", "default",
    "delete", "desc", "distinct", "drop", "else", "end", "exists", "from", "group", "having",
    "in", "index", "inner", "insert", "into", "is", "join", "key", "left", "like", "limit",
    "not", "null", "offset", "on", "or", "order", "outer", "primary", "references", "right",
    "select", "set", "table", "then", "to", "union", "unique", "update", "user", "using",
    "values", "when", "where", "with",
];

/// Whether `name` must be quoted to be used as an identifier.
pub fn needs_quoting(name: &str) -> bool {
    !is_identifier(name) || RESERVED.contains(&name.to_ascii_lowercase().as_str())
}

/// Wraps `name` in `quote`, doubling any embedded quote characters.
pub fn quote_with(name: &str, quote: char) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push(quote);
    for c in name.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// Value bound to one placeholder.
#[derive(Debug, Clone)]
pub enum Slot {
    /// A literal, already encoded for the dialect.
    Value(Value),
    /// A template parameter; `column` validates and encodes the argument.
    Param {
        param: Param,
        column: Option<ColumnRef>,
    },
}

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Slot(usize),
}

/// Output buffer shared by the clause steps.
pub struct Writer<'a> {
    pretty: bool,
    escape: Option<Escape<'a>>,
    text: String,
    segments: Vec<Segment>,
    slots: Vec<Slot>,
}

impl<'a> Writer<'a> {
    pub fn new(pretty: bool, escape: Option<Escape<'a>>) -> Self {
        Self {
            pretty,
            escape,
            text: String::new(),
            segments: Vec::new(),
            slots: Vec::new(),
        }
    }

    pub fn push(&mut self, text: &str) {
        self.text.push_str(text);
        match self.segments.last_mut() {
            Some(Segment::Text(last)) => last.push_str(text),
            _ => self.segments.push(Segment::Text(text.to_string())),
        }
    }

    /// Starts a new clause: a space, or a newline when pretty printing,
    /// followed by `keyword`.
    pub fn clause(&mut self, keyword: &str) {
        if !self.text.is_empty() && !self.text.ends_with('(') {
            self.push(if self.pretty { "\n" } else { " " });
        }
        self.push(keyword);
    }

    /// Appends a placeholder bound to `slot`.
    pub fn slot(&mut self, slot: Slot, placeholder: &str) {
        let index = self.slots.len();
        self.slots.push(slot);
        self.text.push_str(placeholder);
        self.segments.push(Segment::Slot(index));
    }

    /// 1-based position of the next placeholder.
    pub fn position(&self) -> usize {
        self.slots.len() + 1
    }

    pub fn escape(&self, name: &str) -> Option<String> {
        self.escape.and_then(|escape| escape(name))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn finish(self, dialect: Dialect) -> Rendered {
        Rendered {
            dialect,
            text: self.text,
            segments: self.segments,
            slots: self.slots,
        }
    }
}

/// A rendered query, ready to be bound to arguments.
#[derive(Debug, Clone)]
pub struct Rendered {
    dialect: Dialect,
    text: String,
    segments: Vec<Segment>,
    slots: Vec<Slot>,
}

impl Rendered {
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Placeholder text; identical for every binding.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Resolves every slot against `args`, indexed by parameter position.
    pub fn bind(&self, generator: &dyn Generator, args: &[Value]) -> Result<Statement> {
        let mut params = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let value = match slot {
                Slot::Value(value) => value.clone(),
                Slot::Param { param, column } => {
                    let arg = args
                        .get(param.index)
                        .cloned()
                        .ok_or_else(|| QueryError::UnboundParameter(param.name.clone()))?;
                    match column {
                        Some(column) => {
                            let value = column.accept(arg)?;
                            column.field().encode(self.dialect, value)
                        }
                        None => arg,
                    }
                }
            };
            trace!(position = params.len() + 1, value = %value, "bound parameter");
            params.push(value);
        }

        let mut inline = String::with_capacity(self.text.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => inline.push_str(text),
                Segment::Slot(index) => inline.push_str(&generator.literal(&params[*index])),
            }
        }

        Ok(Statement {
            text: self.text.clone(),
            params,
            inline,
        })
    }
}

/// Renders queries for one SQL dialect.
pub trait Generator: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn quote_identifier(&self, name: &str) -> String {
        if needs_quoting(name) {
            quote_with(name, '"')
        } else {
            name.to_string()
        }
    }

    /// Placeholder for the `position`th (1-based) bound value.
    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    /// Inline SQL literal, used for the display form of statements.
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Real(v) => v.to_string(),
            Value::Text(v) => quote_with(v, '\''),
            Value::Time(v) => format!("'{}'", v.format(TIME_FORMAT)),
        }
    }

    fn render(&self, query: &Query, pretty: bool) -> Result<Rendered> {
        self.render_with(query, pretty, None)
    }

    /// Renders with identifiers passed through `escape` first.
    fn render_with(
        &self,
        query: &Query,
        pretty: bool,
        escape: Option<Escape<'_>>,
    ) -> Result<Rendered> {
        let mut writer = Writer::new(pretty, escape);
        self.write_query(&mut writer, query)?;
        debug!(
            dialect = %self.dialect(),
            slots = writer.slots.len(),
            "rendered query"
        );
        trace!(sql = writer.text(), "rendered text");
        Ok(writer.finish(self.dialect()))
    }

    /// Runs every clause step in order.
    fn write_query(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        self.with_clause(w, query)?;
        self.select_clause(w, query)?;
        self.insert_clause(w, query)?;
        self.update_clause(w, query)?;
        self.delete_clause(w, query)?;
        self.from_clause(w, query)?;
        self.set_clause(w, query)?;
        self.where_clause(w, query)?;
        self.order_by_clause(w, query)?;
        self.limit_clause(w, query)
    }

    fn with_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::with_clause(self, w, query)
    }

    fn select_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::select_clause(self, w, query)
    }

    fn insert_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::insert_clause(self, w, query)
    }

    fn update_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::update_clause(self, w, query)
    }

    fn delete_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::delete_clause(self, w, query)
    }

    fn from_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::from_clause(self, w, query)
    }

    fn set_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        let qualified = query.update_targets().len() > 1;
        base::set_clause(self, w, query, qualified)
    }

    fn where_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::where_clause(self, w, query, query.condition().node())
    }

    fn order_by_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::order_by_clause(self, w, query)
    }

    fn limit_clause(&self, w: &mut Writer<'_>, query: &Query) -> Result<()> {
        base::limit_clause(self, w, query)
    }

    fn write_identifier(&self, w: &mut Writer<'_>, name: &str) {
        let quoted = w
            .escape(name)
            .unwrap_or_else(|| self.quote_identifier(name));
        w.push(&quoted);
    }

    /// Table name as stored, schema-qualified when it has a schema.
    fn write_table_name(&self, w: &mut Writer<'_>, table: &TableRef) {
        let entity = table.entity();
        if let (Some(schema), false) = (entity.schema(), table.is_cte()) {
            self.write_identifier(w, schema);
            w.push(".");
        }
        self.write_identifier(w, entity.table());
    }

    /// Table name plus `AS alias` when the alias differs from it.
    fn write_table(&self, w: &mut Writer<'_>, table: &TableRef) {
        self.write_table_name(w, table);
        if table.alias() != table.entity().table() {
            w.push(" AS ");
            self.write_identifier(w, table.alias());
        }
    }

    fn write_column(
        &self,
        w: &mut Writer<'_>,
        query: &Query,
        column: &ColumnRef,
        qualified: bool,
    ) -> Result<()> {
        if qualified {
            let table = query
                .table(column.table())
                .ok_or_else(|| QueryError::ForeignColumn {
                    property: column.property().to_string(),
                })?;
            self.write_identifier(w, table.alias());
            w.push(".");
        }
        self.write_identifier(w, column.field().column());
        Ok(())
    }

    /// Writes `expr`. Literal values are encoded for `target`'s field when
    /// one is given; parameters are checked against it at bind time.
    fn write_expr(
        &self,
        w: &mut Writer<'_>,
        query: &Query,
        expr: &Expr,
        target: Option<&ColumnRef>,
    ) -> Result<()> {
        match expr {
            Expr::Column(column) => self.write_column(w, query, column, true)?,
            Expr::Value(value) => {
                let value = match target {
                    Some(column) => column.field().encode(self.dialect(), value.clone()),
                    None => value.clone(),
                };
                let placeholder = self.placeholder(w.position());
                w.slot(Slot::Value(value), &placeholder);
            }
            Expr::Param(param) => {
                let placeholder = self.placeholder(w.position());
                w.slot(
                    Slot::Param {
                        param: param.clone(),
                        column: target.cloned(),
                    },
                    &placeholder,
                );
            }
            Expr::CountAll => w.push("COUNT(*)"),
            Expr::Aggregate(aggregate, column) => {
                w.push(aggregate.name());
                w.push("(");
                self.write_column(w, query, column, true)?;
                w.push(")");
            }
        }
        Ok(())
    }

    fn write_comparison(
        &self,
        w: &mut Writer<'_>,
        query: &Query,
        comparison: &Comparison,
    ) -> Result<()> {
        base::comparison(self, w, query, comparison)
    }

    /// Writes a condition tree. Nested groups are parenthesized; the root
    /// group is not.
    fn write_condition(
        &self,
        w: &mut Writer<'_>,
        query: &Query,
        node: &Node,
        nested: bool,
    ) -> Result<()> {
        match node {
            Node::Compare(comparison) => self.write_comparison(w, query, comparison),
            Node::All(children) | Node::Any(children) => {
                let separator = if matches!(node, Node::All(_)) {
                    " AND "
                } else {
                    " OR "
                };
                if nested {
                    w.push("(");
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        w.push(separator);
                    }
                    self.write_condition(w, query, child, true)?;
                }
                if nested {
                    w.push(")");
                }
                Ok(())
            }
            Node::Not(inner) => {
                w.push("NOT (");
                self.write_condition(w, query, inner, false)?;
                w.push(")");
                Ok(())
            }
        }
    }
}

/// The stock generator for `dialect`.
pub fn for_dialect(dialect: Dialect) -> Box<dyn Generator> {
    match dialect {
        Dialect::Generic => Box::new(GenericGenerator),
        Dialect::MySql => Box::new(MySqlGenerator),
        Dialect::Postgres => Box::new(PostgresGenerator),
        Dialect::Sqlite => Box::new(SqliteGenerator),
    }
}

#[cfg(test)]
mod tests;
