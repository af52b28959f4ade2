use quarry_query::{for_dialect, ColumnRef, Order, Query, QueryContext, Table};
use quarry_schema::{ColumnKind, FieldDescriptor, Registry, Value};
use serde_json::json;
use tracing::{debug, info};

use crate::{
    cli::RenderArgs,
    error::{CliError, CliResult},
    session::Session,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

// Two-character operators first so `>=` is not read as `>`.
const OPERATORS: [(&str, FilterOp); 7] = [
    ("!=", FilterOp::Ne),
    (">=", FilterOp::Gte),
    ("<=", FilterOp::Lte),
    ("=", FilterOp::Eq),
    (">", FilterOp::Gt),
    ("<", FilterOp::Lt),
    ("~", FilterOp::Like),
];

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    path: String,
    op: FilterOp,
    raw: String,
}

fn parse_filter(arg: &str) -> CliResult<Filter> {
    let start = arg
        .find(&['=', '!', '>', '<', '~'][..])
        .ok_or_else(|| CliError::invalid(arg, "expected an operator (=, !=, >, >=, <, <=, ~)"))?;
    let (path, rest) = arg.split_at(start);
    let (symbol, op) = OPERATORS
        .iter()
        .find(|(symbol, _)| rest.starts_with(symbol))
        .ok_or_else(|| CliError::invalid(arg, "unknown operator"))?;

    let path = path.trim();
    if path.is_empty() {
        return Err(CliError::invalid(arg, "missing property path"));
    }
    Ok(Filter {
        path: path.to_string(),
        op: *op,
        raw: rest[symbol.len()..].trim().to_string(),
    })
}

fn parse_order(arg: &str) -> CliResult<(String, Order)> {
    let (path, direction) = match arg.split_once(':') {
        Some((path, direction)) => (path, direction),
        None => (arg, "asc"),
    };
    let order = match direction.to_ascii_lowercase().as_str() {
        "asc" => Order::Asc,
        "desc" => Order::Desc,
        other => {
            return Err(CliError::invalid(
                arg,
                format!("unknown sort direction `{other}`"),
            ))
        }
    };
    Ok((path.to_string(), order))
}

/// Converts command-line text into the value a column expects. Text that
/// does not parse is passed through so the column reports it.
fn parse_value(field: &FieldDescriptor, raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    let parsed = match field.kind().storage() {
        ColumnKind::Integer(_) => raw.parse().ok().map(Value::Integer),
        ColumnKind::Real | ColumnKind::Decimal { .. } => raw.parse().ok().map(Value::Real),
        ColumnKind::Boolean => raw.parse().ok().map(Value::Bool),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::Text(raw.to_string()))
}

/// Follows `a.b.c` from `root`: every segment but the last is a
/// relationship.
fn resolve(q: &mut QueryContext<'_>, root: &Table, path: &str) -> quarry_query::Result<ColumnRef> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let property = segments.pop().unwrap_or_default();
    let mut table = root.clone();
    for segment in segments {
        table = q.relate(&table, segment)?;
    }
    table.col(property)
}

pub fn build_query(registry: &Registry, args: &RenderArgs) -> CliResult<Query> {
    let filters = args
        .filters
        .iter()
        .map(|arg| parse_filter(arg))
        .collect::<CliResult<Vec<_>>>()?;
    let order = args
        .order
        .iter()
        .map(|arg| parse_order(arg))
        .collect::<CliResult<Vec<_>>>()?;

    let query = Query::build(registry, |q| {
        let root = q.entity(&args.entity)?;
        for path in &args.select {
            let column = resolve(q, &root, path)?;
            q.select_named(path, column)?;
        }
        for filter in &filters {
            let column = resolve(q, &root, &filter.path)?;
            let value = parse_value(column.field(), &filter.raw);
            let condition = match filter.op {
                FilterOp::Eq => column.eq(value),
                FilterOp::Ne => column.ne(value),
                FilterOp::Gt => column.gt(value),
                FilterOp::Gte => column.gte(value),
                FilterOp::Lt => column.lt(value),
                FilterOp::Lte => column.lte(value),
                FilterOp::Like => column.like(value),
            };
            q.filter(condition)?;
        }
        for (path, direction) in &order {
            let column = resolve(q, &root, path)?;
            q.order_by(column, *direction)?;
        }
        if let Some(limit) = args.limit {
            q.limit(limit);
        }
        if let Some(offset) = args.offset {
            q.offset(offset);
        }
        Ok(())
    })?;
    Ok(query)
}

pub fn render_query(session: &Session, args: &RenderArgs) -> CliResult<()> {
    let registry = session.registry()?;
    let query = build_query(&registry, args)?;
    let generator = for_dialect(session.dialect);
    let pretty = args.pretty || session.config.is_pretty();
    debug!(entity = %args.entity, dialect = %session.dialect, pretty, "rendering query");

    let statement = query
        .render(generator.as_ref(), pretty)?
        .bind(generator.as_ref(), &[])?;
    let params: Vec<serde_json::Value> = statement
        .params()
        .iter()
        .cloned()
        .map(serde_json::Value::from)
        .collect();

    if session.json {
        let output = json!({
            "dialect": session.dialect,
            "sql": statement.text(),
            "params": params,
            "inline": statement.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if args.params {
        info!("{}", statement.text());
        info!("{}", serde_json::to_string(&params)?);
    } else {
        info!("{statement}");
    }
    Ok(())
}
