//! Selection shapes and how fetched rows are turned back into values.

use quarry_schema::{Dialect, Value};
use serde_json::{Map, Value as JsonValue};

use crate::expr::{Aggregate, Expr};

/// What a `SELECT` returns.
#[derive(Debug, Clone, Default)]
pub enum Selection {
    /// `COUNT(*)`, fetched as a single integer.
    #[default]
    Count,
    /// One expression, fetched as a list of scalars.
    Single(Expr),
    /// Labelled expressions, fetched as a list of objects. Dotted labels
    /// (`owner.name`) nest.
    Named(Vec<(String, Expr)>),
}

impl Selection {
    pub fn is_count(&self) -> bool {
        matches!(self, Self::Count)
    }

    pub(crate) fn shape(&self, dialect: Dialect, rows: Vec<Vec<Value>>) -> JsonValue {
        match self {
            Self::Count => {
                let first = rows.into_iter().next().and_then(|row| row.into_iter().next());
                JsonValue::from(as_count(first.unwrap_or(Value::Null)))
            }
            Self::Single(expr) => JsonValue::Array(
                rows.into_iter()
                    .map(|row| {
                        let value = row.into_iter().next().unwrap_or(Value::Null);
                        decode(expr, dialect, value).into()
                    })
                    .collect(),
            ),
            Self::Named(entries) => JsonValue::Array(
                rows.into_iter()
                    .map(|row| {
                        let mut object = Map::new();
                        for ((label, expr), value) in entries.iter().zip(row) {
                            insert_path(&mut object, label, decode(expr, dialect, value).into());
                        }
                        JsonValue::Object(object)
                    })
                    .collect(),
            ),
        }
    }
}

fn decode(expr: &Expr, dialect: Dialect, value: Value) -> Value {
    match expr {
        Expr::Column(column) | Expr::Aggregate(Aggregate::Min | Aggregate::Max, column) => {
            column.field().get(dialect, value)
        }
        Expr::CountAll | Expr::Aggregate(Aggregate::Count, _) => Value::Integer(as_count(value)),
        _ => value,
    }
}

// Drivers disagree on the type of COUNT results.
fn as_count(value: Value) -> i64 {
    match value {
        Value::Integer(n) => n,
        Value::Real(n) => n as i64,
        Value::Text(text) => text.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

fn insert_path(object: &mut Map<String, JsonValue>, label: &str, value: JsonValue) {
    match label.split_once('.') {
        None => {
            object.insert(label.to_string(), value);
        }
        Some((head, rest)) => {
            let child = object
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !child.is_object() {
                *child = JsonValue::Object(Map::new());
            }
            if let JsonValue::Object(inner) = child {
                insert_path(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_count_shape() {
        let rows = vec![vec![Value::Text("12".into())]];
        assert_eq!(Selection::Count.shape(Dialect::Generic, rows), json!(12));
        assert_eq!(Selection::Count.shape(Dialect::Generic, vec![]), json!(0));
    }

    #[test]
    fn test_named_labels_nest() {
        let selection = Selection::Named(vec![
            ("id".into(), Expr::Value(Value::Null)),
            ("owner.name".into(), Expr::Value(Value::Null)),
            ("owner.team.name".into(), Expr::Value(Value::Null)),
        ]);
        let rows = vec![vec![
            Value::Integer(1),
            Value::Text("Gabe".into()),
            Value::Text("core".into()),
        ]];
        assert_eq!(
            selection.shape(Dialect::Sqlite, rows),
            json!([{ "id": 1, "owner": { "name": "Gabe", "team": { "name": "core" } } }])
        );
    }
}
