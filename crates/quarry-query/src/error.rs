use miette::Diagnostic;
use quarry_schema::{Dialect, SchemaError};
use thiserror::Error;

use crate::driver::DriverError;

#[derive(Error, Diagnostic, Debug)]
pub enum QueryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error("Entity `{entity}` has no property `{property}`")]
    #[diagnostic(code(quarry_query::unknown_property))]
    UnknownProperty { entity: String, property: String },

    #[error("`{entity}.{property}` is not a relationship")]
    #[diagnostic(
        code(quarry_query::not_a_relation),
        help("Only `reference` fields and `has_many` collections can be traversed")
    )]
    NotARelation { entity: String, property: String },

    #[error("Table `{alias}` is not joined to any earlier table")]
    #[diagnostic(
        code(quarry_query::missing_join),
        help("Join it with `join`/`on`, or reach it through `relate`")
    )]
    MissingJoin { alias: String },

    #[error("Invalid join condition for `{alias}`: {reason}")]
    #[diagnostic(code(quarry_query::invalid_join))]
    InvalidJoin { alias: String, reason: String },

    #[error("Column `{property}` belongs to a table that is not part of this query")]
    #[diagnostic(
        code(quarry_query::foreign_column),
        help("Columns must come from tables registered in the same builder")
    )]
    ForeignColumn { property: String },

    #[error("Conflicting query shape: {0}")]
    #[diagnostic(code(quarry_query::conflict))]
    Conflict(String),

    #[error("Query has no tables")]
    #[diagnostic(code(quarry_query::empty))]
    Empty,

    #[error("Parameter `{0}` has no bound value")]
    #[diagnostic(
        code(quarry_query::unbound_parameter),
        help("Queries with parameters must be rendered through a Template")
    )]
    UnboundParameter(String),

    #[error("Template expects {expected} argument(s), got {got}")]
    #[diagnostic(code(quarry_query::arity))]
    Arity { expected: usize, got: usize },

    #[error("The {dialect} generator does not support {feature}")]
    #[diagnostic(code(quarry_query::unsupported))]
    Unsupported { dialect: Dialect, feature: String },

    #[error("Query execution failed: {0}")]
    #[diagnostic(code(quarry_query::execution))]
    Execution(#[source] DriverError),
}

impl QueryError {
    pub(crate) fn unsupported(dialect: Dialect, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect,
            feature: feature.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
