//! Error types for quarry-schema.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while defining entities or validating values against them.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Invalid definition for entity `{entity}`: {reason}")]
    #[diagnostic(
        code(quarry_schema::configuration),
        help("Entity definitions are checked once, when they are registered")
    )]
    Configuration { entity: String, reason: String },

    #[error("Invalid value for `{property}`{}: {reason}", at_index(.index))]
    #[diagnostic(code(quarry_schema::validation))]
    Validation {
        property: String,
        index: Option<usize>,
        reason: String,
    },

    #[error("Entity not registered: {0}")]
    #[diagnostic(
        code(quarry_schema::unknown_entity),
        help("Define the referenced entity before the entities that point at it")
    )]
    UnknownEntity(String),
}

fn at_index(index: &Option<usize>) -> String {
    index.map(|i| format!(" at index {i}")).unwrap_or_default()
}

impl SchemaError {
    pub(crate) fn configuration(entity: &str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    /// Attaches a batch element index to a validation error.
    pub fn at(self, position: usize) -> Self {
        match self {
            Self::Validation {
                property, reason, ..
            } => Self::Validation {
                property,
                index: Some(position),
                reason,
            },
            other => other,
        }
    }
}

/// Result type alias for quarry-schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
