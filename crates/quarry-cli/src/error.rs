use miette::Diagnostic;
use quarry_config::error::ConfigError;
use quarry_query::QueryError;
use quarry_schema::SchemaError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(quarry_cli::json))]
    Json(#[from] serde_json::Error),

    #[error("Entity definitions not found at {0}")]
    #[diagnostic(
        code(quarry_cli::no_entities),
        help("Pass --entities, set QUARRY_ENTITIES or `entities_path` in the config file")
    )]
    MissingEntities(String),

    #[error("Invalid argument `{arg}`: {reason}")]
    #[diagnostic(code(quarry_cli::invalid_argument))]
    InvalidArgument { arg: String, reason: String },
}

impl CliError {
    pub fn invalid(arg: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg: arg.to_string(),
            reason: reason.into(),
        }
    }
}

pub type CliResult<T> = std::result::Result<T, CliError>;
