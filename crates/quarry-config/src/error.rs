use miette::Diagnostic;
use quarry_schema::SchemaError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(quarry_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(quarry_config::toml_deserialize),
        help("Check the TOML syntax and structure of the file")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(quarry_config::already_exists),
        help("Remove the existing config file or point QUARRY_CONFIG somewhere else")
    )]
    ConfigAlreadyExists,

    #[error("Invalid dialect: {0}")]
    #[diagnostic(
        code(quarry_config::invalid_dialect),
        help("Use one of: generic, mysql, postgres, sqlite")
    )]
    InvalidDialect(String),

    #[error("Invalid definition for field `{entity}.{property}`: {reason}")]
    #[diagnostic(code(quarry_config::invalid_field))]
    InvalidField {
        entity: String,
        property: String,
        reason: String,
    },

    #[error("Path is empty")]
    #[diagnostic(code(quarry_config::empty_path))]
    EmptyPath,

    #[error("Environment variable `{var}` used in `{path}` is not set")]
    #[diagnostic(
        code(quarry_config::missing_env_var),
        help("Set the variable or use an absolute path")
    )]
    MissingEnvVar { var: String, path: String },

    #[error("Unclosed variable expansion in `{0}`")]
    #[diagnostic(code(quarry_config::unclosed_variable))]
    UnclosedVariable(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(quarry_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(quarry_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(quarry_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
