use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
};

use documented::{Documented, DocumentedFields};
use quarry_schema::Dialect;
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
    paths::{resolve_path, xdg_config_home},
};

/// Quarry configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// SQL dialect used when rendering: "generic", "mysql", "postgres" or "sqlite".
    /// Default: "generic"
    pub dialect: Option<Dialect>,

    /// Render one clause per line instead of a single line.
    /// Default: false
    pub pretty: Option<bool>,

    /// Path to the TOML file holding entity definitions.
    /// Default: $XDG_CONFIG_HOME/quarry/entities.toml
    pub entities_path: Option<String>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

/// `$QUARRY_CONFIG`, or `config.toml` under the XDG config directory.
pub fn config_path() -> PathBuf {
    match std::env::var("QUARRY_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => xdg_config_home().join("quarry").join("config.toml"),
    }
}

/// Loads the configuration from disk and makes it the process-wide one.
pub fn init() -> Result<()> {
    let config = Config::new()?;
    let mut global = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    *global = Some(config);
    Ok(())
}

/// The process-wide configuration, falling back to defaults when [`init`]
/// has not run.
pub fn get_config() -> Config {
    if let Some(config) = CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return config.clone();
    }

    let mut global = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    global.get_or_insert_with(Config::default_config).clone()
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            dialect: Some(Dialect::Generic),
            pretty: Some(false),
            entities_path: Some(
                xdg_config_home()
                    .join("quarry")
                    .join("entities.toml")
                    .display()
                    .to_string(),
            ),
        }
    }

    /// Reads the configuration file at [`config_path`]. A missing file
    /// yields the defaults.
    pub fn new() -> Result<Self> {
        Self::from_path(&config_path())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let mut config: Config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };
        config.resolve()?;
        Ok(config)
    }

    /// Fills every unset option with its default.
    pub fn resolve(&mut self) -> Result<()> {
        let defaults = Self::default_config();
        self.dialect.get_or_insert(Dialect::Generic);
        self.pretty.get_or_insert(false);
        if self.entities_path.is_none() {
            self.entities_path = defaults.entities_path;
        }
        Ok(())
    }

    /// The dialect to render for. `$QUARRY_DIALECT` overrides the file.
    pub fn get_dialect(&self) -> Result<Dialect> {
        if let Ok(name) = std::env::var("QUARRY_DIALECT") {
            return name.parse().map_err(ConfigError::InvalidDialect);
        }
        Ok(self.dialect.unwrap_or_default())
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty.unwrap_or(false)
    }

    /// Absolute path of the entity definitions. `$QUARRY_ENTITIES` overrides
    /// the file.
    pub fn get_entities_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("QUARRY_ENTITIES") {
            return resolve_path(&env_path);
        }
        match &self.entities_path {
            Some(path) => resolve_path(path),
            None => Ok(xdg_config_home().join("quarry").join("entities.toml")),
        }
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;
        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;
        Ok(doc)
    }
}

/// Writes the annotated default configuration to `path`, refusing to
/// overwrite an existing file.
pub fn generate_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    let document = Config::default_config().to_annotated_document()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, document.to_string())?;
    info!(path = %path.display(), "default configuration written");
    Ok(())
}
