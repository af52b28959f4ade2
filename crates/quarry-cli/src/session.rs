use std::path::PathBuf;

use quarry_config::{
    config::{self, get_config, Config},
    entities::load_entities,
    paths::resolve_path,
};
use quarry_schema::{Dialect, Registry};
use tracing::debug;

use crate::{
    cli::Args,
    error::{CliError, CliResult},
};

/// Settings for one invocation: the configuration file merged with the
/// command line.
pub struct Session {
    pub config: Config,
    pub dialect: Dialect,
    pub entities_path: PathBuf,
    pub json: bool,
}

impl Session {
    pub fn load(args: &Args) -> CliResult<Self> {
        let config = match &args.config {
            Some(path) => Config::from_path(&resolve_path(path)?)?,
            None => {
                config::init()?;
                get_config()
            }
        };

        let dialect = match &args.dialect {
            Some(name) => name
                .parse()
                .map_err(|reason: String| CliError::invalid("--dialect", reason))?,
            None => config.get_dialect()?,
        };
        let entities_path = match &args.entities {
            Some(path) => resolve_path(path)?,
            None => config.get_entities_path()?,
        };

        debug!(
            dialect = %dialect,
            entities = %entities_path.display(),
            "session ready"
        );
        Ok(Self {
            config,
            dialect,
            entities_path,
            json: args.json,
        })
    }

    /// Loads the entity definitions into a fresh registry.
    pub fn registry(&self) -> CliResult<Registry> {
        if !self.entities_path.is_file() {
            return Err(CliError::MissingEntities(
                self.entities_path.display().to_string(),
            ));
        }
        let registry = Registry::new();
        load_entities(&self.entities_path, &registry)?;
        Ok(registry)
    }
}
