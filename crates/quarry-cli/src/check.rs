use nu_ansi_term::Color::{Cyan, Green};
use quarry_schema::{Registry, SchemaError};
use tracing::info;

use crate::{error::CliResult, session::Session, utils::Colored};

pub fn check_entities(session: &Session) -> CliResult<()> {
    let registry = session.registry()?;
    check_collections(&registry)?;

    for entity in registry.entities() {
        info!(
            "{} {} {}",
            Colored(Green, "✓"),
            entity.name(),
            Colored(Cyan, entity.qualified_table())
        );
    }
    info!(entities = registry.len(), "{} entities OK", registry.len());
    Ok(())
}

/// Collections naming an entity defined later in the file are only checked
/// once every entity is registered.
pub fn check_collections(registry: &Registry) -> Result<(), SchemaError> {
    for entity in registry.entities() {
        for collection in entity.collections() {
            let target = registry.require(collection.target())?;
            let points_back = target
                .field(collection.via())
                .and_then(|field| field.foreign_key())
                .is_some_and(|fk| fk.entity == entity.name());
            if !points_back {
                return Err(SchemaError::Configuration {
                    entity: entity.name().to_string(),
                    reason: format!(
                        "`{}` expects `{}.{}` to reference `{}`",
                        collection.property(),
                        collection.target(),
                        collection.via(),
                        entity.name()
                    ),
                });
            }
        }
    }
    Ok(())
}
