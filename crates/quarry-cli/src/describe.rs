use nu_ansi_term::Color::{Cyan, Green, Yellow};
use quarry_schema::{ColumnInfo, Dialect, EntityDescriptor};
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::{debug, info};

use crate::{
    error::CliResult,
    session::Session,
    utils::{yes_no, Colored},
};

#[derive(Serialize)]
struct EntityColumns<'a> {
    entity: &'a str,
    table: String,
    columns: Vec<ColumnInfo>,
}

pub fn describe_entities(session: &Session, names: &[String]) -> CliResult<()> {
    let registry = session.registry()?;
    let entities = if names.is_empty() {
        registry.entities()
    } else {
        names
            .iter()
            .map(|name| registry.require(name))
            .collect::<Result<Vec<_>, _>>()?
    };
    debug!(count = entities.len(), dialect = %session.dialect, "describing entities");

    if session.json {
        let output: Vec<EntityColumns> = entities
            .iter()
            .map(|entity| EntityColumns {
                entity: entity.name(),
                table: entity.qualified_table(),
                columns: entity.columns(session.dialect),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for entity in &entities {
        info!("\n{}", column_table(entity, session.dialect));
    }
    Ok(())
}

pub fn column_table(entity: &EntityDescriptor, dialect: Dialect) -> String {
    let mut builder = Builder::new();
    builder.push_record(["Column", "Type", "Null", "Key", "References"]);
    for column in entity.columns(dialect) {
        builder.push_record([
            format!("{}", Colored(Cyan, &column.column)),
            column.datatype,
            yes_no(column.nullable).to_string(),
            if column.primary_key {
                format!("{}", Colored(Yellow, "PK"))
            } else if column.foreign_key {
                "FK".to_string()
            } else {
                String::new()
            },
            column.foreign_table.unwrap_or_default(),
        ]);
    }

    builder
        .build()
        .with(Panel::header(format!(
            "{} ({}, {dialect})",
            Colored(Green, entity.name()),
            entity.qualified_table()
        )))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string()
}

#[cfg(test)]
mod tests {
    use quarry_schema::{Entity, Field, Registry};

    use super::*;
    use crate::utils::set_color;

    #[test]
    fn test_column_table() {
        set_color(false);
        let registry = Registry::new();
        Entity::new("Team")
            .field(Field::integer("id").primary_key())
            .define(&registry)
            .unwrap();
        let member = Entity::new("Member")
            .field(Field::integer("id").primary_key())
            .field(Field::reference("team", "Team").nullable())
            .define(&registry)
            .unwrap();

        let table = column_table(&member, Dialect::Postgres);
        assert!(table.contains("Member (member, postgres)"));
        assert!(table.contains("PK"));
        assert!(table.contains("FK"));
        assert!(table.contains("INTEGER"));
        assert!(table.contains("team"));
    }
}
