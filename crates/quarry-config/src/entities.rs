//! Entity definitions read from TOML.
//!
//! ```toml
//! [[entity]]
//! name = "Team"
//!
//! [[entity.field]]
//! property = "id"
//! kind = "integer"
//! primary_key = true
//!
//! [[entity.field]]
//! property = "name"
//! kind = "text"
//! max_length = 40
//!
//! [[entity.collection]]
//! property = "members"
//! target = "Member"
//! via = "team"
//! ```
//!
//! Entities are registered in file order, so a `reference` must point at an
//! entity declared earlier in the file (or at the entity itself).

use std::{fs, path::Path, sync::Arc};

use quarry_schema::{Entity, EntityDescriptor, Field, Registry, Value};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ConfigError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityFile {
    #[serde(default)]
    pub entity: Vec<EntityDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDef {
    pub name: String,
    pub table: Option<String>,
    pub schema: Option<String>,
    #[serde(default)]
    pub field: Vec<FieldDef>,
    #[serde(default)]
    pub collection: Vec<CollectionDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    SmallInteger,
    BigInteger,
    Real,
    Decimal,
    Text,
    Boolean,
    Time,
    Reference,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub property: String,
    pub kind: FieldKind,
    pub column: Option<String>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    pub default: Option<toml::Value>,
    pub max_length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    /// Target entity of a `reference`.
    pub references: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionDef {
    pub property: String,
    pub target: String,
    pub via: String,
}

impl EntityFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Registers every entity in file order and returns their descriptors.
    pub fn register(self, registry: &Registry) -> Result<Vec<Arc<EntityDescriptor>>> {
        let mut descriptors = Vec::with_capacity(self.entity.len());
        for def in self.entity {
            if registry.get(&def.name).is_some() {
                warn!(entity = %def.name, "entity already registered, keeping the first definition");
            }
            let descriptor = def.into_entity()?.define(registry)?;
            descriptors.push(descriptor);
        }
        Ok(descriptors)
    }
}

impl EntityDef {
    pub fn into_entity(self) -> Result<Entity> {
        let mut entity = Entity::new(&self.name);
        if let Some(table) = self.table {
            entity = entity.table(table);
        }
        if let Some(schema) = self.schema {
            entity = entity.schema(schema);
        }
        for field in self.field {
            entity = entity.field(field.into_field(&self.name)?);
        }
        for collection in self.collection {
            entity = entity.has_many(collection.property, collection.target, collection.via);
        }
        Ok(entity)
    }
}

impl FieldDef {
    pub fn into_field(self, entity: &str) -> Result<Field> {
        let invalid = |reason: &str| ConfigError::InvalidField {
            entity: entity.to_string(),
            property: self.property.clone(),
            reason: reason.to_string(),
        };

        if self.max_length.is_some() && self.kind != FieldKind::Text {
            return Err(invalid("`max_length` only applies to text fields"));
        }
        if (self.precision.is_some() || self.scale.is_some()) && self.kind != FieldKind::Decimal {
            return Err(invalid("`precision` and `scale` only apply to decimal fields"));
        }
        if self.references.is_some() != (self.kind == FieldKind::Reference) {
            return Err(invalid("`references` is required for, and only for, reference fields"));
        }
        let default = self
            .default
            .as_ref()
            .map(|value| to_value(value).ok_or_else(|| invalid("unsupported default value")))
            .transpose()?;

        let property = self.property.clone();
        let mut field = match self.kind {
            FieldKind::Integer => Field::integer(property),
            FieldKind::SmallInteger => Field::small_integer(property),
            FieldKind::BigInteger => Field::big_integer(property),
            FieldKind::Real => Field::real(property),
            FieldKind::Decimal => match (self.precision, self.scale) {
                (Some(precision), Some(scale)) => Field::decimal(property, precision, scale),
                _ => return Err(invalid("decimal fields need `precision` and `scale`")),
            },
            FieldKind::Text => match self.max_length {
                Some(max) => Field::text(property).max_length(max),
                None => Field::text(property),
            },
            FieldKind::Boolean => Field::boolean(property),
            FieldKind::Time => Field::time(property),
            FieldKind::Reference => match self.references.clone() {
                Some(target) => Field::reference(property, target),
                None => return Err(invalid("reference fields need `references`")),
            },
        };

        if let Some(column) = self.column {
            field = field.column(column);
        }
        if self.nullable {
            field = field.nullable();
        }
        if self.primary_key {
            field = field.primary_key();
        }
        if let Some(default) = default {
            field = field.default(default);
        }
        Ok(field)
    }
}

fn to_value(value: &toml::Value) -> Option<Value> {
    match value {
        toml::Value::String(v) => Some(Value::Text(v.clone())),
        toml::Value::Integer(v) => Some(Value::Integer(*v)),
        toml::Value::Float(v) => Some(Value::Real(*v)),
        toml::Value::Boolean(v) => Some(Value::Bool(*v)),
        toml::Value::Datetime(v) => Value::parse_time(&v.to_string()).map(Value::Time),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

/// Parses the entity file at `path` and registers its entities.
pub fn load_entities(path: &Path, registry: &Registry) -> Result<Vec<Arc<EntityDescriptor>>> {
    let content = fs::read_to_string(path)?;
    let descriptors = EntityFile::parse(&content)?.register(registry)?;
    debug!(
        path = %path.display(),
        entities = descriptors.len(),
        "loaded entity definitions"
    );
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use quarry_schema::{ColumnKind, IntegerSize, SchemaError};
    use tempfile::tempdir;

    use super::*;

    const TEAMS: &str = r#"
[[entity]]
name = "Team"

[[entity.field]]
property = "id"
kind = "integer"
primary_key = true

[[entity.field]]
property = "name"
kind = "text"
max_length = 40

[[entity.collection]]
property = "members"
target = "Member"
via = "team"

[[entity]]
name = "Member"
table = "members"

[[entity.field]]
property = "id"
kind = "big_integer"
primary_key = true

[[entity.field]]
property = "team"
kind = "reference"
references = "Team"
column = "team_id"

[[entity.field]]
property = "active"
kind = "boolean"
default = true

[[entity.field]]
property = "joined"
kind = "time"
nullable = true
default = 2024-01-02T03:04:05
"#;

    #[test]
    fn test_register_in_order() {
        let registry = Registry::new();
        let entities = EntityFile::parse(TEAMS)
            .unwrap()
            .register(&registry)
            .unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[1].table(), "members");

        let team = entities[1].field("team").unwrap();
        assert_eq!(team.column(), "team_id");
        assert_eq!(
            team.kind(),
            &ColumnKind::Reference(Box::new(ColumnKind::Integer(IntegerSize::Regular)))
        );
        assert_eq!(
            entities[1].field("active").unwrap().default_value(),
            Some(&Value::Bool(true))
        );
        assert!(matches!(
            entities[1].field("joined").unwrap().default_value(),
            Some(Value::Time(_))
        ));
        assert_eq!(entities[0].collections()[0].via(), "team");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = EntityFile::parse("[[entity]]\nname = \"A\"\ncolour = \"red\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlDeError(_)));
    }

    #[test]
    fn test_field_options_are_checked() {
        let registry = Registry::new();
        let content = r#"
[[entity]]
name = "Price"

[[entity.field]]
property = "id"
kind = "integer"
primary_key = true

[[entity.field]]
property = "amount"
kind = "decimal"
precision = 10
"#;
        let err = EntityFile::parse(content)
            .unwrap()
            .register(&registry)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField { ref property, .. } if property == "amount"
        ));
    }

    #[test]
    fn test_schema_errors_pass_through() {
        let registry = Registry::new();
        let content = r#"
[[entity]]
name = "Orphan"

[[entity.field]]
property = "id"
kind = "integer"
primary_key = true

[[entity.field]]
property = "owner"
kind = "reference"
references = "Ghost"
"#;
        let err = EntityFile::parse(content)
            .unwrap()
            .register(&registry)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Schema(SchemaError::Configuration { .. })
        ));
    }

    #[test]
    fn test_load_entities_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.toml");
        fs::write(&path, TEAMS).unwrap();

        let registry = Registry::new();
        load_entities(&path, &registry).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("Member").is_some());
    }
}
