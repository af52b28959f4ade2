//! The entity registry.
//!
//! A [`Registry`] owns every [`EntityDescriptor`] defined in it. Definitions
//! are checked once on the way in and are immutable afterwards, so lookups
//! hand out shared `Arc`s that can be read from any thread.
//!
//! Most programs use a single process-wide registry, available through
//! [`Registry::global`]. It is created on first use and lives for the rest of
//! the process. Tests and tools that need isolation create their own with
//! [`Registry::new`] and pass it by reference.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::{debug, trace, warn};

use crate::{
    entity::{Collection, Entity, EntityDescriptor},
    error::{Result, SchemaError},
    field::{FieldDescriptor, ForeignKey},
    kind::ColumnKind,
    naming::{is_identifier, to_snake_case},
};

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

#[derive(Default)]
struct Entries {
    by_name: HashMap<String, usize>,
    entities: Vec<Arc<EntityDescriptor>>,
}

/// Holds entity descriptors by name.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<Entries>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Checks and registers an entity.
    ///
    /// Defining an entity whose name is already registered returns the
    /// existing descriptor unchanged. A redefinition with different
    /// properties is logged at `warn` and still resolves to the first one.
    pub fn define(&self, entity: Entity) -> Result<Arc<EntityDescriptor>> {
        if let Some(existing) = self.get(&entity.name) {
            if same_shape(&entity, &existing) {
                debug!(entity = %entity.name, "entity already defined, reusing descriptor");
            } else {
                warn!(
                    entity = %entity.name,
                    "entity redefined with different properties, keeping the first definition"
                );
            }
            return Ok(existing);
        }

        let descriptor = Arc::new(self.resolve(entity)?);

        let mut entries = self.write();
        if let Some(&index) = entries.by_name.get(&descriptor.name) {
            return Ok(entries.entities[index].clone());
        }
        let index = entries.entities.len();
        entries.by_name.insert(descriptor.name.clone(), index);
        entries.entities.push(descriptor.clone());

        debug!(
            entity = %descriptor.name,
            table = %descriptor.qualified_table(),
            fields = descriptor.fields.len(),
            "registered entity"
        );
        Ok(descriptor)
    }

    pub fn get(&self, name: &str) -> Option<Arc<EntityDescriptor>> {
        let entries = self.read();
        entries
            .by_name
            .get(name)
            .map(|&index| entries.entities[index].clone())
    }

    /// Like [`Registry::get`], failing with [`SchemaError::UnknownEntity`].
    pub fn require(&self, name: &str) -> Result<Arc<EntityDescriptor>> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    /// All descriptors, in definition order.
    pub fn entities(&self) -> Vec<Arc<EntityDescriptor>> {
        self.read().entities.clone()
    }

    pub fn len(&self) -> usize {
        self.read().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, entity: Entity) -> Result<EntityDescriptor> {
        let name = entity.name;
        let fail = |reason: String| SchemaError::configuration(&name, reason);

        if !is_identifier(&name) {
            return Err(fail(format!("`{name}` is not a valid entity name")));
        }
        let table = entity.table.unwrap_or_else(|| to_snake_case(&name));
        if !is_identifier(&table) {
            return Err(fail(format!("`{table}` is not a valid table name")));
        }
        if let Some(schema) = entity.schema.as_deref().filter(|s| !is_identifier(s)) {
            return Err(fail(format!("`{schema}` is not a valid schema name")));
        }
        let qualified = match &entity.schema {
            Some(schema) => format!("{schema}.{table}"),
            None => table.clone(),
        };

        let keys: Vec<usize> = entity
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.primary_key)
            .map(|(i, _)| i)
            .collect();
        let primary_key = match keys.as_slice() {
            [index] => *index,
            [] => return Err(fail("no primary key declared".into())),
            many => {
                let names: Vec<&str> = many
                    .iter()
                    .map(|&i| entity.fields[i].property.as_str())
                    .collect();
                return Err(fail(format!(
                    "multiple primary keys declared: {}",
                    names.join(", ")
                )));
            }
        };

        let key = &entity.fields[primary_key];
        if key.references.is_some() {
            return Err(fail(format!(
                "primary key `{}` cannot be a reference",
                key.property
            )));
        }
        if key.nullable {
            return Err(fail(format!(
                "primary key `{}` cannot be nullable",
                key.property
            )));
        }
        let key_kind = key
            .kind
            .clone()
            .ok_or_else(|| fail(format!("`{}` has no column kind", key.property)))?;
        let key_column = key
            .column
            .clone()
            .unwrap_or_else(|| to_snake_case(&key.property));

        let mut properties = HashSet::new();
        let mut columns = HashSet::new();
        let mut fields = Vec::with_capacity(entity.fields.len());

        for field in entity.fields {
            let property = field.property;
            if !is_identifier(&property) {
                return Err(fail(format!("`{property}` is not a valid property name")));
            }
            if !properties.insert(property.clone()) {
                return Err(fail(format!("property `{property}` is declared twice")));
            }
            let column = field
                .column
                .unwrap_or_else(|| to_snake_case(&property));
            if !is_identifier(&column) {
                return Err(fail(format!("`{column}` is not a valid column name")));
            }
            if !columns.insert(column.clone()) {
                return Err(fail(format!("column `{column}` is used by more than one field")));
            }

            let (kind, foreign) = match field.references {
                None => {
                    let kind = field
                        .kind
                        .ok_or_else(|| fail(format!("`{property}` has no column kind")))?;
                    (kind, None)
                }
                Some(target) => {
                    let (target_kind, target_table, target_column) = if target == name {
                        (key_kind.clone(), qualified.clone(), key_column.clone())
                    } else {
                        let referenced = self.get(&target).ok_or_else(|| {
                            fail(format!(
                                "`{property}` references `{target}`, which is not defined"
                            ))
                        })?;
                        let key = referenced.primary_key();
                        (
                            key.kind.storage().clone(),
                            referenced.qualified_table(),
                            key.column.clone(),
                        )
                    };
                    if let Some(declared) = field.kind {
                        if declared.storage() != target_kind.storage() {
                            return Err(fail(format!(
                                "`{property}` is declared as {} but the primary key of `{target}` is {}",
                                declared.label(),
                                target_kind.label()
                            )));
                        }
                    }
                    let foreign = ForeignKey {
                        entity: target,
                        table: target_table,
                        column: target_column,
                    };
                    (
                        ColumnKind::Reference(Box::new(target_kind.storage().clone())),
                        Some(foreign),
                    )
                }
            };
            kind.check()
                .map_err(|e| fail(format!("`{property}`: {e}")))?;

            let mut descriptor = FieldDescriptor {
                property,
                column,
                kind,
                nullable: field.nullable,
                primary_key: field.primary_key,
                default: None,
                foreign,
                check: field.check,
            };
            if let Some(default) = field.default {
                let value = descriptor.set(default).map_err(|e| {
                    fail(format!("invalid default for `{}`: {e}", descriptor.property))
                })?;
                descriptor.default = Some(value);
            }
            fields.push(descriptor);
        }

        for collection in &entity.collections {
            self.check_collection(&name, &fields, &properties, collection)
                .map_err(fail)?;
            properties.insert(collection.property.clone());
        }

        Ok(EntityDescriptor {
            name,
            table,
            schema: entity.schema,
            fields,
            primary_key,
            collections: entity.collections,
        })
    }

    fn check_collection(
        &self,
        owner: &str,
        fields: &[FieldDescriptor],
        taken: &HashSet<String>,
        collection: &Collection,
    ) -> std::result::Result<(), String> {
        if !is_identifier(&collection.property) {
            return Err(format!(
                "`{}` is not a valid property name",
                collection.property
            ));
        }
        if taken.contains(&collection.property) {
            return Err(format!(
                "property `{}` is declared twice",
                collection.property
            ));
        }

        let points_back = |field: Option<&FieldDescriptor>| {
            field
                .and_then(|f| f.foreign.as_ref())
                .is_some_and(|fk| fk.entity == owner)
        };

        if collection.target == owner {
            let via = fields.iter().find(|f| f.property == collection.via);
            if !points_back(via) {
                return Err(format!(
                    "`{}` expects `{}.{}` to reference `{owner}`",
                    collection.property, collection.target, collection.via
                ));
            }
        } else if let Some(target) = self.get(&collection.target) {
            if !points_back(target.field(&collection.via)) {
                return Err(format!(
                    "`{}` expects `{}.{}` to reference `{owner}`",
                    collection.property, collection.target, collection.via
                ));
            }
        } else {
            trace!(
                entity = owner,
                collection = %collection.property,
                target = %collection.target,
                "collection target not defined yet, checked on traversal"
            );
        }
        Ok(())
    }
}

fn same_shape(entity: &Entity, existing: &EntityDescriptor) -> bool {
    entity
        .fields
        .iter()
        .map(|f| f.property.as_str())
        .eq(existing.fields.iter().map(|f| f.property.as_str()))
        && entity
            .collections
            .iter()
            .map(|c| c.property.as_str())
            .eq(existing.collections.iter().map(|c| c.property.as_str()))
}
