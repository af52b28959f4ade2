//! Entity descriptors and the builder used to declare them.

use std::sync::Arc;

use crate::{
    error::Result,
    field::{Field, FieldDescriptor},
    registry::Registry,
};

/// A to-many relationship. It allocates no column on this entity; the
/// target's `via` property holds the foreign key back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub(crate) property: String,
    pub(crate) target: String,
    pub(crate) via: String,
}

impl Collection {
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Name of the entity on the many side.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The to-one property on the target that points back here.
    pub fn via(&self) -> &str {
        &self.via
    }
}

/// A relationship reachable from an entity property.
#[derive(Debug, Clone, Copy)]
pub enum Relation<'a> {
    ToOne(&'a FieldDescriptor),
    ToMany(&'a Collection),
}

/// The immutable description of one mapped table.
///
/// Descriptors are created once through [`Registry::define`] and shared by
/// every query that touches the table.
#[derive(Debug)]
pub struct EntityDescriptor {
    pub(crate) name: String,
    pub(crate) table: String,
    pub(crate) schema: Option<String>,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) primary_key: usize,
    pub(crate) collections: Vec<Collection>,
}

impl EntityDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// `schema.table` when a schema is set, otherwise the bare table name.
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.table),
            None => self.table.clone(),
        }
    }

    /// Stored fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, property: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.property == property)
    }

    pub fn field_index(&self, property: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.property == property)
    }

    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[self.primary_key]
    }

    pub const fn primary_key_index(&self) -> usize {
        self.primary_key
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    /// Looks up the relationship behind `property`, if it is one.
    pub fn relation(&self, property: &str) -> Option<Relation<'_>> {
        if let Some(field) = self.field(property) {
            return field.foreign.as_ref().map(|_| Relation::ToOne(field));
        }
        self.collections
            .iter()
            .find(|c| c.property == property)
            .map(Relation::ToMany)
    }
}

/// Declares an entity; turned into an [`EntityDescriptor`] by
/// [`Entity::define`].
///
/// ```
/// use quarry_schema::{Entity, Field, Registry};
///
/// let registry = Registry::new();
/// let item = Entity::new("Item")
///     .field(Field::integer("id").primary_key())
///     .field(Field::integer("number"))
///     .define(&registry)
///     .unwrap();
///
/// assert_eq!(item.table(), "item");
/// ```
#[derive(Clone)]
pub struct Entity {
    pub(crate) name: String,
    pub(crate) table: Option<String>,
    pub(crate) schema: Option<String>,
    pub(crate) fields: Vec<Field>,
    pub(crate) collections: Vec<Collection>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            schema: None,
            fields: Vec::new(),
            collections: Vec::new(),
        }
    }

    /// Overrides the table name (defaults to the snake-cased entity name).
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares a to-many relationship to `target`, whose `via` property is a
    /// reference back to this entity.
    pub fn has_many(
        mut self,
        property: impl Into<String>,
        target: impl Into<String>,
        via: impl Into<String>,
    ) -> Self {
        self.collections.push(Collection {
            property: property.into(),
            target: target.into(),
            via: via.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers this entity, returning the shared descriptor.
    pub fn define(self, registry: &Registry) -> Result<Arc<EntityDescriptor>> {
        registry.define(self)
    }
}
