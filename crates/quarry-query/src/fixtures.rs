//! Entities shared by the unit tests.

use std::sync::Arc;

use quarry_schema::{Entity, EntityDescriptor, Field, Registry};

pub(crate) struct Schema {
    pub registry: Registry,
    pub item: Arc<EntityDescriptor>,
    pub person: Arc<EntityDescriptor>,
    pub foo: Arc<EntityDescriptor>,
    pub bar: Arc<EntityDescriptor>,
    pub team: Arc<EntityDescriptor>,
    pub member: Arc<EntityDescriptor>,
}

pub(crate) fn schema() -> Schema {
    let registry = Registry::new();
    let define = |entity: Entity| entity.define(&registry).unwrap();

    let item = define(
        Entity::new("Item")
            .field(Field::integer("id").primary_key())
            .field(Field::integer("number")),
    );
    let person = define(
        Entity::new("Person")
            .field(Field::integer("id").primary_key())
            .field(Field::text("name").max_length(20))
            .field(Field::text("color").nullable()),
    );
    let foo = define(
        Entity::new("Foo")
            .field(Field::integer("id").primary_key())
            .field(Field::text("color"))
            .field(Field::integer("value")),
    );
    let bar = define(
        Entity::new("Bar")
            .field(Field::integer("id").primary_key())
            .field(Field::text("color"))
            .field(Field::integer("value")),
    );
    let team = define(
        Entity::new("Team")
            .field(Field::integer("id").primary_key())
            .field(Field::text("name"))
            .has_many("members", "Member", "team"),
    );
    let member = define(
        Entity::new("Member")
            .field(Field::integer("id").primary_key())
            .field(Field::text("name"))
            .field(Field::reference("team", "Team"))
            .field(Field::reference("mentor", "Member").nullable())
            .field(Field::boolean("active").default(true))
            .field(Field::time("joined").nullable()),
    );

    Schema {
        registry,
        item,
        person,
        foo,
        bar,
        team,
        member,
    }
}
