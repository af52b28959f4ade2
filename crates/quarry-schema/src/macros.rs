//! Macros for declaring entities.
//!
//! The [`define_entity!`] macro generates a module holding the entity name,
//! a property-name constant per field, and functions that build and register
//! the entity.

/// Defines a module describing one entity.
///
/// # Syntax
///
/// ```ignore
/// define_entity!(
///     item {
///         name: "Item",
///         fields: {
///             ID: integer("id").primary_key(),
///             NUMBER: integer("number"),
///             OWNER: reference("owner", "User").nullable(),
///         },
///         collections: {
///             TAGS: "tags" => "Tag" via "item",
///         }
///     }
/// );
/// ```
///
/// Each field is written as a [`crate::Field`] constructor call followed by
/// any number of builder calls. This expands to:
///
/// ```ignore
/// pub mod item {
///     pub const NAME: &str = "Item";
///     pub const ID: &str = "id";
///     pub const NUMBER: &str = "number";
///     pub const OWNER: &str = "owner";
///     pub const TAGS: &str = "tags";
///
///     pub fn entity() -> quarry_schema::Entity { /* ... */ }
///     pub fn descriptor(
///         registry: &quarry_schema::Registry,
///     ) -> quarry_schema::Result<Arc<quarry_schema::EntityDescriptor>> { /* ... */ }
/// }
/// ```
///
/// # Usage
///
/// ```
/// use quarry_schema::{define_entity, Registry};
///
/// define_entity!(
///     item {
///         name: "Item",
///         table: "items",
///         fields: {
///             ID: integer("id").primary_key(),
///             NUMBER: integer("number").nullable(),
///         }
///     }
/// );
///
/// let registry = Registry::new();
/// let descriptor = item::descriptor(&registry).unwrap();
/// assert_eq!(descriptor.table(), "items");
/// assert!(descriptor.field(item::NUMBER).unwrap().nullable());
/// ```
#[macro_export]
macro_rules! define_entity {
    (
        $module:ident {
            name: $name:literal,
            $(table: $table:literal,)?
            $(schema: $schema:literal,)?
            fields: {
                $(
                    $field:ident : $ctor:ident ( $prop:literal $(, $arg:expr)* )
                        $(. $method:ident ( $($margs:expr),* ))*
                ),* $(,)?
            }
            $(, collections: {
                $($collection:ident : $cprop:literal => $target:literal via $via:literal),* $(,)?
            })?
            $(,)?
        }
    ) => {
        pub mod $module {
            pub const NAME: &str = $name;

            $(
                pub const $field: &str = $prop;
            )*

            $($(
                pub const $collection: &str = $cprop;
            )*)?

            pub fn entity() -> $crate::Entity {
                $crate::Entity::new(NAME)
                    $(.table($table))?
                    $(.schema($schema))?
                    $(
                        .field($crate::Field::$ctor($prop $(, $arg)*) $(.$method($($margs),*))*)
                    )*
                    $($(
                        .has_many($cprop, $target, $via)
                    )*)?
            }

            pub fn descriptor(
                registry: &$crate::Registry,
            ) -> $crate::Result<::std::sync::Arc<$crate::EntityDescriptor>> {
                entity().define(registry)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{ColumnKind, Registry, Relation};

    define_entity!(
        user {
            name: "User",
            schema: "app",
            fields: {
                ID: big_integer("id").primary_key(),
                DISPLAY_NAME: text("displayName").max_length(40),
            },
            collections: {
                ITEMS: "items" => "Item" via "owner",
            }
        }
    );

    define_entity!(
        item {
            name: "Item",
            fields: {
                ID: integer("id").primary_key(),
                PRICE: decimal("price", 10, 2).default(0),
                OWNER: reference("owner", "User").column("owner_id").nullable(),
            }
        }
    );

    #[test]
    fn test_define_entity_generates_module() {
        assert_eq!(user::NAME, "User");
        assert_eq!(user::DISPLAY_NAME, "displayName");
        assert_eq!(user::ITEMS, "items");

        let registry = Registry::new();
        let users = user::descriptor(&registry).unwrap();
        let items = item::descriptor(&registry).unwrap();

        assert_eq!(users.qualified_table(), "app.user");
        assert_eq!(users.field(user::DISPLAY_NAME).unwrap().column(), "display_name");
        assert!(matches!(users.relation(user::ITEMS), Some(Relation::ToMany(_))));

        let owner = items.field(item::OWNER).unwrap();
        assert_eq!(owner.column(), "owner_id");
        assert_eq!(owner.foreign_key().unwrap().table, "app.user");
        assert_eq!(
            items.field(item::PRICE).unwrap().kind(),
            &ColumnKind::Decimal {
                precision: 10,
                scale: 2
            }
        );
    }
}
