//! Entity, field and value model for the quarry query builder.
//!
//! Entities are declared with the [`Entity`] and [`Field`] builders (or the
//! [`define_entity!`] macro), checked once by a [`Registry`], and shared as
//! immutable [`EntityDescriptor`]s afterwards.

pub mod entity;
pub mod error;
pub mod export;
pub mod field;
pub mod kind;
pub mod macros;
pub mod naming;
pub mod registry;
pub mod value;

pub use entity::{Collection, Entity, EntityDescriptor, Relation};
pub use error::{Result, SchemaError};
pub use export::ColumnInfo;
pub use field::{Check, Field, FieldDescriptor, ForeignKey};
pub use kind::{ColumnKind, Dialect, IntegerSize, MAX_DECIMAL_PRECISION};
pub use registry::Registry;
pub use value::{Value, TIME_FORMAT};
