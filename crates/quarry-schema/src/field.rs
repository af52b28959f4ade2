//! Field descriptors and the builder used to declare them.

use std::{fmt, sync::Arc};

use crate::{
    error::{Result, SchemaError},
    kind::{ColumnKind, Dialect, IntegerSize},
    value::Value,
};

/// A pure, caller-supplied check run after the kind's own validation.
///
/// Checks may run several times for the same value, so they must not have
/// side effects.
pub type Check = Arc<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;

/// Where a to-one reference column points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Name of the referenced entity.
    pub entity: String,
    /// Schema-qualified table name of the referenced entity.
    pub table: String,
    /// Primary key column of the referenced entity.
    pub column: String,
}

/// Describes one stored column of an entity.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub(crate) property: String,
    pub(crate) column: String,
    pub(crate) kind: ColumnKind,
    pub(crate) nullable: bool,
    pub(crate) primary_key: bool,
    pub(crate) default: Option<Value>,
    pub(crate) foreign: Option<ForeignKey>,
    pub(crate) check: Option<Check>,
}

impl FieldDescriptor {
    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub const fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub const fn nullable(&self) -> bool {
        self.nullable
    }

    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub const fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// The referenced entity, for to-one reference columns.
    pub const fn foreign_key(&self) -> Option<&ForeignKey> {
        self.foreign.as_ref()
    }

    pub fn datatype(&self, dialect: Dialect) -> String {
        self.kind.datatype(dialect)
    }

    /// Validates and normalizes a value destined for this column.
    ///
    /// This is the field's `set` coercion: it never touches shared state and
    /// can be re-run freely.
    pub fn set(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(self.invalid("value cannot be null"))
            };
        }

        let value = self.kind.validate(value).map_err(|e| self.invalid(e))?;
        if let Some(check) = &self.check {
            check(&value).map_err(|e| self.invalid(e))?;
        }
        Ok(value)
    }

    /// Converts a value read back from a `dialect` driver into its logical form.
    pub fn get(&self, dialect: Dialect, value: Value) -> Value {
        if value.is_null() {
            return value;
        }
        self.kind.decode(dialect, value)
    }

    /// Encodes an already validated value for a `dialect` driver.
    pub fn encode(&self, dialect: Dialect, value: Value) -> Value {
        if value.is_null() {
            return value;
        }
        self.kind.encode(dialect, value)
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::Validation {
            property: self.property.clone(),
            index: None,
            reason: reason.into(),
        }
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("property", &self.property)
            .field("column", &self.column)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .field("primary_key", &self.primary_key)
            .field("default", &self.default)
            .field("foreign", &self.foreign)
            .field("check", &self.check.is_some())
            .finish()
    }
}

/// Declares a field on an [`crate::Entity`].
///
/// ```
/// use quarry_schema::Field;
///
/// let name = Field::text("name").max_length(64).nullable();
/// let owner = Field::reference("owner", "User").column("owner_id");
/// ```
#[derive(Clone)]
pub struct Field {
    pub(crate) property: String,
    pub(crate) column: Option<String>,
    pub(crate) kind: Option<ColumnKind>,
    pub(crate) nullable: bool,
    pub(crate) primary_key: bool,
    pub(crate) default: Option<Value>,
    pub(crate) references: Option<String>,
    pub(crate) check: Option<Check>,
}

impl Field {
    pub fn new(property: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::blank(property.into())
        }
    }

    fn blank(property: String) -> Self {
        Self {
            property,
            column: None,
            kind: None,
            nullable: false,
            primary_key: false,
            default: None,
            references: None,
            check: None,
        }
    }

    pub fn integer(property: impl Into<String>) -> Self {
        Self::new(property, ColumnKind::Integer(IntegerSize::Regular))
    }

    pub fn small_integer(property: impl Into<String>) -> Self {
        Self::new(property, ColumnKind::Integer(IntegerSize::Small))
    }

    pub fn big_integer(property: impl Into<String>) -> Self {
        Self::new(property, ColumnKind::Integer(IntegerSize::Big))
    }

    pub fn real(property: impl Into<String>) -> Self {
        Self::new(property, ColumnKind::Real)
    }

    pub fn decimal(property: impl Into<String>, precision: u8, scale: u8) -> Self {
        Self::new(property, ColumnKind::Decimal { precision, scale })
    }

    pub fn text(property: impl Into<String>) -> Self {
        Self::new(property, ColumnKind::Text { max_length: None })
    }

    pub fn boolean(property: impl Into<String>) -> Self {
        Self::new(property, ColumnKind::Boolean)
    }

    pub fn time(property: impl Into<String>) -> Self {
        Self::new(property, ColumnKind::Time)
    }

    /// A to-one reference to `entity`, stored as a column typed like the
    /// target's primary key.
    pub fn reference(property: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            references: Some(entity.into()),
            ..Self::blank(property.into())
        }
    }

    /// Overrides the storage column name (defaults to the snake-cased property).
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Declares the storage kind explicitly. For references this must agree
    /// with the target's primary key.
    pub fn kind(mut self, kind: ColumnKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Limits text columns to `max` characters. Has no effect on other kinds.
    pub fn max_length(mut self, max: u32) -> Self {
        if let Some(ColumnKind::Text { max_length }) = &mut self.kind {
            *max_length = Some(max);
        }
        self
    }

    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }
}
