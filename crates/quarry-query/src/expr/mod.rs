//! Expressions that can appear in selections, comparisons and assignments.

pub mod column;

use chrono::NaiveDateTime;
use quarry_schema::Value;

pub use column::ColumnRef;

/// Aggregate functions usable in a selection or sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl Aggregate {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Avg => "AVG",
        }
    }
}

/// A named placeholder declared while building a template.
///
/// Parameters are bound by position: the first declared parameter takes
/// the first argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub(crate) index: usize,
    pub(crate) name: String,
}

impl Param {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Column(ColumnRef),
    Value(Value),
    Param(Param),
    /// `COUNT(*)`
    CountAll,
    Aggregate(Aggregate, ColumnRef),
}

impl Expr {
    /// The column this expression reads, if it reads exactly one.
    pub fn column(&self) -> Option<&ColumnRef> {
        match self {
            Self::Column(column) | Self::Aggregate(_, column) => Some(column),
            _ => None,
        }
    }

    pub(crate) const fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }
}

impl From<ColumnRef> for Expr {
    fn from(column: ColumnRef) -> Self {
        Self::Column(column)
    }
}

impl From<&ColumnRef> for Expr {
    fn from(column: &ColumnRef) -> Self {
        Self::Column(column.clone())
    }
}

impl From<Param> for Expr {
    fn from(param: Param) -> Self {
        Self::Param(param)
    }
}

impl From<&Param> for Expr {
    fn from(param: &Param) -> Self {
        Self::Param(param.clone())
    }
}

macro_rules! expr_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(value: $ty) -> Self {
                    Self::Value(value.into())
                }
            }
        )*
    };
}

expr_from_value!(
    Value,
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    String,
    &str,
    NaiveDateTime,
);

impl<T: Into<Value>> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        Self::Value(value.into())
    }
}
