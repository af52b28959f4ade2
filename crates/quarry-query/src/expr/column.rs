//! Column references bound to one table of one query.

use std::sync::Arc;

use quarry_schema::{EntityDescriptor, FieldDescriptor, Value};

use crate::{
    condition::{Comparison, Condition, Operand, Operator},
    expr::{Aggregate, Expr},
    table::TableId,
};

/// A field of a registered table.
///
/// Obtained from [`crate::Table::col`]; only valid inside the query whose
/// builder produced the table.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub(crate) table: TableId,
    pub(crate) entity: Arc<EntityDescriptor>,
    pub(crate) index: usize,
}

impl ColumnRef {
    pub const fn table(&self) -> TableId {
        self.table
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    pub fn field(&self) -> &FieldDescriptor {
        &self.entity.fields()[self.index]
    }

    pub fn property(&self) -> &str {
        self.field().property()
    }

    fn compare(&self, operator: Operator, right: Operand) -> Condition {
        Condition::compare(Comparison {
            left: self.clone(),
            operator,
            right,
        })
    }

    /// `=`, or `IS NULL` when compared with a null value.
    pub fn eq(&self, rhs: impl Into<Expr>) -> Condition {
        let rhs = rhs.into();
        if rhs.is_null() {
            return self.is_null();
        }
        self.compare(Operator::Eq, Operand::Expr(rhs))
    }

    /// `<>`, or `IS NOT NULL` when compared with a null value.
    pub fn ne(&self, rhs: impl Into<Expr>) -> Condition {
        let rhs = rhs.into();
        if rhs.is_null() {
            return self.is_not_null();
        }
        self.compare(Operator::Ne, Operand::Expr(rhs))
    }

    pub fn gt(&self, rhs: impl Into<Expr>) -> Condition {
        self.compare(Operator::Gt, Operand::Expr(rhs.into()))
    }

    pub fn gte(&self, rhs: impl Into<Expr>) -> Condition {
        self.compare(Operator::Gte, Operand::Expr(rhs.into()))
    }

    pub fn lt(&self, rhs: impl Into<Expr>) -> Condition {
        self.compare(Operator::Lt, Operand::Expr(rhs.into()))
    }

    pub fn lte(&self, rhs: impl Into<Expr>) -> Condition {
        self.compare(Operator::Lte, Operand::Expr(rhs.into()))
    }

    /// `LIKE`; the pattern is passed through as-is.
    pub fn like(&self, pattern: impl Into<Expr>) -> Condition {
        self.compare(Operator::Like, Operand::Expr(pattern.into()))
    }

    pub fn not_like(&self, pattern: impl Into<Expr>) -> Condition {
        self.compare(Operator::NotLike, Operand::Expr(pattern.into()))
    }

    pub fn in_list<I, T>(&self, values: I) -> Condition
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.compare(Operator::In, Operand::List(values))
    }

    pub fn not_in<I, T>(&self, values: I) -> Condition
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.compare(Operator::NotIn, Operand::List(values))
    }

    pub fn is_null(&self) -> Condition {
        self.compare(Operator::IsNull, Operand::None)
    }

    pub fn is_not_null(&self) -> Condition {
        self.compare(Operator::IsNotNull, Operand::None)
    }

    pub fn count(&self) -> Expr {
        Expr::Aggregate(Aggregate::Count, self.clone())
    }

    pub fn sum(&self) -> Expr {
        Expr::Aggregate(Aggregate::Sum, self.clone())
    }

    pub fn min(&self) -> Expr {
        Expr::Aggregate(Aggregate::Min, self.clone())
    }

    pub fn max(&self) -> Expr {
        Expr::Aggregate(Aggregate::Max, self.clone())
    }

    pub fn avg(&self) -> Expr {
        Expr::Aggregate(Aggregate::Avg, self.clone())
    }

    pub(crate) fn same_as(&self, other: &ColumnRef) -> bool {
        self.table == other.table
            && self.index == other.index
            && Arc::ptr_eq(&self.entity, &other.entity)
    }

    /// Validates and normalizes a value compared against or assigned to
    /// this column.
    pub(crate) fn accept(&self, value: Value) -> quarry_schema::Result<Value> {
        self.field().set(value)
    }
}
