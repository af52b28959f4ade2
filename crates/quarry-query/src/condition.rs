//! The condition tree behind `WHERE` clauses.
//!
//! Conditions are always kept collapsed: a group never directly contains a
//! group of the same combinator, empty groups disappear, a group with a single
//! child is replaced by that child, and `NOT (NOT x)` is `x`. The rules are
//! applied every time a tree is combined, so `(a AND b) AND c` and
//! `a AND b AND c` produce the same tree and render to the same text.

use std::ops::{BitAnd, BitOr, Not};

use crate::expr::{ColumnRef, Expr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Whether the right-hand side is checked against the column's field.
    /// Patterns are free-form text and are not.
    pub const fn validates_operand(self) -> bool {
        !matches!(self, Self::Like | Self::NotLike)
    }
}

#[derive(Debug, Clone)]
pub enum Operand {
    /// Unary operators (`IS NULL`).
    None,
    Expr(Expr),
    List(Vec<Expr>),
}

/// `column <operator> operand`
#[derive(Debug, Clone)]
pub struct Comparison {
    pub(crate) left: ColumnRef,
    pub(crate) operator: Operator,
    pub(crate) right: Operand,
}

impl Comparison {
    pub fn left(&self) -> &ColumnRef {
        &self.left
    }

    pub const fn operator(&self) -> Operator {
        self.operator
    }

    pub fn right(&self) -> &Operand {
        &self.right
    }

    pub(crate) fn columns(&self) -> impl Iterator<Item = &ColumnRef> {
        let right: Vec<&ColumnRef> = match &self.right {
            Operand::None => Vec::new(),
            Operand::Expr(expr) => expr.column().into_iter().collect(),
            Operand::List(list) => list.iter().filter_map(Expr::column).collect(),
        };
        std::iter::once(&self.left).chain(right)
    }
}

/// One node of a collapsed condition tree.
#[derive(Debug, Clone)]
pub enum Node {
    Compare(Comparison),
    /// Conjunction. An empty conjunction is the absent condition.
    All(Vec<Node>),
    Any(Vec<Node>),
    Not(Box<Node>),
}

impl Node {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::All(children) | Self::Any(children) if children.is_empty())
    }

    fn combine(any: bool, children: impl IntoIterator<Item = Node>) -> Node {
        let mut flat = Vec::new();
        for child in children {
            match child {
                child if child.is_empty() => {}
                Node::Any(inner) if any => flat.extend(inner),
                Node::All(inner) if !any => flat.extend(inner),
                other => flat.push(other),
            }
        }

        if flat.len() == 1 {
            if let Some(only) = flat.pop() {
                return only;
            }
        }
        if any {
            Node::Any(flat)
        } else {
            Node::All(flat)
        }
    }

    fn negate(self) -> Node {
        match self {
            Node::Not(inner) => *inner,
            empty if empty.is_empty() => empty,
            other => Node::Not(Box::new(other)),
        }
    }

    pub(crate) fn visit_mut<E>(
        &mut self,
        f: &mut impl FnMut(&mut Comparison) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Node::Compare(comparison) => f(comparison),
            Node::All(children) | Node::Any(children) => {
                for child in children {
                    child.visit_mut(&mut *f)?;
                }
                Ok(())
            }
            Node::Not(inner) => inner.visit_mut(f),
        }
    }
}

/// A boolean predicate built from column comparisons.
///
/// ```ignore
/// let cond = name.eq("Gabe") | color.eq("purple");
/// let both = Condition::all([age.gt(18), cond]);
/// ```
#[derive(Debug, Clone)]
pub struct Condition(pub(crate) Node);

impl Condition {
    pub(crate) fn compare(comparison: Comparison) -> Self {
        Self(Node::Compare(comparison))
    }

    /// The condition that always holds; renders no `WHERE` clause.
    pub fn empty() -> Self {
        Self(Node::All(Vec::new()))
    }

    /// Conjunction of every condition.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self(Node::combine(false, conditions.into_iter().map(|c| c.0)))
    }

    /// Disjunction of every condition.
    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self(Node::combine(true, conditions.into_iter().map(|c| c.0)))
    }

    pub fn and(self, other: Condition) -> Self {
        Self(Node::combine(false, [self.0, other.0]))
    }

    pub fn or(self, other: Condition) -> Self {
        Self(Node::combine(true, [self.0, other.0]))
    }

    pub fn negate(self) -> Self {
        Self(self.0.negate())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn node(&self) -> &Node {
        &self.0
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::empty()
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        self.and(rhs)
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        self.or(rhs)
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        self.negate()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quarry_schema::{Entity, Field, Registry};

    use super::*;
    use crate::table::TableId;

    fn columns() -> (ColumnRef, ColumnRef, ColumnRef) {
        let registry = Registry::new();
        let person = Entity::new("Person")
            .field(Field::integer("id").primary_key())
            .field(Field::text("name"))
            .field(Field::integer("age"))
            .define(&registry)
            .unwrap();
        let col = |index| ColumnRef {
            table: TableId(0),
            entity: Arc::clone(&person),
            index,
        };
        (col(0), col(1), col(2))
    }

    fn shape(node: &Node) -> String {
        match node {
            Node::Compare(c) => c.left.property().to_string(),
            Node::All(children) => format!(
                "All({})",
                children.iter().map(shape).collect::<Vec<_>>().join(",")
            ),
            Node::Any(children) => format!(
                "Any({})",
                children.iter().map(shape).collect::<Vec<_>>().join(",")
            ),
            Node::Not(inner) => format!("Not({})", shape(inner)),
        }
    }

    #[test]
    fn test_nested_conjunction_flattens() {
        let (id, name, age) = columns();
        let nested = Condition::all([Condition::all([id.eq(1), name.eq("x")]), age.gt(3)]);
        let flat = Condition::all([id.eq(1), name.eq("x"), age.gt(3)]);
        assert_eq!(shape(nested.node()), "All(id,name,age)");
        assert_eq!(shape(nested.node()), shape(flat.node()));
    }

    #[test]
    fn test_singleton_and_empty_groups_collapse() {
        let (id, name, _) = columns();
        let single = Condition::any([id.eq(1)]);
        assert_eq!(shape(single.node()), "id");

        let with_empty = Condition::all([Condition::empty(), name.eq("x"), Condition::any([])]);
        assert_eq!(shape(with_empty.node()), "name");
        assert!(Condition::all([]).is_empty());
    }

    #[test]
    fn test_mixed_combinators_nest() {
        let (id, name, age) = columns();
        let cond = (id.eq(1) & name.eq("x")) | age.gt(3) | age.lt(1);
        assert_eq!(shape(cond.node()), "Any(All(id,name),age,age)");
    }

    #[test]
    fn test_double_negation_collapses() {
        let (id, _, _) = columns();
        let cond = !!id.eq(1);
        assert_eq!(shape(cond.node()), "id");
        assert_eq!(shape((!id.eq(1)).node()), "Not(id)");
        assert!((!Condition::empty()).is_empty());
    }

    #[test]
    fn test_eq_null_becomes_is_null() {
        let (_, name, _) = columns();
        let cond = name.eq(None::<String>);
        match cond.node() {
            Node::Compare(c) => assert_eq!(c.operator(), Operator::IsNull),
            other => panic!("unexpected node {other:?}"),
        }
        match name.ne(quarry_schema::Value::Null).node() {
            Node::Compare(c) => assert_eq!(c.operator(), Operator::IsNotNull),
            other => panic!("unexpected node {other:?}"),
        }
    }
}
