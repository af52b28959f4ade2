//! The builder-facing side of a query.
//!
//! A [`QueryContext`] is handed to the callback given to
//! [`crate::Query::build`]. Everything the callback does is recorded in call
//! order: tables get their aliases and positions as they are registered,
//! values are validated against their columns as soon as they are supplied,
//! and relationship traversal adds joins on the fly. When the callback
//! returns, the context checks the join graph and the statement shape and
//! freezes into a [`Query`].

use std::{
    collections::{BTreeSet, HashMap},
    mem,
    sync::Arc,
};

use quarry_schema::{EntityDescriptor, Registry, Relation, Value};
use tracing::{debug, trace};

use crate::{
    condition::{Comparison, Condition, Node, Operand, Operator},
    error::{QueryError, Result},
    expr::{ColumnRef, Expr, Param},
    query::{Assignment, Cte, Insert, Order, Query, SortKey},
    selection::Selection,
    table::{JoinKind, Table, TableId, TableRef},
};

pub struct QueryContext<'r> {
    registry: &'r Registry,
    query: Query,
    roles: HashMap<(String, String), TableId>,
    paths: HashMap<(TableId, String), TableId>,
}

impl<'r> QueryContext<'r> {
    pub(crate) fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            query: Query::default(),
            roles: HashMap::new(),
            paths: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Registers `entity` in its default role, or returns the table already
    /// registered for it.
    pub fn table(&mut self, entity: &Arc<EntityDescriptor>) -> Table {
        self.register(entity, "", false)
    }

    /// Registers `entity` under an explicit role, for self-joins.
    pub fn table_as(&mut self, entity: &Arc<EntityDescriptor>, role: &str) -> Table {
        self.register(entity, role, false)
    }

    /// Looks `name` up in the registry and registers it in its default role.
    pub fn entity(&mut self, name: &str) -> Result<Table> {
        let entity = self.registry.require(name)?;
        Ok(self.table(&entity))
    }

    /// Registers `entity` and joins it with `property = expr` for every pair.
    ///
    /// ```ignore
    /// let foo = q.table(&foo);
    /// let bar = q.join(&bar, [("color", foo.col("color")?)])?;
    /// ```
    pub fn join<I, P, E>(&mut self, entity: &Arc<EntityDescriptor>, on: I) -> Result<Table>
    where
        I: IntoIterator<Item = (P, E)>,
        P: AsRef<str>,
        E: Into<Expr>,
    {
        self.join_with(entity, "", JoinKind::Inner, on)
    }

    pub fn left_join<I, P, E>(&mut self, entity: &Arc<EntityDescriptor>, on: I) -> Result<Table>
    where
        I: IntoIterator<Item = (P, E)>,
        P: AsRef<str>,
        E: Into<Expr>,
    {
        self.join_with(entity, "", JoinKind::Left, on)
    }

    pub fn join_as<I, P, E>(
        &mut self,
        entity: &Arc<EntityDescriptor>,
        role: &str,
        on: I,
    ) -> Result<Table>
    where
        I: IntoIterator<Item = (P, E)>,
        P: AsRef<str>,
        E: Into<Expr>,
    {
        self.join_with(entity, role, JoinKind::Inner, on)
    }

    /// Adds join conditions to a registered table. `condition` must be a
    /// comparison or a conjunction of comparisons.
    pub fn on(&mut self, table: &Table, condition: Condition) -> Result<()> {
        self.check_table(table)?;
        let comparisons = match condition.0 {
            Node::Compare(comparison) => vec![comparison],
            Node::All(children) => children
                .into_iter()
                .map(|child| match child {
                    Node::Compare(comparison) => Ok(comparison),
                    _ => Err(self.invalid_join(table.id, "only AND-ed comparisons can join tables")),
                })
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(self.invalid_join(table.id, "only AND-ed comparisons can join tables")),
        };
        for comparison in comparisons {
            self.attach(table.id, comparison)?;
        }
        Ok(())
    }

    /// Follows a relationship property of `from`, joining its target.
    ///
    /// To-one properties join the target on its primary key; collections
    /// join the target on its `via` reference back to `from`. Following the
    /// same property of the same table twice returns the same table, while
    /// reaching an entity again through a different path (including a cycle
    /// back to an ancestor) joins a fresh copy of it.
    pub fn relate(&mut self, from: &Table, property: &str) -> Result<Table> {
        self.check_table(from)?;
        let key = (from.id, property.to_string());
        if let Some(&id) = self.paths.get(&key) {
            trace!(property, alias = %self.query.tables[id.0].alias, "reusing related table");
            return Ok(self.query.tables[id.0].handle());
        }

        let source = &self.query.tables[from.id.0];
        let source_alias = source.alias.clone();
        let source_left = source.kind == JoinKind::Left;

        let not_a_relation = || {
            if from.entity.field(property).is_some() {
                QueryError::NotARelation {
                    entity: from.entity.name().to_string(),
                    property: property.to_string(),
                }
            } else {
                QueryError::UnknownProperty {
                    entity: from.entity.name().to_string(),
                    property: property.to_string(),
                }
            }
        };

        let role = format!("{source_alias}.{property}");
        let (target, kind, comparison) = match from.entity.relation(property) {
            Some(Relation::ToOne(field)) => {
                let foreign = field.foreign_key().ok_or_else(not_a_relation)?;
                let entity = self.resolve_entity(&from.entity, &foreign.entity)?;
                let kind = if field.nullable() || source_left {
                    JoinKind::Left
                } else {
                    JoinKind::Inner
                };
                let left = from.col(property)?;
                let target = self.push_table(&entity, role, false);
                let comparison = Comparison {
                    left,
                    operator: Operator::Eq,
                    right: Operand::Expr(Expr::Column(target.key())),
                };
                (target, kind, comparison)
            }
            Some(Relation::ToMany(collection)) => {
                let entity = self.resolve_entity(&from.entity, collection.target())?;
                let via = entity.field(collection.via()).filter(|f| {
                    f.foreign_key()
                        .is_some_and(|fk| fk.entity == from.entity.name())
                });
                if via.is_none() {
                    return Err(QueryError::InvalidJoin {
                        alias: role,
                        reason: format!(
                            "`{}.{}` does not reference `{}`",
                            collection.target(),
                            collection.via(),
                            from.entity.name()
                        ),
                    });
                }
                let kind = if source_left {
                    JoinKind::Left
                } else {
                    JoinKind::Inner
                };
                let target = self.push_table(&entity, role, false);
                let comparison = Comparison {
                    left: target.col(collection.via())?,
                    operator: Operator::Eq,
                    right: Operand::Expr(Expr::Column(from.key())),
                };
                (target, kind, comparison)
            }
            None => return Err(not_a_relation()),
        };

        for column in comparison.columns() {
            self.query.tables[column.table.0].used.insert(column.index);
        }
        let table = &mut self.query.tables[target.id.0];
        table.kind = kind;
        table.joins.push(comparison);
        trace!(
            from = %source_alias,
            property,
            alias = %table.alias,
            kind = ?kind,
            "related table"
        );

        self.paths.insert(key, target.id);
        Ok(target)
    }

    /// Declares a template parameter. Declaring the same name twice returns
    /// the first declaration.
    pub fn param(&mut self, name: &str) -> Param {
        if let Some(existing) = self.query.params.iter().find(|p| p.name == name) {
            return existing.clone();
        }
        let param = Param {
            index: self.query.params.len(),
            name: name.to_string(),
        };
        self.query.params.push(param.clone());
        param
    }

    /// Adds a condition; successive filters are AND-ed together.
    pub fn filter(&mut self, condition: Condition) -> Result<()> {
        let mut node = condition.0;
        node.visit_mut(&mut |comparison: &mut Comparison| self.check_comparison(comparison))?;
        let current = mem::take(&mut self.query.condition);
        self.query.condition = current.and(Condition(node));
        Ok(())
    }

    /// Adds the disjunction of `conditions`.
    pub fn filter_any(&mut self, conditions: impl IntoIterator<Item = Condition>) -> Result<()> {
        self.filter(Condition::any(conditions))
    }

    /// Adds the conjunction of `conditions`.
    pub fn filter_all(&mut self, conditions: impl IntoIterator<Item = Condition>) -> Result<()> {
        self.filter(Condition::all(conditions))
    }

    /// Selects a single expression.
    pub fn select(&mut self, expr: impl Into<Expr>) -> Result<()> {
        if !self.query.selection.is_count() {
            return Err(QueryError::Conflict(
                "a selection has already been made".into(),
            ));
        }
        let mut expr = expr.into();
        self.check_expr(&mut expr, None)?;
        self.query.selection = Selection::Single(expr);
        Ok(())
    }

    /// Adds a labelled expression to the selection. Dotted labels nest in
    /// fetched rows.
    pub fn select_named(&mut self, label: &str, expr: impl Into<Expr>) -> Result<()> {
        if label.is_empty() || label.split('.').any(str::is_empty) {
            return Err(QueryError::Conflict(format!(
                "`{label}` is not a valid selection label"
            )));
        }
        let mut expr = expr.into();
        self.check_expr(&mut expr, None)?;

        if self.query.selection.is_count() {
            self.query.selection = Selection::Named(vec![(label.to_string(), expr)]);
            return Ok(());
        }
        match &mut self.query.selection {
            Selection::Count | Selection::Single(_) => Err(QueryError::Conflict(
                "cannot mix a single selection with labelled ones".into(),
            )),
            Selection::Named(entries) => {
                let clash = entries.iter().find(|(existing, _)| {
                    existing == label
                        || label.starts_with(&format!("{existing}."))
                        || existing.starts_with(&format!("{label}."))
                });
                if let Some((existing, _)) = clash {
                    return Err(QueryError::Conflict(format!(
                        "selection label `{label}` clashes with `{existing}`"
                    )));
                }
                entries.push((label.to_string(), expr));
                Ok(())
            }
        }
    }

    /// Assigns `value` to `column`, turning the query into an `UPDATE`.
    pub fn set(&mut self, column: ColumnRef, value: impl Into<Expr>) -> Result<()> {
        self.check_column(&column)?;
        let mut value = value.into();
        if matches!(value, Expr::CountAll | Expr::Aggregate(..)) {
            return Err(QueryError::Conflict(
                "aggregates cannot be assigned".into(),
            ));
        }
        self.check_expr(&mut value, Some(&column))?;

        let assignments = &mut self.query.assignments;
        match assignments.iter_mut().find(|a| a.column.same_as(&column)) {
            Some(existing) => existing.value = value,
            None => assignments.push(Assignment { column, value }),
        }
        Ok(())
    }

    /// Marks `table` for deletion, turning the query into a `DELETE`.
    pub fn delete(&mut self, table: &Table) -> Result<()> {
        self.check_table(table)?;
        if !self.query.deletes.contains(&table.id) {
            self.query.deletes.push(table.id);
        }
        Ok(())
    }

    /// Inserts one row into `table`.
    pub fn insert<I, P, E>(&mut self, table: &Table, row: I) -> Result<()>
    where
        I: IntoIterator<Item = (P, E)>,
        P: AsRef<str>,
        E: Into<Expr>,
    {
        let row = collect_row(row);
        self.insert_rows(table, vec![row], false)
    }

    /// Inserts several rows into `table`. Validation errors carry the index
    /// of the offending row.
    pub fn insert_many<R, I, P, E>(&mut self, table: &Table, rows: R) -> Result<()>
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = (P, E)>,
        P: AsRef<str>,
        E: Into<Expr>,
    {
        let rows: Vec<_> = rows.into_iter().map(collect_row).collect();
        if rows.is_empty() {
            return Err(QueryError::Conflict("insert_many needs at least one row".into()));
        }
        self.insert_rows(table, rows, true)
    }

    /// Exposes `query` as a `WITH` subquery named after `entity`'s table and
    /// registers it as a table of this query.
    pub fn with(&mut self, entity: &Arc<EntityDescriptor>, query: Query) -> Result<Table> {
        if !query.params.is_empty() {
            return Err(QueryError::Conflict(
                "parameters cannot be declared inside a WITH subquery".into(),
            ));
        }
        if self.roles.contains_key(&(entity.name().to_string(), String::new())) {
            return Err(QueryError::Conflict(format!(
                "`{}` is already registered in this query",
                entity.name()
            )));
        }
        let table = self.push_table(entity, String::new(), true);
        self.query.ctes.push(Cte {
            table: table.id,
            query: Box::new(query),
        });
        Ok(table)
    }

    pub fn order_by(&mut self, expr: impl Into<Expr>, order: Order) -> Result<()> {
        let mut expr = expr.into();
        self.check_expr(&mut expr, None)?;
        self.query.sort.push(SortKey { expr, order });
        Ok(())
    }

    pub fn limit(&mut self, limit: u64) {
        self.query.limit = Some(limit);
    }

    pub fn offset(&mut self, offset: u64) {
        self.query.offset = Some(offset);
    }

    pub(crate) fn finish(self) -> Result<Query> {
        let query = self.query;
        if query.tables.is_empty() {
            return Err(QueryError::Empty);
        }

        for table in &query.tables[1..] {
            let linked = table.joins.iter().any(|c| links(c, table.id));
            if !linked {
                return Err(QueryError::MissingJoin {
                    alias: table.alias.clone(),
                });
            }
        }

        let writes = [
            query.insert.is_some(),
            !query.assignments.is_empty(),
            !query.deletes.is_empty(),
        ];
        if writes.iter().filter(|w| **w).count() > 1 {
            return Err(QueryError::Conflict(
                "a query can only do one of insert, update or delete".into(),
            ));
        }
        if writes.contains(&true) && !query.selection.is_count() {
            return Err(QueryError::Conflict(
                "selections only apply to SELECT queries".into(),
            ));
        }
        if query.insert.is_some()
            && (query.tables.len() > 1
                || !query.condition.is_empty()
                || !query.sort.is_empty()
                || query.limit.is_some()
                || query.offset.is_some())
        {
            return Err(QueryError::Conflict(
                "INSERT cannot be combined with joins, filters, ordering or limits".into(),
            ));
        }

        debug!(
            kind = ?query.kind(),
            tables = query.tables.len(),
            params = query.params.len(),
            "built query"
        );
        Ok(query)
    }

    fn register(&mut self, entity: &Arc<EntityDescriptor>, role: &str, cte: bool) -> Table {
        let key = (entity.name().to_string(), role.to_string());
        if let Some(&id) = self.roles.get(&key) {
            return self.query.tables[id.0].handle();
        }
        self.push_table(entity, role.to_string(), cte)
    }

    fn push_table(&mut self, entity: &Arc<EntityDescriptor>, role: String, cte: bool) -> Table {
        let id = TableId(self.query.tables.len());
        let taken = |alias: &str| self.query.tables.iter().any(|t| t.alias == alias);
        let alias = if taken(entity.table()) {
            format!("{}_{}", entity.table(), id.0)
        } else {
            entity.table().to_string()
        };

        trace!(entity = entity.name(), alias = %alias, role = %role, "registered table");
        self.roles.insert((entity.name().to_string(), role.clone()), id);
        self.query.tables.push(TableRef {
            id,
            entity: Arc::clone(entity),
            alias,
            role,
            used: BTreeSet::new(),
            joins: Vec::new(),
            kind: JoinKind::Inner,
            cte,
        });
        self.query.tables[id.0].handle()
    }

    fn join_with<I, P, E>(
        &mut self,
        entity: &Arc<EntityDescriptor>,
        role: &str,
        kind: JoinKind,
        on: I,
    ) -> Result<Table>
    where
        I: IntoIterator<Item = (P, E)>,
        P: AsRef<str>,
        E: Into<Expr>,
    {
        let table = self.register(entity, role, false);
        for (property, expr) in on {
            let comparison = Comparison {
                left: table.col(property.as_ref())?,
                operator: Operator::Eq,
                right: Operand::Expr(expr.into()),
            };
            self.attach(table.id, comparison)?;
        }
        self.query.tables[table.id.0].kind = kind;
        Ok(table)
    }

    fn attach(&mut self, id: TableId, mut comparison: Comparison) -> Result<()> {
        if id.0 == 0 {
            return Err(self.invalid_join(id, "the first table is the root of the query"));
        }
        self.check_comparison(&mut comparison)?;
        if let Some(later) = comparison.columns().find(|c| c.table > id) {
            let reason = format!(
                "`{}` belongs to a table registered after it",
                later.property()
            );
            return Err(self.invalid_join(id, &reason));
        }
        self.query.tables[id.0].joins.push(comparison);
        Ok(())
    }

    fn invalid_join(&self, id: TableId, reason: &str) -> QueryError {
        QueryError::InvalidJoin {
            alias: self.query.tables[id.0].alias.clone(),
            reason: reason.to_string(),
        }
    }

    fn resolve_entity(
        &self,
        source: &Arc<EntityDescriptor>,
        name: &str,
    ) -> Result<Arc<EntityDescriptor>> {
        if source.name() == name {
            return Ok(Arc::clone(source));
        }
        Ok(self.registry.require(name)?)
    }

    fn check_table(&self, table: &Table) -> Result<()> {
        match self.query.tables.get(table.id.0) {
            Some(known) if Arc::ptr_eq(&known.entity, &table.entity) => Ok(()),
            _ => Err(QueryError::ForeignColumn {
                property: table.entity.primary_key().property().to_string(),
            }),
        }
    }

    fn check_column(&mut self, column: &ColumnRef) -> Result<()> {
        let table = self
            .query
            .tables
            .get_mut(column.table.0)
            .filter(|t| Arc::ptr_eq(&t.entity, &column.entity))
            .ok_or_else(|| QueryError::ForeignColumn {
                property: column.property().to_string(),
            })?;
        table.used.insert(column.index);
        Ok(())
    }

    fn check_expr(&mut self, expr: &mut Expr, target: Option<&ColumnRef>) -> Result<()> {
        match expr {
            Expr::Column(column) | Expr::Aggregate(_, column) => self.check_column(column),
            Expr::Value(value) => {
                if let Some(target) = target {
                    *value = target.accept(mem::replace(value, Value::Null))?;
                }
                Ok(())
            }
            Expr::Param(param) => match self.query.params.get(param.index) {
                Some(declared) if declared == param => Ok(()),
                _ => Err(QueryError::Conflict(format!(
                    "parameter `{}` was not declared by this query",
                    param.name
                ))),
            },
            Expr::CountAll => Ok(()),
        }
    }

    fn check_comparison(&mut self, comparison: &mut Comparison) -> Result<()> {
        self.check_column(&comparison.left)?;
        let target = comparison
            .operator
            .validates_operand()
            .then(|| comparison.left.clone());
        match &mut comparison.right {
            Operand::None => Ok(()),
            Operand::Expr(expr) => self.check_expr(expr, target.as_ref()),
            Operand::List(list) => list
                .iter_mut()
                .try_for_each(|expr| self.check_expr(expr, target.as_ref())),
        }
    }

    fn insert_rows(
        &mut self,
        table: &Table,
        rows: Vec<Vec<(String, Expr)>>,
        batch: bool,
    ) -> Result<()> {
        self.check_table(table)?;
        if self.query.insert.is_some() {
            return Err(QueryError::Conflict("rows have already been inserted".into()));
        }

        let entity = Arc::clone(&table.entity);
        let mut provided = BTreeSet::new();
        for (property, _) in rows.iter().flatten() {
            let index = entity
                .field_index(property)
                .ok_or_else(|| QueryError::UnknownProperty {
                    entity: entity.name().to_string(),
                    property: property.clone(),
                })?;
            provided.insert(index);
        }
        let columns: Vec<usize> = entity
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, f)| provided.contains(i) || f.default_value().is_some())
            .map(|(i, _)| i)
            .collect();
        if columns.is_empty() {
            return Err(QueryError::Conflict("nothing to insert".into()));
        }

        let mut checked_rows = Vec::with_capacity(rows.len());
        for (position, row) in rows.into_iter().enumerate() {
            let mut values: Vec<Option<Expr>> = vec![None; columns.len()];
            for (property, expr) in row {
                let slot = entity
                    .field_index(&property)
                    .and_then(|index| columns.iter().position(|&c| c == index));
                if let Some(slot) = slot {
                    values[slot] = Some(expr);
                }
            }

            let mut checked = Vec::with_capacity(columns.len());
            for (slot, value) in values.into_iter().enumerate() {
                let column = table.column(columns[slot]);
                let mut expr = value.unwrap_or_else(|| {
                    Expr::Value(column.field().default_value().cloned().unwrap_or(Value::Null))
                });
                if !matches!(expr, Expr::Value(_) | Expr::Param(_)) {
                    return Err(QueryError::Conflict(
                        "inserted values must be literals or parameters".into(),
                    ));
                }
                self.check_column(&column)?;
                self.check_expr(&mut expr, Some(&column))
                    .map_err(|e| match e {
                        QueryError::Schema(inner) if batch => {
                            QueryError::Schema(inner.at(position))
                        }
                        other => other,
                    })?;
                checked.push(expr);
            }
            checked_rows.push(checked);
        }

        trace!(
            table = entity.name(),
            rows = checked_rows.len(),
            columns = columns.len(),
            "insert rows"
        );
        self.query.insert = Some(Insert {
            table: table.id,
            columns,
            rows: checked_rows,
        });
        Ok(())
    }
}

fn collect_row<I, P, E>(row: I) -> Vec<(String, Expr)>
where
    I: IntoIterator<Item = (P, E)>,
    P: AsRef<str>,
    E: Into<Expr>,
{
    row.into_iter()
        .map(|(property, expr)| (property.as_ref().to_string(), expr.into()))
        .collect()
}

/// Whether `comparison` connects table `id` with a table registered before it.
fn links(comparison: &Comparison, id: TableId) -> bool {
    let mut touches_self = false;
    let mut touches_earlier = false;
    for column in comparison.columns() {
        touches_self |= column.table == id;
        touches_earlier |= column.table < id;
    }
    touches_self && touches_earlier
}
