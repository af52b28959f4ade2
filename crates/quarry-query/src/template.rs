//! Queries built once and executed many times.

use std::sync::Arc;

use quarry_schema::{Registry, Value};
use tracing::debug;

use crate::{
    context::QueryContext,
    driver::Driver,
    error::{QueryError, Result},
    expr::Param,
    generator::{Generator, Rendered},
    query::Query,
    statement::Statement,
};

/// A query whose text is rendered once and re-bound for every call.
///
/// Parameters are declared with [`QueryContext::param`] and used wherever a
/// value would go. Binding only substitutes values: the table graph, the
/// condition tree and the SQL text stay the same for every argument list.
///
/// ```ignore
/// let by_number = Template::build(&registry, GenericGenerator, |q| {
///     let item = q.table(&item);
///     let number = q.param("number");
///     q.filter(item.col("number")?.eq(&number))
/// })?;
///
/// let first = by_number.bind([3])?;
/// let second = by_number.bind([4])?;
/// assert_eq!(first.text(), second.text());
/// ```
pub struct Template {
    query: Query,
    generator: Arc<dyn Generator>,
    rendered: Rendered,
}

impl Template {
    pub fn build<G, F>(registry: &Registry, generator: G, build: F) -> Result<Template>
    where
        G: Generator + 'static,
        F: FnOnce(&mut QueryContext<'_>) -> Result<()>,
    {
        let query = Query::build(registry, build)?;
        Self::new(query, Arc::new(generator))
    }

    /// Renders `query` once with `generator`.
    pub fn new(query: Query, generator: Arc<dyn Generator>) -> Result<Template> {
        let rendered = generator.render(&query, false)?;
        debug!(
            dialect = %generator.dialect(),
            params = query.params().len(),
            "prepared template"
        );
        Ok(Self {
            query,
            generator,
            rendered,
        })
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn params(&self) -> &[Param] {
        self.query.params()
    }

    /// Placeholder SQL shared by every binding.
    pub fn text(&self) -> &str {
        self.rendered.text()
    }

    /// Binds one argument per declared parameter, in declaration order.
    pub fn bind<I>(&self, args: I) -> Result<Statement>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let args: Vec<Value> = args.into_iter().map(Into::into).collect();
        let expected = self.query.params().len();
        if args.len() != expected {
            return Err(QueryError::Arity {
                expected,
                got: args.len(),
            });
        }
        self.rendered.bind(self.generator.as_ref(), &args)
    }

    /// Binds `args` and runs the statement through `driver`.
    pub async fn fetch<D, I>(&self, driver: &D, args: I) -> Result<serde_json::Value>
    where
        D: Driver,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let statement = self.bind(args)?;
        self.query
            .run(driver, self.generator.as_ref(), statement)
            .await
    }
}

#[cfg(test)]
mod tests {
    use quarry_schema::SchemaError;

    use super::*;
    use crate::{fixtures::schema, generator::PostgresGenerator, GenericGenerator};

    #[test]
    fn test_bindings_share_text() {
        let s = schema();
        let template = Template::build(&s.registry, PostgresGenerator, |q| {
            let item = q.table(&s.item);
            let min = q.param("min");
            let max = q.param("max");
            let number = item.col("number")?;
            q.filter(number.gte(&min) & number.lte(&max))?;
            q.select(number)
        })
        .unwrap();

        let expected = r#"SELECT "item"."number" FROM "item" WHERE "item"."number" >= $1 AND "item"."number" <= $2"#;
        assert_eq!(template.text(), expected);

        let first = template.bind([1, 5]).unwrap();
        let second = template.bind([2, 9]).unwrap();
        assert_eq!(first.text(), expected);
        assert_eq!(second.text(), expected);
        assert_eq!(first.params(), &[Value::Integer(1), Value::Integer(5)]);
        assert_eq!(
            second.to_string(),
            r#"SELECT "item"."number" FROM "item" WHERE "item"."number" >= 2 AND "item"."number" <= 9"#
        );
    }

    #[test]
    fn test_repeated_param_binds_every_slot() {
        let s = schema();
        let template = Template::build(&s.registry, GenericGenerator, |q| {
            let foo = q.table(&s.foo);
            let value = q.param("value");
            let again = q.param("value");
            q.filter_any([
                foo.col("value")?.eq(&value),
                foo.col("id")?.eq(&again),
            ])
        })
        .unwrap();

        assert_eq!(template.params().len(), 1);
        let statement = template.bind([7]).unwrap();
        assert_eq!(statement.params(), &[Value::Integer(7), Value::Integer(7)]);
    }

    #[test]
    fn test_arity_is_checked() {
        let s = schema();
        let template = Template::build(&s.registry, GenericGenerator, |q| {
            let item = q.table(&s.item);
            let number = q.param("number");
            q.filter(item.col("number")?.eq(&number))
        })
        .unwrap();

        assert!(matches!(
            template.bind(Vec::<Value>::new()),
            Err(QueryError::Arity { expected: 1, got: 0 })
        ));
        assert!(matches!(
            template.bind([1, 2]),
            Err(QueryError::Arity { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_arguments_are_validated_at_bind() {
        let s = schema();
        let template = Template::build(&s.registry, GenericGenerator, |q| {
            let person = q.table(&s.person);
            let name = q.param("name");
            q.filter(person.col("name")?.eq(&name))
        })
        .unwrap();

        assert!(template.bind(["Gabe"]).is_ok());
        let err = template.bind(["x".repeat(21)]).unwrap_err();
        assert!(matches!(
            err,
            QueryError::Schema(SchemaError::Validation { ref property, .. }) if property == "name"
        ));
    }

    #[test]
    fn test_insert_template() {
        let s = schema();
        let template = Template::build(&s.registry, GenericGenerator, |q| {
            let person = q.table(&s.person);
            let name = q.param("name");
            q.insert(&person, [("name", &name)])
        })
        .unwrap();

        assert_eq!(template.text(), "INSERT INTO person (name) VALUES (?)");
        assert_eq!(
            template.bind(["Ann"]).unwrap().to_string(),
            "INSERT INTO person (name) VALUES ('Ann')"
        );
    }
}
