use quarry_schema::{SchemaError, Value};

use super::*;
use crate::{
    expr::Expr,
    fixtures::{schema, Schema},
    query::Order,
};

fn inline(query: &Query, generator: &dyn Generator) -> String {
    query.statement(generator).unwrap().to_string()
}

fn item_query(s: &Schema) -> Query {
    Query::build(&s.registry, |q| {
        let item = q.table(&s.item);
        let number = item.col("number")?;
        q.filter(number.gt(3))?;
        q.select(number)?;
        q.limit(5);
        Ok(())
    })
    .unwrap()
}

fn joined_update(s: &Schema) -> Query {
    Query::build(&s.registry, |q| {
        let foo = q.table(&s.foo);
        let bar = q.join(&s.bar, [("color", foo.col("color")?)])?;
        q.set(foo.col("value")?, bar.col("value")?)?;
        q.filter(foo.col("color")?.eq("red"))
    })
    .unwrap()
}

fn joined_delete(s: &Schema) -> Query {
    Query::build(&s.registry, |q| {
        let foo = q.table(&s.foo);
        let bar = q.join(&s.bar, [("color", foo.col("color")?)])?;
        q.delete(&foo)?;
        q.filter(bar.col("value")?.gt(10))
    })
    .unwrap()
}

#[test]
fn test_select_with_filter_and_limit() {
    let s = schema();
    let query = item_query(&s);
    let statement = query.statement(&GenericGenerator).unwrap();

    assert_eq!(
        statement.to_string(),
        "SELECT item.number FROM item WHERE item.number > 3 LIMIT 5"
    );
    assert_eq!(
        statement.text(),
        "SELECT item.number FROM item WHERE item.number > ? LIMIT 5"
    );
    assert_eq!(statement.params(), &[Value::Integer(3)]);
}

#[test]
fn test_pretty_output_breaks_clauses() {
    let s = schema();
    let rendered = item_query(&s).render(&GenericGenerator, true).unwrap();
    assert_eq!(
        rendered.text(),
        "SELECT item.number\nFROM item\nWHERE item.number > ?\nLIMIT 5"
    );
}

#[test]
fn test_count_is_default_selection() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        q.table(&s.item);
        Ok(())
    })
    .unwrap();
    assert_eq!(inline(&query, &GenericGenerator), "SELECT COUNT(*) FROM item");
}

#[test]
fn test_root_disjunction() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let person = q.table(&s.person);
        q.filter_any([
            person.col("name")?.eq("Gabe"),
            person.col("color")?.eq("purple"),
        ])
    })
    .unwrap();
    // A lone root group needs no parentheses; WHERE binds looser than OR.
    assert_eq!(
        inline(&query, &GenericGenerator),
        "SELECT COUNT(*) FROM person WHERE person.name = 'Gabe' OR person.color = 'purple'"
    );
}

#[test]
fn test_nested_groups_are_parenthesized() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let person = q.table(&s.person);
        let name = person.col("name")?;
        let color = person.col("color")?;
        q.filter(name.eq("a"))?;
        q.filter_any([color.eq("red"), color.eq("blue") & name.ne("b")])
    })
    .unwrap();
    assert_eq!(
        inline(&query, &GenericGenerator),
        "SELECT COUNT(*) FROM person WHERE person.name = 'a' AND \
         (person.color = 'red' OR (person.color = 'blue' AND person.name <> 'b'))"
    );
}

#[test]
fn test_nested_conjunctions_collapse() {
    let s = schema();
    let build = |nested: bool| {
        Query::build(&s.registry, |q| {
            let person = q.table(&s.person);
            let a = person.col("name")?.eq("a");
            let b = person.col("color")?.eq("b");
            let c = person.col("id")?.gt(1);
            if nested {
                q.filter((a & b) & c)
            } else {
                q.filter_all([a, b, c])
            }
        })
        .unwrap()
    };
    assert_eq!(
        inline(&build(true), &GenericGenerator),
        inline(&build(false), &GenericGenerator)
    );
}

#[test]
fn test_null_comparisons_and_lists() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let person = q.table(&s.person);
        let color = person.col("color")?;
        q.filter(color.eq(Value::Null))?;
        q.filter(!person.col("id")?.in_list([1, 2, 3]))?;
        q.filter(person.col("name")?.in_list(Vec::<&str>::new()))
    })
    .unwrap();
    assert_eq!(
        inline(&query, &GenericGenerator),
        "SELECT COUNT(*) FROM person WHERE person.color IS NULL AND \
         NOT (person.id IN (1, 2, 3)) AND 1 = 0"
    );
}

#[test]
fn test_like_pattern_skips_validation() {
    let s = schema();
    let pattern = format!("{}%", "x".repeat(25));
    let query = Query::build(&s.registry, |q| {
        let person = q.table(&s.person);
        q.filter(person.col("name")?.like(pattern.as_str()))
    })
    .unwrap();
    assert!(inline(&query, &GenericGenerator).ends_with("LIKE 'xxxxxxxxxxxxxxxxxxxxxxxxx%'"));
}

#[test]
fn test_values_are_validated_against_their_column() {
    let s = schema();
    let long = "x".repeat(30);
    let err = Query::build(&s.registry, |q| {
        let person = q.table(&s.person);
        q.filter(person.col("name")?.eq(long.as_str()))
    })
    .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Schema(SchemaError::Validation { ref property, index: None, .. })
            if property == "name"
    ));
}

#[test]
fn test_joined_update_generic() {
    let s = schema();
    let query = joined_update(&s);
    assert_eq!(
        inline(&query, &GenericGenerator),
        "UPDATE foo INNER JOIN bar ON bar.color = foo.color SET value = bar.value \
         WHERE foo.color = 'red'"
    );
    assert_eq!(
        inline(&query, &MySqlGenerator),
        inline(&query, &GenericGenerator)
    );
}

#[test]
fn test_joined_update_postgres() {
    let s = schema();
    let statement = joined_update(&s).statement(&PostgresGenerator).unwrap();
    assert_eq!(
        statement.text(),
        r#"UPDATE "foo" SET "value" = "bar"."value" FROM "bar" WHERE "bar"."color" = "foo"."color" AND "foo"."color" = $1"#
    );
    assert_eq!(statement.params(), &[Value::Text("red".into())]);
}

#[test]
fn test_joined_update_sqlite() {
    let s = schema();
    assert_eq!(
        inline(&joined_update(&s), &SqliteGenerator),
        "UPDATE foo SET value = bar.value FROM bar WHERE bar.color = foo.color \
         AND foo.color = 'red'"
    );
}

#[test]
fn test_update_of_several_tables() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let foo = q.table(&s.foo);
        let bar = q.join(&s.bar, [("color", foo.col("color")?)])?;
        q.set(foo.col("value")?, 1)?;
        q.set(bar.col("value")?, 2)
    })
    .unwrap();
    assert_eq!(
        inline(&query, &GenericGenerator),
        "UPDATE foo INNER JOIN bar ON bar.color = foo.color SET foo.value = 1, bar.value = 2"
    );
    assert!(matches!(
        query.statement(&PostgresGenerator),
        Err(QueryError::Unsupported { .. })
    ));
}

#[test]
fn test_single_table_delete() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let item = q.table(&s.item);
        q.delete(&item)?;
        q.filter(item.col("number")?.lt(0))
    })
    .unwrap();
    let expected = "DELETE FROM item WHERE item.number < 0";
    assert_eq!(inline(&query, &GenericGenerator), expected);
    assert_eq!(inline(&query, &SqliteGenerator), expected);
    assert_eq!(
        query.statement(&PostgresGenerator).unwrap().text(),
        r#"DELETE FROM "item" WHERE "item"."number" < $1"#
    );
}

#[test]
fn test_joined_delete_per_dialect() {
    let s = schema();
    let query = joined_delete(&s);
    assert_eq!(
        inline(&query, &GenericGenerator),
        "DELETE foo FROM foo INNER JOIN bar ON bar.color = foo.color WHERE bar.value > 10"
    );
    assert_eq!(
        query.statement(&PostgresGenerator).unwrap().text(),
        r#"DELETE FROM "foo" USING "bar" WHERE "bar"."color" = "foo"."color" AND "bar"."value" > $1"#
    );
    assert!(matches!(
        query.statement(&SqliteGenerator),
        Err(QueryError::Unsupported { .. })
    ));
}

#[test]
fn test_relate_reuses_paths_and_aliases_repeats() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let member = q.table(&s.member);
        let team = q.relate(&member, "team")?;
        let again = q.relate(&member, "team")?;
        assert_eq!(team.id(), again.id());

        let mentor = q.relate(&member, "mentor")?;
        let mentor_team = q.relate(&mentor, "team")?;
        q.select_named("name", member.col("name")?)?;
        q.select_named("team.name", team.col("name")?)?;
        q.select_named("mentor.team.name", mentor_team.col("name")?)
    })
    .unwrap();

    assert_eq!(query.tables().len(), 4);
    assert_eq!(
        inline(&query, &GenericGenerator),
        "SELECT member.name AS name, team.name AS \"team.name\", \
         team_3.name AS \"mentor.team.name\" FROM member \
         INNER JOIN team ON member.team = team.id \
         LEFT JOIN member AS member_2 ON member.mentor = member_2.id \
         LEFT JOIN team AS team_3 ON member_2.team = team_3.id"
    );
}

#[test]
fn test_relate_to_many() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let team = q.table(&s.team);
        let members = q.relate(&team, "members")?;
        q.filter(members.col("active")?.eq(true))?;
        q.select(team.col("name")?)
    })
    .unwrap();
    assert_eq!(
        inline(&query, &GenericGenerator),
        "SELECT team.name FROM team INNER JOIN member ON member.team = team.id \
         WHERE member.active = TRUE"
    );
    assert!(inline(&query, &MySqlGenerator).ends_with("WHERE member.active = 1"));
}

#[test]
fn test_chained_relate_joins_each_hop_once() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let member = q.table(&s.member);
        let team = q.relate(&member, "team")?;
        let peers = q.relate(&team, "members")?;
        let team_again = q.relate(&member, "team")?;
        assert_eq!(team.id(), team_again.id());

        q.filter(peers.col("active")?.eq(true))?;
        q.select(member.col("name")?)
    })
    .unwrap();

    assert_eq!(query.tables().len(), 3);
    let sql = inline(&query, &GenericGenerator);
    assert_eq!(sql.matches("JOIN team").count(), 1);
    assert_eq!(
        sql,
        "SELECT member.name FROM member \
         INNER JOIN team ON member.team = team.id \
         INNER JOIN member AS member_2 ON member_2.team = team.id \
         WHERE member_2.active = TRUE"
    );
}

#[test]
fn test_self_join_by_role_and_left_join() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let member = q.table(&s.member);
        let mentor = q.join_as(&s.member, "mentor", [("id", member.col("mentor")?)])?;
        assert_ne!(member.id(), mentor.id());
        assert_eq!(q.table_as(&s.member, "mentor").id(), mentor.id());
        assert_eq!(q.table(&s.member).id(), member.id());

        let team = q.left_join(&s.team, [("id", member.col("team")?)])?;
        q.select_named("name", member.col("name")?)?;
        q.select_named("mentor", mentor.col("name")?)?;
        q.select_named("team", team.col("name")?)
    })
    .unwrap();

    assert_eq!(
        inline(&query, &GenericGenerator),
        "SELECT member.name AS name, member_1.name AS mentor, team.name AS team \
         FROM member \
         INNER JOIN member AS member_1 ON member_1.id = member.mentor \
         LEFT JOIN team ON team.id = member.team"
    );
}

#[test]
fn test_schema_qualified_table() {
    let s = schema();
    let order = quarry_schema::Entity::new("Order")
        .schema("shop")
        .field(quarry_schema::Field::integer("id").primary_key())
        .define(&s.registry)
        .unwrap();
    let query = Query::build(&s.registry, |q| {
        let order = q.table(&order);
        q.filter(order.col("id")?.gt(1))
    })
    .unwrap();

    assert_eq!(
        inline(&query, &GenericGenerator),
        r#"SELECT COUNT(*) FROM shop."order" WHERE "order".id > 1"#
    );
    assert_eq!(
        query.statement(&PostgresGenerator).unwrap().text(),
        r#"SELECT COUNT(*) FROM "shop"."order" WHERE "order"."id" > $1"#
    );
}

#[test]
fn test_relate_rejects_plain_fields() {
    let s = schema();
    let err = Query::build(&s.registry, |q| {
        let member = q.table(&s.member);
        q.relate(&member, "name").map(drop)
    })
    .unwrap_err();
    assert!(matches!(err, QueryError::NotARelation { .. }));
}

#[test]
fn test_unjoined_table_is_rejected() {
    let s = schema();
    let err = Query::build(&s.registry, |q| {
        let foo = q.table(&s.foo);
        let bar = q.table(&s.bar);
        q.filter(foo.col("value")?.eq(1) & bar.col("value")?.eq(2))
    })
    .unwrap_err();
    assert!(matches!(err, QueryError::MissingJoin { ref alias } if alias == "bar"));
}

#[test]
fn test_on_attaches_arbitrary_conditions() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let foo = q.table(&s.foo);
        let bar = q.table(&s.bar);
        q.on(&bar, bar.col("color")?.eq(foo.col("color")?) & bar.col("value")?.gt(2))?;
        q.select(bar.col("id")?)
    })
    .unwrap();
    assert_eq!(
        inline(&query, &GenericGenerator),
        "SELECT bar.id FROM foo INNER JOIN bar ON bar.color = foo.color AND bar.value > 2"
    );
}

#[test]
fn test_insert_fills_defaults() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let member = q.table(&s.member);
        q.insert_many(
            &member,
            [
                vec![("name", Expr::from("Ann")), ("team", Expr::from(1))],
                vec![("name", Expr::from("Bo")), ("team", Expr::from(2))],
            ],
        )
    })
    .unwrap();
    assert_eq!(
        inline(&query, &GenericGenerator),
        "INSERT INTO member (name, team, active) VALUES ('Ann', 1, TRUE), ('Bo', 2, TRUE)"
    );
    assert_eq!(
        inline(&query, &SqliteGenerator),
        "INSERT INTO member (name, team, active) VALUES ('Ann', 1, 1), ('Bo', 2, 1)"
    );
}

#[test]
fn test_insert_batch_reports_row_index() {
    let s = schema();
    let long = "x".repeat(30);
    let err = Query::build(&s.registry, |q| {
        let person = q.table(&s.person);
        q.insert_many(&person, [[("name", "ok")], [("name", long.as_str())]])
    })
    .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Schema(SchemaError::Validation { index: Some(1), .. })
    ));
    assert!(err.to_string().contains("at index 1"));
}

#[test]
fn test_insert_cannot_be_filtered() {
    let s = schema();
    let err = Query::build(&s.registry, |q| {
        let item = q.table(&s.item);
        q.insert(&item, [("number", 1)])?;
        q.filter(item.col("number")?.gt(0))
    })
    .unwrap_err();
    assert!(matches!(err, QueryError::Conflict(_)));
}

#[test]
fn test_aggregates_and_ordering() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let item = q.table(&s.item);
        let number = item.col("number")?;
        q.select_named("total", number.sum())?;
        q.select_named("n", Expr::CountAll)?;
        q.order_by(number.max(), Order::Desc)
    })
    .unwrap();
    assert_eq!(
        inline(&query, &GenericGenerator),
        "SELECT SUM(item.number) AS total, COUNT(*) AS n FROM item ORDER BY MAX(item.number) DESC"
    );
}

#[test]
fn test_offset_without_limit() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let item = q.table(&s.item);
        q.select(item.col("number")?)?;
        q.offset(10);
        Ok(())
    })
    .unwrap();
    assert!(inline(&query, &GenericGenerator).ends_with("FROM item OFFSET 10"));
    assert!(inline(&query, &SqliteGenerator).ends_with("FROM item LIMIT -1 OFFSET 10"));
    assert!(inline(&query, &MySqlGenerator)
        .ends_with("FROM item LIMIT 18446744073709551615 OFFSET 10"));
}

#[test]
fn test_with_subquery() {
    let s = schema();
    let recent = Query::build(&s.registry, |q| {
        let item = q.table(&s.item);
        q.select_named("id", item.key())?;
        q.select_named("number", item.col("number")?)?;
        q.filter(item.col("number")?.gte(10))
    })
    .unwrap();
    let query = Query::build(&s.registry, |q| {
        let recent = q.with(&s.item, recent)?;
        q.select(recent.col("number")?)
    })
    .unwrap();
    assert_eq!(
        inline(&query, &GenericGenerator),
        "WITH item AS (SELECT item.id AS id, item.number AS number FROM item \
         WHERE item.number >= 10) SELECT item.number FROM item"
    );
}

#[test]
fn test_reserved_words_are_quoted() {
    let s = schema();
    let user = quarry_schema::Entity::new("User")
        .field(quarry_schema::Field::integer("id").primary_key())
        .field(quarry_schema::Field::integer("order"))
        .define(&s.registry)
        .unwrap();
    let query = Query::build(&s.registry, |q| {
        let user = q.table(&user);
        q.select(user.col("order")?)
    })
    .unwrap();
    assert_eq!(
        inline(&query, &GenericGenerator),
        r#"SELECT "user"."order" FROM "user""#
    );
    assert_eq!(
        inline(&query, &MySqlGenerator),
        "SELECT `user`.`order` FROM `user`"
    );
}

#[test]
fn test_escape_hook_wins_over_quoting() {
    let s = schema();
    let query = item_query(&s);
    let escape = |name: &str| Some(format!("[{name}]"));
    let rendered = GenericGenerator
        .render_with(&query, false, Some(&escape))
        .unwrap();
    assert_eq!(
        rendered.text(),
        "SELECT [item].[number] FROM [item] WHERE [item].[number] > ? LIMIT 5"
    );
}

#[test]
fn test_params_need_a_template() {
    let s = schema();
    let query = Query::build(&s.registry, |q| {
        let item = q.table(&s.item);
        let min = q.param("min");
        q.filter(item.col("number")?.gt(&min))
    })
    .unwrap();
    assert!(matches!(
        query.statement(&GenericGenerator),
        Err(QueryError::UnboundParameter(ref name)) if name == "min"
    ));
}

#[test]
fn test_for_dialect() {
    for dialect in [
        Dialect::Generic,
        Dialect::MySql,
        Dialect::Postgres,
        Dialect::Sqlite,
    ] {
        assert_eq!(for_dialect(dialect).dialect(), dialect);
    }
}
