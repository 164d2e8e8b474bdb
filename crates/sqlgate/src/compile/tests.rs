use super::*;
use crate::ast::{
    Params, Statement, TableRef, Value, and, delete, insert, not, or, param, select, update,
};
use crate::error::GateResult;
use crate::schema::{Column, SchemaBuilder, SchemaRegistry, Table};
use std::sync::Arc;

fn registry() -> Arc<SchemaRegistry> {
    let registry = SchemaBuilder::new()
        .with_table(
            Table::new("users")
                .column(Column::new("id", ColumnType::Integer).with_default())
                .column(Column::new("email", ColumnType::Text))
                .column(Column::new("name", ColumnType::Text).nullable())
                .column(Column::new("age", ColumnType::Integer).nullable())
                .primary_key(&["id"])
                .unique(&["email"]),
        )
        .unwrap()
        .with_table(
            Table::new("posts")
                .column(Column::new("id", ColumnType::Integer).with_default())
                .column(Column::new("user_id", ColumnType::Integer))
                .column(Column::new("title", ColumnType::Text))
                .primary_key(&["id"])
                .foreign_key(&["user_id"], "users", &["id"]),
        )
        .unwrap()
        .freeze()
        .unwrap();
    Arc::new(registry)
}

fn users() -> TableRef {
    TableRef::new("users")
}

fn posts() -> TableRef {
    TableRef::new("posts")
}

fn build<S: Statement>(stmt: S) -> ValidatedStatement {
    build_with(stmt, Params::new())
}

fn build_with<S: Statement>(stmt: S, params: Params) -> ValidatedStatement {
    let built: GateResult<_> = stmt.build_with(registry(), params);
    built.unwrap()
}

fn sql(stmt: &ValidatedStatement, dialect: Dialect) -> String {
    compile(stmt, dialect).unwrap().sql
}

fn unsupported(stmt: &ValidatedStatement, dialect: Dialect) -> &'static str {
    match compile(stmt, dialect).unwrap_err() {
        CompileError::UnsupportedConstruct { dialect: d, construct } => {
            assert_eq!(d, dialect);
            construct
        }
        other => panic!("expected unsupported construct, got {other:?}"),
    }
}

#[test]
fn test_select_by_email_has_one_parameter() {
    let u = users();
    let stmt = build(select(&u).filter(u.col("email").eq("a@b.com")));
    let compiled = compile(&stmt, Dialect::Postgres).unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT "id", "email", "name", "age" FROM "users" WHERE "email" = $1"#
    );
    assert_eq!(compiled.param_count(), 1);
    assert_eq!(
        compiled.slots[0],
        ParamSlot {
            position: 1,
            source: SlotSource::Literal(0),
            column_type: ColumnType::Text,
            sql_type: "TEXT".into(),
        }
    );
    assert_eq!(compiled.columns.len(), 4);
    assert_eq!(
        stmt.arguments(&compiled.slots).unwrap(),
        [Value::from("a@b.com")]
    );
}

#[test]
fn test_dialect_surface_syntax() {
    let u = users();
    let stmt = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("email").eq("a@b.com")),
    );
    assert_eq!(
        sql(&stmt, Dialect::Postgres),
        r#"SELECT "id" FROM "users" WHERE "email" = $1"#
    );
    assert_eq!(
        sql(&stmt, Dialect::Sqlite),
        r#"SELECT "id" FROM "users" WHERE "email" = ?"#
    );
    assert_eq!(
        sql(&stmt, Dialect::MySql),
        "SELECT `id` FROM `users` WHERE `email` = ?"
    );

    let mysql = compile(&stmt, Dialect::MySql).unwrap();
    assert_eq!(mysql.slots[0].sql_type, "VARCHAR(255)");
    assert_eq!(mysql.dialect, Dialect::MySql);
}

#[test]
fn test_compilation_is_deterministic() {
    let u = users();
    let stmt = build_with(
        select(&u)
            .filter(u.col("email").eq(param("e")).or(u.col("age").gt(21)))
            .order_by(u.col("id").asc())
            .limit(5),
        Params::new().bind("e", "x"),
    );
    for dialect in [Dialect::Postgres, Dialect::Sqlite, Dialect::MySql] {
        assert_eq!(compile(&stmt, dialect).unwrap(), compile(&stmt, dialect).unwrap());
    }
}

#[test]
fn test_named_placeholder_reuse() {
    let u = users();
    let stmt = build_with(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("email").eq(param("q")).or(u.col("name").eq(param("q")))),
        Params::new().bind("q", "x"),
    );

    let pg = compile(&stmt, Dialect::Postgres).unwrap();
    assert_eq!(
        pg.sql,
        r#"SELECT "id" FROM "users" WHERE "email" = $1 OR "name" = $1"#
    );
    assert_eq!(pg.param_count(), 1);

    let lite = compile(&stmt, Dialect::Sqlite).unwrap();
    assert_eq!(
        lite.sql,
        r#"SELECT "id" FROM "users" WHERE "email" = ? OR "name" = ?"#
    );
    assert_eq!(lite.param_count(), 2);
    assert!(lite
        .slots
        .iter()
        .all(|s| s.source == SlotSource::Named("q".into())));
    assert_eq!(
        stmt.arguments(&lite.slots).unwrap(),
        [Value::from("x"), Value::from("x")]
    );
}

#[test]
fn test_nested_predicates_parenthesized() {
    let u = users();
    let stmt = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("age").ge(18))
            .filter(u.col("name").is_null().or(u.col("name").like("a%"))),
    );
    assert_eq!(
        sql(&stmt, Dialect::Postgres),
        r#"SELECT "id" FROM "users" WHERE "age" >= $1 AND ("name" IS NULL OR "name" LIKE $2)"#
    );

    let stmt = build(
        select(&u)
            .columns([u.col("id")])
            .filter(not(u.col("age").lt(18).and(u.col("name").is_not_null()))),
    );
    assert_eq!(
        sql(&stmt, Dialect::Postgres),
        r#"SELECT "id" FROM "users" WHERE NOT ("age" < $1 AND "name" IS NOT NULL)"#
    );

    let stmt = build(
        select(&u)
            .columns([u.col("id")])
            .filter(and([u.col("id").eq(1).or(u.col("id").eq(2))])),
    );
    assert_eq!(
        sql(&stmt, Dialect::Postgres),
        r#"SELECT "id" FROM "users" WHERE ("id" = $1 OR "id" = $2)"#
    );
}

#[test]
fn test_empty_conjunctions() {
    let u = users();
    let stmt = build(select(&u).columns([u.col("id")]).filter(and(Vec::new())));
    assert_eq!(
        sql(&stmt, Dialect::Postgres),
        r#"SELECT "id" FROM "users" WHERE 1=1"#
    );
    let stmt = build(select(&u).columns([u.col("id")]).filter(or(Vec::new())));
    assert_eq!(
        sql(&stmt, Dialect::Postgres),
        r#"SELECT "id" FROM "users" WHERE 1=0"#
    );
}

#[test]
fn test_in_lists() {
    let u = users();
    let stmt = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("id").in_list([1, 2, 3])),
    );
    let compiled = compile(&stmt, Dialect::Postgres).unwrap();
    assert_eq!(
        compiled.sql,
        r#"SELECT "id" FROM "users" WHERE "id" IN ($1, $2, $3)"#
    );
    assert_eq!(compiled.param_count(), 3);

    let none = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("id").in_list(Vec::<i64>::new())),
    );
    assert_eq!(
        sql(&none, Dialect::Sqlite),
        r#"SELECT "id" FROM "users" WHERE 1=0"#
    );

    let all = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("id").not_in(Vec::<i64>::new())),
    );
    assert_eq!(
        sql(&all, Dialect::Sqlite),
        r#"SELECT "id" FROM "users" WHERE 1=1"#
    );

    let excluded = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("id").not_in([7])),
    );
    assert_eq!(
        sql(&excluded, Dialect::MySql),
        "SELECT `id` FROM `users` WHERE `id` NOT IN (?)"
    );
}

#[test]
fn test_like_variants() {
    let u = users();
    let escaped = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("name").like_escape("50!%%", '!')),
    );
    assert_eq!(
        sql(&escaped, Dialect::Postgres),
        r#"SELECT "id" FROM "users" WHERE "name" LIKE $1 ESCAPE '!'"#
    );

    let quote = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("name").like_escape("x", '\'')),
    );
    assert!(sql(&quote, Dialect::Sqlite).ends_with("ESCAPE ''''"));

    let backslash = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("name").like_escape("50\\%", '\\')),
    );
    assert_eq!(
        sql(&backslash, Dialect::MySql),
        r"SELECT `id` FROM `users` WHERE `name` LIKE ? ESCAPE '\\'"
    );
    assert_eq!(
        sql(&backslash, Dialect::Postgres),
        r#"SELECT "id" FROM "users" WHERE "name" LIKE $1 ESCAPE '\'"#
    );

    let negated = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("name").not_like("a%")),
    );
    assert_eq!(
        sql(&negated, Dialect::Sqlite),
        r#"SELECT "id" FROM "users" WHERE "name" NOT LIKE ?"#
    );

    let ilike = build(
        select(&u)
            .columns([u.col("id")])
            .filter(u.col("name").ilike("a%")),
    );
    assert_eq!(
        sql(&ilike, Dialect::Postgres),
        r#"SELECT "id" FROM "users" WHERE "name" ILIKE $1"#
    );
    assert_eq!(unsupported(&ilike, Dialect::Sqlite), "ILIKE");
    assert_eq!(unsupported(&ilike, Dialect::MySql), "ILIKE");
}

#[test]
fn test_join_qualifies_columns() {
    let (u, p) = (users(), posts());
    let stmt = build(
        select(&u)
            .columns([u.col("email"), p.col("title")])
            .left_join(&p, p.col("user_id").eq(u.col("id")))
            .filter(p.col("title").like("%rust%"))
            .order_by(p.col("id").desc())
            .limit(10)
            .offset(20),
    );
    assert_eq!(
        sql(&stmt, Dialect::Postgres),
        concat!(
            r#"SELECT "users"."email", "posts"."title" FROM "users" "#,
            r#"LEFT JOIN "posts" ON "posts"."user_id" = "users"."id" "#,
            r#"WHERE "posts"."title" LIKE $1 ORDER BY "posts"."id" DESC LIMIT 10 OFFSET 20"#
        )
    );
}

#[test]
fn test_full_join_unsupported_on_mysql() {
    let (u, p) = (users(), posts());
    let stmt = build(
        select(&u)
            .columns([u.col("id")])
            .full_join(&p, p.col("user_id").eq(u.col("id"))),
    );
    assert_eq!(
        sql(&stmt, Dialect::Sqlite),
        r#"SELECT "users"."id" FROM "users" FULL JOIN "posts" ON "posts"."user_id" = "users"."id""#
    );
    assert_eq!(unsupported(&stmt, Dialect::MySql), "FULL JOIN");
}

#[test]
fn test_offset_without_limit() {
    let u = users();
    let stmt = build(select(&u).columns([u.col("id")]).offset(5));
    assert_eq!(
        sql(&stmt, Dialect::Postgres),
        r#"SELECT "id" FROM "users" OFFSET 5"#
    );
    assert_eq!(
        sql(&stmt, Dialect::Sqlite),
        r#"SELECT "id" FROM "users" LIMIT -1 OFFSET 5"#
    );
    assert_eq!(
        sql(&stmt, Dialect::MySql),
        "SELECT `id` FROM `users` LIMIT 18446744073709551615 OFFSET 5"
    );
}

#[test]
fn test_multi_row_insert() {
    let u = users();
    let stmt = build(
        insert(&u)
            .row([("email", "a@b.com"), ("name", "a")])
            .row([("name", "b"), ("email", "b@b.com")])
            .returning([u.col("id")]),
    );

    let compiled = compile(&stmt, Dialect::Postgres).unwrap();
    assert_eq!(
        compiled.sql,
        r#"INSERT INTO "users" ("email", "name") VALUES ($1, $2), ($3, $4) RETURNING "id""#
    );
    assert_eq!(
        stmt.arguments(&compiled.slots).unwrap(),
        [
            Value::from("a@b.com"),
            Value::from("a"),
            Value::from("b@b.com"),
            Value::from("b"),
        ]
    );
    assert_eq!(compiled.columns.len(), 1);
    assert_eq!(unsupported(&stmt, Dialect::MySql), "RETURNING");
}

#[test]
fn test_insert_without_returning_on_mysql() {
    let u = users();
    let stmt = build(insert(&u).set("email", "a@b.com").set("age", 30));
    assert_eq!(
        sql(&stmt, Dialect::MySql),
        "INSERT INTO `users` (`email`, `age`) VALUES (?, ?)"
    );
    assert!(compile(&stmt, Dialect::MySql).unwrap().columns.is_empty());
}

#[test]
fn test_update() {
    let u = users();
    let stmt = build_with(
        update(&u)
            .set("name", param("n"))
            .set("age", 30)
            .filter(u.col("id").eq(param("id"))),
        Params::new().bind("n", "alice").bind("id", 7),
    );
    let compiled = compile(&stmt, Dialect::Postgres).unwrap();
    assert_eq!(
        compiled.sql,
        r#"UPDATE "users" SET "name" = $1, "age" = $2 WHERE "id" = $3"#
    );
    let types: Vec<_> = compiled.slots.iter().map(|s| s.sql_type.as_str()).collect();
    assert_eq!(types, ["TEXT", "BIGINT", "BIGINT"]);
    assert_eq!(
        stmt.arguments(&compiled.slots).unwrap(),
        [Value::from("alice"), Value::from(30), Value::from(7)]
    );

    let copy = build(update(&u).set("name", u.col("email")));
    assert_eq!(
        sql(&copy, Dialect::Sqlite),
        r#"UPDATE "users" SET "name" = "email""#
    );
}

#[test]
fn test_delete() {
    let u = users();
    let stmt = build(
        delete(&u)
            .filter(u.col("id").eq(1))
            .returning([u.col("id"), u.col("email")]),
    );
    assert_eq!(
        sql(&stmt, Dialect::Postgres),
        r#"DELETE FROM "users" WHERE "id" = $1 RETURNING "id", "email""#
    );

    let all = build(delete(&u).allow_delete_all(true));
    assert_eq!(sql(&all, Dialect::MySql), "DELETE FROM `users`");
}

#[test]
fn test_slots_reusable_across_literal_values() {
    let u = users();
    let first = build(select(&u).filter(u.col("email").eq("first@x.com")));
    let second = build(select(&u).filter(u.col("email").eq("second@x.com")));
    assert_eq!(
        first.fingerprint(Dialect::Postgres),
        second.fingerprint(Dialect::Postgres)
    );

    let compiled = compile(&first, Dialect::Postgres).unwrap();
    assert_eq!(
        second.arguments(&compiled.slots).unwrap(),
        [Value::from("second@x.com")]
    );
}
