//! Runs against a real database when `DATABASE_URL` is set (a `.env` file is
//! honoured); skipped otherwise.

use sqlgate::{
    ColumnType, Constraint, Params, QueryEngine, SchemaSnapshot, SqlgateConfig, TableRef, Value,
    insert, param, select, update,
};
use sqlgate_pg::{PgDriver, PgError, PgResult};
use tokio_postgres::{Client, NoTls};

async fn connect() -> Option<Client> {
    let _ = dotenvy::dotenv();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping");
            return None;
        }
    };
    let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .expect("connect to DATABASE_URL");
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Some(client)
}

/// Create a throwaway schema with `users` and `posts`.
async fn setup(client: &Client) -> PgResult<String> {
    let schema = format!("sqlgate_test_{}", uuid::Uuid::new_v4().simple());
    client
        .batch_execute(&format!(
            r#"
CREATE SCHEMA {schema};
CREATE TYPE {schema}.mood AS ENUM ('happy', 'sad');
CREATE TABLE {schema}.users (
  id bigserial PRIMARY KEY,
  email varchar(255) NOT NULL UNIQUE,
  name text,
  mood {schema}.mood,
  created_at timestamptz NOT NULL DEFAULT now()
);
CREATE TABLE {schema}.posts (
  id serial PRIMARY KEY,
  user_id bigint NOT NULL REFERENCES {schema}.users(id),
  title text NOT NULL,
  meta jsonb
);
"#
        ))
        .await?;
    Ok(schema)
}

async fn teardown(client: &Client, schema: &str) {
    let _ = client
        .batch_execute(&format!("DROP SCHEMA {schema} CASCADE"))
        .await;
}

#[tokio::test]
async fn introspects_catalog() -> PgResult<()> {
    let Some(client) = connect().await else {
        return Ok(());
    };
    let schema = setup(&client).await?;
    let driver = PgDriver::new(client).with_schemas([schema.clone()]);

    let result = driver.introspect().await;
    let client = driver.into_inner();
    teardown(&client, &schema).await;
    let registry = result?;

    let users = registry.get_table("users").expect("users table");
    let id = users.get_column("id").unwrap();
    assert_eq!(id.column_type(), &ColumnType::Integer);
    assert!(id.has_default());
    assert!(!id.is_nullable());

    assert_eq!(users.get_column("email").unwrap().column_type(), &ColumnType::Text);
    assert!(users.get_column("name").unwrap().is_nullable());
    assert!(users.get_column("created_at").unwrap().has_default());
    assert!(matches!(
        users.get_column("mood").unwrap().column_type(),
        ColumnType::Custom(name) if name.ends_with("mood")
    ));
    assert_eq!(users.primary_key_columns(), Some(&["id".to_string()][..]));
    assert!(users
        .constraints()
        .iter()
        .any(|c| matches!(c, Constraint::Unique { columns } if columns == &["email"])));

    let posts = registry.get_table("posts").expect("posts table");
    assert_eq!(posts.get_column("meta").unwrap().column_type(), &ColumnType::Json);
    assert!(posts.constraints().iter().any(|c| matches!(
        c,
        Constraint::ForeignKey { references_table, .. } if references_table == "users"
    )));

    // the introspected registry survives a snapshot
    let snapshot = SchemaSnapshot::from_registry(&registry);
    assert_eq!(SchemaSnapshot::from_registry(&snapshot.to_registry()?), snapshot);
    Ok(())
}

#[tokio::test]
async fn executes_through_engine() -> PgResult<()> {
    let Some(client) = connect().await else {
        return Ok(());
    };
    let schema = setup(&client).await?;
    client
        .batch_execute(&format!("SET search_path TO {schema}"))
        .await?;

    let mut config = SqlgateConfig::default();
    config.database.schemas = vec![schema.clone()];
    let driver = PgDriver::from_config(client, &config);
    let engine = QueryEngine::connect(&config, driver)
        .await
        .map_err(|e| PgError::Unsupported(e.to_string()))?;

    let result = exercise(&engine).await;
    teardown(engine.driver().conn(), &schema).await;
    result
}

async fn exercise(engine: &QueryEngine<PgDriver<Client>>) -> PgResult<()> {
    let run_err = |e: sqlgate::GateError| PgError::Unsupported(e.to_string());
    let users = TableRef::new("users");

    let inserted = engine
        .run(
            insert(&users)
                .set("email", "a@b.com")
                .set("name", "Ann")
                .returning([users.col("id"), users.col("created_at")]),
            Params::new(),
        )
        .await
        .map_err(run_err)?;
    let rows = inserted.rows().expect("RETURNING rows");
    assert_eq!(rows.len(), 1);
    let Some(Value::Integer(id)) = rows.get(0, "id").cloned() else {
        panic!("expected integer id, got {:?}", rows.get(0, "id"));
    };
    assert!(matches!(rows.get(0, "created_at"), Some(Value::Timestamp(_))));

    let updated = engine
        .run(
            update(&users)
                .set("mood", Value::custom("mood", "happy"))
                .filter(users.col("id").eq(id)),
            Params::new(),
        )
        .await
        .map_err(run_err)?;
    assert_eq!(updated.count(), 1);

    for _ in 0..2 {
        let found = engine
            .run(
                select(&users)
                    .column(users.col("email"))
                    .column(users.col("mood"))
                    .filter(users.col("email").eq(param("email"))),
                Params::new().bind("email", "a@b.com"),
            )
            .await
            .map_err(run_err)?;
        let rows = found.rows().expect("rows");
        assert_eq!(rows.get(0, "email"), Some(&Value::from("a@b.com")));
        assert_eq!(rows.get(0, "mood"), Some(&Value::custom("mood", "happy")));
    }

    // the second lookup reused both the compiled and the prepared statement
    assert_eq!(engine.stats().hits, 1);
    assert_eq!(engine.driver().prepared_len(), 3);

    let missing = engine
        .run(
            select(&users).filter(users.col("email").eq("nobody@b.com")),
            Params::new(),
        )
        .await
        .map_err(run_err)?;
    assert_eq!(missing.count(), 0);
    Ok(())
}
