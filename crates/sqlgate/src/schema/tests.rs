use super::*;
use crate::error::SchemaError;

fn users() -> Table {
    Table::new("users")
        .column(Column::new("id", ColumnType::Integer).with_default())
        .column(Column::new("email", ColumnType::Text))
        .column(Column::new("name", ColumnType::Text).nullable())
        .primary_key(&["id"])
        .unique(&["email"])
}

fn posts() -> Table {
    Table::new("posts")
        .column(Column::new("id", ColumnType::Integer).with_default())
        .column(Column::new("user_id", ColumnType::Integer))
        .column(Column::new("title", ColumnType::Text))
        .primary_key(&["id"])
        .foreign_key(&["user_id"], "users", &["id"])
}

#[test]
fn test_register_and_resolve() {
    let mut builder = SchemaBuilder::new();
    builder.register(users()).unwrap();
    builder.register(posts()).unwrap();
    assert_eq!(builder.len(), 2);

    let registry = builder.freeze().unwrap();
    assert!(registry.has_table("users"));
    assert!(!registry.has_table("comments"));

    let col = registry.resolve("users", "email").unwrap();
    assert_eq!(col.column_type(), &ColumnType::Text);
    assert!(!col.is_nullable());
    assert!(registry.resolve("users", "name").unwrap().is_nullable());
}

#[test]
fn test_resolve_errors() {
    let registry = SchemaBuilder::new().with_table(users()).unwrap().freeze().unwrap();

    assert_eq!(
        registry.resolve("accounts", "id").unwrap_err(),
        SchemaError::UnknownTable("accounts".into())
    );
    assert_eq!(
        registry.resolve("users", "age").unwrap_err(),
        SchemaError::UnknownColumn {
            table: "users".into(),
            column: "age".into()
        }
    );
}

#[test]
fn test_duplicate_table() {
    let mut builder = SchemaBuilder::new();
    builder.register(users()).unwrap();
    let err = builder.register(users()).unwrap_err();
    assert_eq!(err, SchemaError::DuplicateTable("users".into()));
}

#[test]
fn test_duplicate_column() {
    let table = Table::new("t")
        .column(Column::new("a", ColumnType::Integer))
        .column(Column::new("a", ColumnType::Text));
    let err = SchemaBuilder::new().register(table).unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateColumn { .. }));
}

#[test]
fn test_at_most_one_primary_key() {
    let table = Table::new("t")
        .column(Column::new("a", ColumnType::Integer))
        .column(Column::new("b", ColumnType::Integer))
        .primary_key(&["a"])
        .primary_key(&["b"]);
    let err = SchemaBuilder::new().register(table).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidConstraint { .. }));
}

#[test]
fn test_composite_primary_key_allowed() {
    let table = Table::new("memberships")
        .column(Column::new("user_id", ColumnType::Integer))
        .column(Column::new("group_id", ColumnType::Integer))
        .primary_key(&["user_id", "group_id"]);
    let registry = SchemaBuilder::new().with_table(table).unwrap().freeze().unwrap();
    let pk = registry
        .get_table("memberships")
        .unwrap()
        .primary_key_columns()
        .unwrap();
    assert_eq!(pk, ["user_id".to_string(), "group_id".to_string()]);
}

#[test]
fn test_nullable_primary_key_rejected() {
    let table = Table::new("t")
        .column(Column::new("id", ColumnType::Integer).nullable())
        .primary_key(&["id"]);
    let err = SchemaBuilder::new().register(table).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidConstraint { .. }));
}

#[test]
fn test_forward_reference_resolves_at_freeze() {
    // posts references users before users is registered
    let mut builder = SchemaBuilder::new();
    builder.register(posts()).unwrap();
    builder.register(users()).unwrap();
    assert!(builder.freeze().is_ok());
}

#[test]
fn test_dangling_foreign_key_table() {
    let mut builder = SchemaBuilder::new();
    builder.register(posts()).unwrap();
    let err = builder.freeze().unwrap_err();
    assert!(matches!(err, SchemaError::DanglingReference { ref table, .. } if table == "posts"));
}

#[test]
fn test_dangling_foreign_key_column() {
    let comments = Table::new("comments")
        .column(Column::new("post_ref", ColumnType::Integer))
        .foreign_key(&["post_ref"], "posts", &["uuid"]);
    let mut builder = SchemaBuilder::new();
    builder.register(users()).unwrap();
    builder.register(posts()).unwrap();
    builder.register(comments).unwrap();
    let err = builder.freeze().unwrap_err();
    assert!(matches!(err, SchemaError::DanglingReference { .. }));
}

#[test]
fn test_constraint_on_missing_own_column() {
    let table = Table::new("t")
        .column(Column::new("a", ColumnType::Integer))
        .unique(&["b"]);
    let mut builder = SchemaBuilder::new();
    builder.register(table).unwrap();
    assert!(matches!(
        builder.freeze().unwrap_err(),
        SchemaError::DanglingReference { .. }
    ));
}

#[test]
fn test_foreign_key_arity() {
    let table = Table::new("t")
        .column(Column::new("a", ColumnType::Integer))
        .foreign_key(&["a"], "users", &["id", "email"]);
    let err = SchemaBuilder::new().register(table).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidConstraint { .. }));
}

#[test]
fn test_column_type_names() {
    for ty in [
        ColumnType::Integer,
        ColumnType::Float,
        ColumnType::Text,
        ColumnType::Boolean,
        ColumnType::Timestamp,
        ColumnType::Binary,
        ColumnType::Json,
        ColumnType::Uuid,
        ColumnType::custom("citext"),
    ] {
        assert_eq!(ty.to_string().parse::<ColumnType>().unwrap(), ty);
    }
    assert!("varchar".parse::<ColumnType>().is_err());
    assert!("custom:".parse::<ColumnType>().is_err());
}

#[test]
fn test_from_sql_type_aliases() {
    assert_eq!(ColumnType::from_sql_type("BIGINT"), ColumnType::Integer);
    assert_eq!(ColumnType::from_sql_type("int4"), ColumnType::Integer);
    assert_eq!(
        ColumnType::from_sql_type("character varying(255)"),
        ColumnType::Text
    );
    assert_eq!(ColumnType::from_sql_type("VARCHAR(36)"), ColumnType::Text);
    assert_eq!(ColumnType::from_sql_type("double precision"), ColumnType::Float);
    assert_eq!(
        ColumnType::from_sql_type("timestamp with time zone"),
        ColumnType::Timestamp
    );
    assert_eq!(ColumnType::from_sql_type("jsonb"), ColumnType::Json);
    assert_eq!(ColumnType::from_sql_type("BLOB"), ColumnType::Binary);
    assert_eq!(
        ColumnType::from_sql_type("numeric(10,2)"),
        ColumnType::custom("numeric")
    );
}

#[test]
fn test_registry_equality_ignores_timestamp() {
    let a = SchemaBuilder::new().with_table(users()).unwrap().freeze().unwrap();
    let b = SchemaBuilder::new()
        .with_table(users())
        .unwrap()
        .freeze_at(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH)
        .unwrap();
    assert_eq!(a, b);
    assert_ne!(a.generation(), b.generation());
}

#[test]
fn test_generation_shared_by_clones() {
    let a = SchemaBuilder::new().with_table(users()).unwrap().freeze().unwrap();
    assert_eq!(a.clone().generation(), a.generation());
    let rebuilt = a.clone().into_builder().freeze().unwrap();
    assert!(rebuilt.generation() > a.generation());
}

#[test]
fn test_into_builder_rebuilds() {
    let registry = SchemaBuilder::new().with_table(users()).unwrap().freeze().unwrap();
    let mut builder = registry.clone().into_builder();
    builder.register(posts()).unwrap();
    let rebuilt = builder.freeze().unwrap();
    assert_eq!(rebuilt.len(), 2);
    // the original registry is untouched
    assert_eq!(registry.len(), 1);
}

fn freeze(tables: Vec<Table>) -> SchemaRegistry {
    tables
        .into_iter()
        .fold(SchemaBuilder::new(), |b, t| b.with_table(t).unwrap())
        .freeze()
        .unwrap()
}

#[test]
fn test_diff_identical_is_empty() {
    let declared = freeze(vec![users(), posts()]);
    let live = freeze(vec![posts(), users()]);
    assert!(declared.diff(&live).is_empty());
}

#[test]
fn test_diff_ignores_undeclared_tables() {
    let declared = freeze(vec![users()]);
    let live = freeze(vec![users(), posts()]);
    assert!(declared.diff(&live).is_empty());
}

#[test]
fn test_diff_missing_table() {
    let declared = freeze(vec![users(), posts()]);
    let live = freeze(vec![users()]);
    assert_eq!(
        declared.diff(&live),
        [SchemaDrift::MissingTable {
            table: "posts".into()
        }]
    );
}

#[test]
fn test_diff_missing_and_unexpected_columns() {
    let declared = freeze(vec![users()]);
    let live = freeze(vec![Table::new("users")
        .column(Column::new("id", ColumnType::Integer).with_default())
        .column(Column::new("email", ColumnType::Text))
        .column(Column::new("nickname", ColumnType::Text).nullable())
        .primary_key(&["id"])]);

    let drift = declared.diff(&live);
    assert_eq!(
        drift,
        [
            SchemaDrift::MissingColumn {
                table: "users".into(),
                column: "name".into()
            },
            SchemaDrift::UnexpectedColumn {
                table: "users".into(),
                column: "nickname".into()
            },
        ]
    );
    assert_eq!(drift[0].table(), "users");
    assert_eq!(
        drift[1].to_string(),
        "column 'users.nickname' exists in database but is not declared"
    );
}

#[test]
fn test_diff_type_mismatch() {
    let declared = freeze(vec![Table::new("prices")
        .column(Column::new("id", ColumnType::Integer))
        .column(Column::new("amount", ColumnType::custom("numeric")))
        .column(Column::new("label", ColumnType::Text))
        .primary_key(&["id"])]);
    // aliases reported by the catalog
    let live = freeze(vec![Table::new("prices")
        .column(Column::new("id", ColumnType::from_sql_type("BIGINT")))
        .column(Column::new("amount", ColumnType::custom("DECIMAL")))
        .column(Column::new("label", ColumnType::from_sql_type("varchar(64)")))
        .primary_key(&["id"])]);
    assert!(declared.diff(&live).is_empty());

    let live = freeze(vec![Table::new("prices")
        .column(Column::new("id", ColumnType::Integer))
        .column(Column::new("amount", ColumnType::Float))
        .column(Column::new("label", ColumnType::Text))
        .primary_key(&["id"])]);
    let drift = declared.diff(&live);
    assert_eq!(
        drift,
        [SchemaDrift::TypeMismatch {
            table: "prices".into(),
            column: "amount".into(),
            expected: ColumnType::custom("numeric"),
            actual: ColumnType::Float,
        }]
    );
    assert_eq!(
        drift[0].to_string(),
        "column 'prices.amount': expected custom:numeric, got float"
    );
}

#[test]
fn test_diff_primary_key_mismatch() {
    let declared = freeze(vec![users()]);
    let live = freeze(vec![Table::new("users")
        .column(Column::new("id", ColumnType::Integer).with_default())
        .column(Column::new("email", ColumnType::Text))
        .column(Column::new("name", ColumnType::Text).nullable())
        .unique(&["email"])]);

    let drift = declared.diff(&live);
    assert_eq!(
        drift,
        [SchemaDrift::PrimaryKeyMismatch {
            table: "users".into(),
            expected: Some(vec!["id".into()]),
            actual: None,
        }]
    );
    assert_eq!(
        drift[0].to_string(),
        "table 'users': expected primary key (id), got none"
    );
}

#[test]
fn test_diff_nullability_mismatch() {
    let declared = freeze(vec![users()]);
    let live = freeze(vec![Table::new("users")
        .column(Column::new("id", ColumnType::Integer).with_default())
        .column(Column::new("email", ColumnType::Text).nullable())
        .column(Column::new("name", ColumnType::Text))
        .primary_key(&["id"])]);

    let drift = declared.diff(&live);
    assert_eq!(
        drift,
        [
            SchemaDrift::NullabilityMismatch {
                table: "users".into(),
                column: "email".into(),
                expected_nullable: false,
            },
            SchemaDrift::NullabilityMismatch {
                table: "users".into(),
                column: "name".into(),
                expected_nullable: true,
            },
        ]
    );
    assert_eq!(
        drift[0].to_string(),
        "column 'users.email': expected NOT NULL, got NULL"
    );
}
