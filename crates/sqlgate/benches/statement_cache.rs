//! Benchmark the hot path of the engine: fingerprinting, validation,
//! compilation and statement cache lookups.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sqlgate::ast::Select;
use sqlgate::{
    Column, ColumnType, Dialect, Fingerprint, Params, QueryNode, SchemaBuilder, SchemaSource,
    Statement, StatementCache, StatementCacheConfig, Table, TableRef, compile, param, select,
};
use tokio::runtime::Runtime;

fn source() -> SchemaSource {
    let mut builder = SchemaBuilder::new();
    for i in 0..32 {
        builder
            .register(
                Table::new(format!("table_{i}"))
                    .column(Column::new("id", ColumnType::Integer).with_default())
                    .column(Column::new("status", ColumnType::Text))
                    .column(Column::new("score", ColumnType::Float).nullable())
                    .primary_key(&["id"]),
            )
            .expect("unique table");
    }
    SchemaSource::database(builder.freeze().expect("valid schema"))
}

fn query(i: usize) -> Select {
    let t = TableRef::new(format!("table_{}", i % 32));
    select(&t)
        .filter(t.col("id").eq(i as i64))
        .filter(t.col("status").eq(param("status")))
        .filter(t.col("score").gt(0.5))
        .order_by(t.col("id").desc())
        .limit(20)
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime")
}

fn bench_fingerprint(c: &mut Criterion) {
    let node: QueryNode = query(7).into();
    c.bench_function("fingerprint", |b| {
        b.iter(|| black_box(Fingerprint::of(black_box(&node), Dialect::Postgres)));
    });
}

fn bench_validate_and_compile(c: &mut Criterion) {
    let source = source();
    let params = Params::new().bind("status", "active");

    c.bench_function("validate", |b| {
        b.iter(|| black_box(query(7).build(&source, params.clone()).expect("valid")));
    });

    let validated = query(7).build(&source, params).expect("valid");
    let mut group = c.benchmark_group("compile");
    for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite] {
        group.bench_with_input(
            BenchmarkId::from_parameter(dialect),
            &validated,
            |b, stmt| {
                b.iter(|| black_box(compile(stmt, dialect).expect("compiles")));
            },
        );
    }
    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let rt = runtime();
    let source = source();
    let mut group = c.benchmark_group("statement_cache/hit");

    for capacity in [64, 256, 1024] {
        let cache = StatementCache::new(StatementCacheConfig {
            capacity,
            ttl: None,
        })
        .expect("valid config");

        // distinct limits give distinct fingerprints
        let statements: Vec<_> = (0..capacity)
            .map(|i| {
                query(i)
                    .limit(i as u64 + 1)
                    .build(&source, Params::new().bind("status", "x"))
                    .expect("valid")
            })
            .collect();
        rt.block_on(async {
            for stmt in &statements {
                let fp = stmt.fingerprint(Dialect::Postgres);
                cache
                    .get_or_compile(fp, Dialect::Postgres, || compile(stmt, Dialect::Postgres))
                    .await
                    .expect("compiles");
            }
        });

        let hit = statements[capacity / 2].fingerprint(Dialect::Postgres);
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &hit, |b, fp| {
            b.iter(|| {
                rt.block_on(async {
                    black_box(
                        cache
                            .get_or_compile(*fp, Dialect::Postgres, || unreachable!("cached"))
                            .await
                            .expect("hit"),
                    )
                })
            });
        });
    }

    group.finish();
}

fn bench_cache_miss(c: &mut Criterion) {
    let rt = runtime();
    let source = source();
    let cache = StatementCache::new(StatementCacheConfig {
        capacity: 64,
        ttl: None,
    })
    .expect("valid config");

    // twice the capacity: every lookup misses and evicts
    let statements: Vec<_> = (0..128)
        .map(|i| {
            query(i)
                .limit(i as u64 + 1)
                .build(&source, Params::new().bind("status", "x"))
                .expect("valid")
        })
        .collect();

    let mut i = 0usize;
    c.bench_function("statement_cache/miss_evict", |b| {
        b.iter(|| {
            let stmt = &statements[i % statements.len()];
            i += 1;
            rt.block_on(async {
                let fp = stmt.fingerprint(Dialect::Postgres);
                black_box(
                    cache
                        .get_or_compile(fp, Dialect::Postgres, || compile(stmt, Dialect::Postgres))
                        .await
                        .expect("compiles"),
                )
            })
        });
    });
}

criterion_group!(
    benches,
    bench_fingerprint,
    bench_validate_and_compile,
    bench_cache_hit,
    bench_cache_miss
);
criterion_main!(benches);
