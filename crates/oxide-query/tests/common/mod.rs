#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use oxide_dialect::DialectRegistry;
use oxide_query::{
    BoxFuture, ExecuteRequest, InMemoryDefinitions, NamedParameterTemplate, PathPredicateEngine,
    QueryConfig, QueryDefinition, QueryError, QueryExecutor, QueryService, Record, Result,
    SqliteExecutor,
};
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// In-memory database with users, five orders and their items.
pub async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    for statement in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL, total INTEGER NOT NULL)",
        "CREATE TABLE items (id INTEGER PRIMARY KEY, order_id INTEGER NOT NULL, sku TEXT NOT NULL, qty INTEGER NOT NULL)",
        "INSERT INTO users VALUES (1, 'ann'), (2, 'bob')",
        "INSERT INTO orders VALUES (1, 1, 10), (2, 1, 20), (3, 2, 30), (4, 1, 40), (5, 2, 50)",
        "INSERT INTO items VALUES (1, 1, 'a', 1), (2, 1, 'b', 2), (3, 2, 'a', 1), (4, 3, 'c', 5), (5, 5, 'a', 2)",
    ] {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .unwrap_or_else(|e| panic!("Failed to run {statement}: {e}"));
    }
    pool
}

pub fn orders() -> QueryDefinition {
    QueryDefinition::new("orders", "SELECT id, user_id, total FROM orders ORDER BY id")
}

pub fn order_items() -> QueryDefinition {
    QueryDefinition::new(
        "order_items",
        "SELECT id, order_id, sku, qty FROM items WHERE order_id = :order_id ORDER BY id",
    )
}

pub fn user() -> QueryDefinition {
    QueryDefinition::new("user", "SELECT id, name FROM users WHERE id = :id")
}

pub fn repository(definitions: Vec<QueryDefinition>) -> Arc<InMemoryDefinitions> {
    Arc::new(InMemoryDefinitions::new(definitions).expect("Invalid test definitions"))
}

pub fn service_with(
    executor: Arc<dyn QueryExecutor>,
    definitions: Vec<QueryDefinition>,
    config: QueryConfig,
) -> QueryService {
    let dialect = DialectRegistry::new()
        .resolve("sqlite::memory:")
        .expect("No sqlite dialect");
    QueryService::builder(
        dialect,
        repository(definitions),
        Arc::new(NamedParameterTemplate::new()),
        executor,
    )
    .config(config)
    .script_engine(Arc::new(PathPredicateEngine::new()))
    .build()
}

pub async fn service(definitions: Vec<QueryDefinition>) -> QueryService {
    service_with(
        Arc::new(SqliteExecutor::new(pool().await)),
        definitions,
        QueryConfig::default(),
    )
}

pub fn ids(records: &[Value]) -> Vec<i64> {
    records
        .iter()
        .map(|r| r["id"].as_i64().unwrap_or_else(|| panic!("No id in {r}")))
        .collect()
}

/// Executor failing the first `failures` selects with a transient error.
pub struct FlakyExecutor {
    inner: SqliteExecutor,
    failures: AtomicUsize,
    selects: AtomicUsize,
}

impl FlakyExecutor {
    pub fn new(inner: SqliteExecutor, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
            selects: AtomicUsize::new(0),
        }
    }

    pub fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }
}

impl QueryExecutor for FlakyExecutor {
    fn select<'a>(&'a self, request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<Vec<Record>>> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Box::pin(async move {
                Err(QueryError::Execution {
                    query: request.query.to_string(),
                    text: request.text.to_string(),
                    transient: true,
                    source: "connection reset".into(),
                })
            });
        }
        self.inner.select(request)
    }

    fn get<'a>(&'a self, request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<Option<Record>>> {
        self.inner.get(request)
    }

    fn count<'a>(&'a self, request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<u64>> {
        self.inner.count(request)
    }
}

/// Executor that answers every call after `delay`.
pub struct SlowExecutor {
    pub delay: Duration,
}

impl QueryExecutor for SlowExecutor {
    fn select<'a>(&'a self, _request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<Vec<Record>>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(Vec::new())
        })
    }

    fn get<'a>(&'a self, _request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<Option<Record>>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(None)
        })
    }

    fn count<'a>(&'a self, _request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(0)
        })
    }
}
