//! Retrieval modes of `QueryService` against an in-memory SQLite database.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{SlowExecutor, ids, order_items, orders, service, service_with};
use oxide_query::definition::{
    PROPERTY_CACHEABLE, PROPERTY_MAX_SELECT_SIZE, PROPERTY_TIMEOUT_MS, PROPERTY_TOLERATE_OVERFLOW,
};
use oxide_query::{
    QueryConfig, QueryDefinition, QueryError, QueryHint, QueryParameter, Record, ResultHintHandler,
};
use serde::Deserialize;
use serde_json::{Value, json};

fn window(offset: usize, limit: usize) -> QueryParameter {
    QueryParameter::new(json!({})).with_offset(offset).with_limit(limit)
}

#[derive(Debug, Deserialize, PartialEq)]
struct Order {
    id: i64,
    user_id: i64,
    total: i64,
}

#[tokio::test]
async fn test_forward_and_page_over_five_orders() {
    let service = service(vec![orders()]).await;

    let forwarding = service.forward::<Value>("orders", window(0, 2)).await.unwrap();
    assert_eq!(ids(&forwarding.results), vec![1, 2]);
    assert!(forwarding.has_next);

    let page = service.page::<Value>("orders", window(0, 2)).await.unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.page_size, 2);
    assert_eq!(page.total_pages(), 3);
    assert_eq!(ids(&page.results), vec![1, 2]);
}

#[tokio::test]
async fn test_forward_has_next_only_when_rows_remain() {
    let service = service(vec![orders()]).await;

    let exact = service.forward::<Value>("orders", window(3, 2)).await.unwrap();
    assert_eq!(ids(&exact.results), vec![4, 5]);
    assert!(!exact.has_next);

    let beyond = service.forward::<Value>("orders", window(5, 2)).await.unwrap();
    assert!(beyond.results.is_empty());
    assert!(!beyond.has_next);
}

#[tokio::test]
async fn test_short_page_total_skips_count() {
    let service = service(vec![orders()]).await;

    let last = service.page::<Order>("orders", window(4, 2)).await.unwrap();
    assert_eq!(last.total, 5);
    assert_eq!(last.current_page(), 3);
    assert_eq!(
        last.results,
        vec![Order {
            id: 5,
            user_id: 2,
            total: 50
        }]
    );
}

#[tokio::test]
async fn test_page_uses_default_limit() {
    let service = service_with(
        Arc::new(oxide_query::SqliteExecutor::new(common::pool().await)),
        vec![orders()],
        QueryConfig::default().with_default_limit(3),
    );
    let page = service
        .page::<Value>("orders", QueryParameter::new(json!({})))
        .await
        .unwrap();
    assert_eq!(page.page_size, 3);
    assert_eq!(ids(&page.results), vec![1, 2, 3]);
    assert_eq!(page.total, 5);
}

#[tokio::test]
async fn test_select_with_criteria() {
    let definition = QueryDefinition::new(
        "orders_by_user",
        "SELECT id, user_id, total FROM orders WHERE user_id = :user ORDER BY id",
    );
    let service = service(vec![definition]).await;

    let rows = service
        .select::<Order>("orders_by_user", QueryParameter::new(json!({"user": 1})))
        .await
        .unwrap();
    assert_eq!(rows.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2, 4]);
}

#[tokio::test]
async fn test_select_overflow() {
    let strict = orders().with_property(PROPERTY_MAX_SELECT_SIZE, "3");
    let service = service(vec![strict]).await;
    let err = service
        .select::<Value>("orders", QueryParameter::new(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::SelectSizeExceeded { max: 3, .. }));

    // An explicit limit within the maximum is a window, not an overflow.
    let rows = service.select::<Value>("orders", window(1, 2)).await.unwrap();
    assert_eq!(ids(&rows), vec![2, 3]);
}

#[tokio::test]
async fn test_select_overflow_tolerated() {
    let tolerant = orders()
        .with_property(PROPERTY_MAX_SELECT_SIZE, "3")
        .with_property(PROPERTY_TOLERATE_OVERFLOW, "true");
    let service = service(vec![tolerant]).await;
    let rows = service
        .select::<Value>("orders", QueryParameter::new(json!({})))
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_select_at_maximum_is_not_an_overflow() {
    let service = service(vec![orders().with_property(PROPERTY_MAX_SELECT_SIZE, "5")]).await;
    let rows = service
        .select::<Value>("orders", QueryParameter::new(json!({})))
        .await
        .unwrap();
    assert_eq!(rows.len(), 5);
}

#[tokio::test]
async fn test_get() {
    let definition = QueryDefinition::new(
        "order",
        "SELECT id, user_id, total FROM orders WHERE id = :id",
    );
    let service = service(vec![definition]).await;

    let found = service
        .get::<Order>("order", QueryParameter::new(json!({"id": 3})))
        .await
        .unwrap();
    assert_eq!(found.map(|o| o.total), Some(30));

    let missing = service
        .get::<Order>("order", QueryParameter::new(json!({"id": 42})))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_count_ignores_window() {
    let service = service(vec![orders()]).await;
    assert_eq!(service.count("orders", window(3, 1)).await.unwrap(), 5);
}

#[tokio::test]
async fn test_count_keeps_projection_parameters_bound() {
    let definition = QueryDefinition::new(
        "tagged_orders",
        "SELECT id, :tag AS tag FROM orders WHERE user_id = :user ORDER BY id",
    );
    let service = service(vec![definition]).await;
    let criteria = json!({"tag": "x", "user": 1});

    let page = service
        .page::<Value>("tagged_orders", QueryParameter::new(criteria.clone()).with_limit(2))
        .await
        .unwrap();
    assert_eq!(ids(&page.results), vec![1, 2]);
    assert_eq!(page.results[0]["tag"], "x");
    assert_eq!(page.total, 3);
    assert_eq!(
        service
            .count("tagged_orders", QueryParameter::new(criteria))
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn test_unknown_definition() {
    let service = service(vec![orders()]).await;
    let err = service
        .select::<Value>("nope", QueryParameter::new(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::DefinitionNotFound(name) if name == "nope"));
}

#[tokio::test]
async fn test_missing_criteria_is_a_template_error() {
    let service = service(vec![order_items()]).await;
    let err = service
        .select::<Value>("order_items", QueryParameter::new(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Template { .. }));
}

#[tokio::test]
async fn test_conversion_error_names_query() {
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Wrong {
        missing: String,
    }
    let service = service(vec![orders()]).await;
    let err = service.select::<Wrong>("orders", window(0, 1)).await.unwrap_err();
    assert!(matches!(err, QueryError::Conversion { query, .. } if query == "orders"));
}

#[tokio::test]
async fn test_timeout() {
    let slow = orders().with_property(PROPERTY_TIMEOUT_MS, "5");
    let service = service_with(
        Arc::new(SlowExecutor {
            delay: Duration::from_millis(200),
        }),
        vec![slow],
        QueryConfig::default(),
    );
    let err = service.forward::<Value>("orders", window(0, 2)).await.unwrap_err();
    assert!(matches!(err, QueryError::Timeout { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_reviser_sees_every_call() {
    let definition = QueryDefinition::new(
        "orders_by_user",
        "SELECT id FROM orders WHERE user_id = :user ORDER BY id",
    );
    let pool = common::pool().await;
    let dialect = oxide_dialect::DialectRegistry::new()
        .resolve("sqlite::memory:")
        .unwrap();
    let service = oxide_query::QueryService::builder(
        dialect,
        common::repository(vec![definition]),
        Arc::new(oxide_query::NamedParameterTemplate::new()),
        Arc::new(oxide_query::SqliteExecutor::new(pool)),
    )
    .reviser(Arc::new(|_: &QueryDefinition, parameter: &mut QueryParameter| {
        parameter.criteria["user"] = json!(2);
        Ok::<(), QueryError>(())
    }))
    .build();

    let rows = service
        .select::<Value>("orders_by_user", QueryParameter::new(json!({"user": 1})))
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![3, 5]);
}

struct Reverse;

impl ResultHintHandler for Reverse {
    fn apply(
        &self,
        hint: &QueryHint,
        _definition: &QueryDefinition,
        records: &mut Vec<Record>,
    ) -> oxide_query::Result<()> {
        if hint.name == "reverse" {
            records.reverse();
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_result_hints_run_before_conversion() {
    let definition = orders().with_hint(QueryHint::new("reverse"));
    let pool = common::pool().await;
    let dialect = oxide_dialect::DialectRegistry::new()
        .resolve("sqlite::memory:")
        .unwrap();
    let service = oxide_query::QueryService::builder(
        dialect,
        common::repository(vec![definition]),
        Arc::new(oxide_query::NamedParameterTemplate::new()),
        Arc::new(oxide_query::SqliteExecutor::new(pool)),
    )
    .hint_handler(Arc::new(Reverse))
    .build();

    let forwarding = service.forward::<Value>("orders", window(0, 3)).await.unwrap();
    assert_eq!(ids(&forwarding.results), vec![3, 2, 1]);
    assert!(forwarding.has_next);
}

#[tokio::test]
async fn test_cacheable_definition_shares_prepared_text() {
    let service = service(vec![orders().with_property(PROPERTY_CACHEABLE, "true")]).await;
    assert!(service.cache().is_empty());

    service.forward::<Value>("orders", window(0, 2)).await.unwrap();
    service.page::<Value>("orders", window(2, 2)).await.unwrap();
    assert_eq!(service.cache().len(), 1);

    let a = service.querier("orders", window(0, 2)).unwrap();
    let b = service.querier("orders", window(0, 2)).unwrap();
    assert_eq!(a.limit_text(0, 2).unwrap(), b.limit_text(0, 2).unwrap());
}
