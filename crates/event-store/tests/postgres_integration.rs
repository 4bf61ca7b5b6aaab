//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use event_store::{
    AggregateId, AppendOptions, EventEnvelope, EventQuery, EventStore, EventStoreError,
    EventStoreExt, PostgresEventStore, Snapshot, Version,
};
use futures_util::StreamExt;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_events_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresEventStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE events, snapshots RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool)
}

fn event(aggregate_id: AggregateId, kind: &str, version: i64, event_type: &str) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type(kind)
        .event_type(event_type)
        .version(Version::new(version))
        .payload_raw(serde_json::json!({"version": version}))
        .metadata("role", serde_json::json!("restaurant"))
        .build()
        .unwrap()
}

#[tokio::test]
async fn append_and_read_back_order_stream() {
    let store = get_test_store().await;
    let order = AggregateId::new();

    let version = store
        .append(
            vec![
                event(order, "Order", 1, "OrderPlaced"),
                event(order, "Order", 2, "OrderStatusChanged"),
            ],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();
    assert_eq!(version, Version::new(2));

    let events = store.get_events_for_aggregate(order).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, "OrderPlaced");
    assert_eq!(events[1].metadata_str("role"), Some("restaurant"));
    assert!(events[0].sequence < events[1].sequence);
}

#[tokio::test]
async fn stale_expected_version_is_a_conflict() {
    let store = get_test_store().await;
    let order = AggregateId::new();
    store
        .append_event(event(order, "Order", 1, "OrderPlaced"), AppendOptions::expect_new())
        .await
        .unwrap();

    let result = store
        .append_event(
            event(order, "Order", 2, "OrderStatusChanged"),
            AppendOptions::expect_version(Version::initial()),
        )
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
async fn unique_constraint_rejects_duplicate_version() {
    let store = get_test_store().await;
    let drone = AggregateId::new();
    store
        .append_event(event(drone, "Drone", 1, "DroneCommissioned"), AppendOptions::new())
        .await
        .unwrap();

    let result = store
        .append_event(event(drone, "Drone", 1, "DroneCommissioned"), AppendOptions::new())
        .await;
    assert!(result.unwrap_err().is_conflict());
}

#[tokio::test]
async fn concurrent_reservations_admit_exactly_one() {
    let store = get_test_store().await;
    let drone = AggregateId::new();
    store
        .append_event(event(drone, "Drone", 1, "DroneCommissioned"), AppendOptions::expect_new())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .append_event(
                    event(drone, "Drone", 2, "DroneReserved"),
                    AppendOptions::expect_version(Version::first()),
                )
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn newest_first_query_reads_latest_telemetry() {
    let store = get_test_store().await;
    let drone = AggregateId::new();
    let events = (1..=5)
        .map(|v| event(drone, "Drone", v, if v == 1 { "DroneCommissioned" } else { "DroneMoved" }))
        .collect();
    store.append(events, AppendOptions::expect_new()).await.unwrap();

    let latest = store
        .query_events(
            EventQuery::for_aggregate(drone)
                .event_type("DroneMoved")
                .newest_first()
                .limit(3),
        )
        .await
        .unwrap();

    let versions: Vec<_> = latest.iter().map(|e| e.version.as_i64()).collect();
    assert_eq!(versions, vec![5, 4, 3]);
}

#[tokio::test]
async fn stream_after_position_and_list_aggregates() {
    let store = get_test_store().await;
    let d1 = AggregateId::new();
    let o1 = AggregateId::new();
    store
        .append_event(event(d1, "Drone", 1, "DroneCommissioned"), AppendOptions::expect_new())
        .await
        .unwrap();
    store
        .append_event(event(o1, "Order", 1, "OrderPlaced"), AppendOptions::expect_new())
        .await
        .unwrap();

    let all: Vec<_> = store.stream_all_events().await.unwrap().collect().await;
    assert_eq!(all.len(), 2);
    let first_sequence = all[0].as_ref().unwrap().sequence;

    let tail: Vec<_> = store
        .stream_events_after(first_sequence)
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].as_ref().unwrap().aggregate_id, o1);

    assert_eq!(store.list_aggregates("Drone").await.unwrap(), vec![d1]);
}

#[tokio::test]
async fn snapshot_replaces_and_loads_tail() {
    let store = get_test_store().await;
    let drone = AggregateId::new();
    let events = (1..=4).map(|v| event(drone, "Drone", v, "DroneMoved")).collect();
    store.append(events, AppendOptions::expect_new()).await.unwrap();

    for version in [2, 3] {
        store
            .save_snapshot(
                Snapshot::from_state(
                    drone,
                    "Drone",
                    Version::new(version),
                    &serde_json::json!({"battery": 90}),
                )
                .unwrap(),
            )
            .await
            .unwrap();
    }

    let (snapshot, tail) = store.load_aggregate(drone).await.unwrap();
    assert_eq!(snapshot.unwrap().version, Version::new(3));
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].version, Version::new(4));
}
