use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventQuery, EventStoreError, QueryOrder, Result, Snapshot,
    Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

const EVENT_COLUMNS: &str = "global_position, id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata";

/// PostgreSQL-backed event store.
///
/// Concurrency is enforced by the `unique_aggregate_version` constraint; an
/// insert that loses the race surfaces as [`EventStoreError::ConcurrencyConflict`].
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;
        let sequence: i64 = row.try_get("global_position")?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            sequence: sequence as u64,
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    async fn current_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        aggregate_id: AggregateId,
    ) -> Result<Version> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut **tx)
                .await?;
        Ok(Version::new(current.unwrap_or(0)))
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();
        let mut tx = self.pool.begin().await?;

        if let Some(expected) = options.expected_version {
            let actual = Self::current_version(&mut tx, aggregate_id).await?;
            if actual != expected {
                metrics::counter!("event_store_conflicts_total", "aggregate_type" => aggregate_type)
                    .increment(1);
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual,
                });
            }
        }

        let count = events.len();
        let mut last_version = Version::initial();
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            let inserted = sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_version")
                {
                    metrics::counter!("event_store_conflicts_total", "aggregate_type" => aggregate_type)
                        .increment(1);
                    return Err(EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: options
                            .expected_version
                            .unwrap_or(Version::new(event.version.as_i64() - 1)),
                        actual: event.version,
                    });
                }
                return Err(EventStoreError::Database(e));
            }

            last_version = event.version;
        }

        tx.commit().await?;
        metrics::counter!("event_store_appends_total", "aggregate_type" => aggregate_type)
            .increment(count as u64);
        tracing::debug!(%aggregate_id, version = %last_version, count, "events appended");

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.get_events_for_aggregate_from_version(aggregate_id, Version::first())
            .await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE aggregate_id = $1 AND version >= $2 ORDER BY version ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(aggregate_id.as_uuid())
            .bind(from_version.as_i64())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE 1=1");
        let mut param_count = 0;

        if query.aggregate_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_id = ${param_count}"));
        }
        if query.aggregate_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_type = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.from_version.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND version >= ${param_count}"));
        }
        if query.since.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp >= ${param_count}"));
        }

        sql.push_str(match query.order {
            QueryOrder::OldestFirst => " ORDER BY global_position ASC",
            QueryOrder::NewestFirst => " ORDER BY global_position DESC",
        });

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(id) = query.aggregate_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(aggregate_type) = query.aggregate_type {
            sqlx_query = sqlx_query.bind(aggregate_type);
        }
        if let Some(event_types) = query.event_types {
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(from_version) = query.from_version {
            sqlx_query = sqlx_query.bind(from_version.as_i64());
        }
        if let Some(since) = query.since {
            sqlx_query = sqlx_query.bind(since);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_events_after(&self, after: u64) -> Result<EventStream> {
        use futures_util::StreamExt;

        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE global_position > $1 ORDER BY global_position ASC"
        );
        let pool = self.pool.clone();
        let stream = futures_util::stream::once(async move {
            sqlx::query(&sql)
                .bind(after as i64)
                .fetch_all(&pool)
                .await
        })
        .flat_map(|result| {
            let rows: Vec<Result<EventEnvelope>> = match result {
                Ok(rows) => rows.into_iter().map(Self::row_to_event).collect(),
                Err(e) => vec![Err(EventStoreError::Database(e))],
            };
            futures_util::stream::iter(rows)
        });

        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn list_aggregates(&self, aggregate_type: &str) -> Result<Vec<AggregateId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT aggregate_id FROM events WHERE aggregate_type = $1 AND version = 1 ORDER BY global_position ASC",
        )
        .bind(aggregate_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(AggregateId::from_uuid).collect())
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (aggregate_id, aggregate_type, version, timestamp, state)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_id) DO UPDATE SET
                aggregate_type = EXCLUDED.aggregate_type,
                version = EXCLUDED.version,
                timestamp = EXCLUDED.timestamp,
                state = EXCLUDED.state
            "#,
        )
        .bind(snapshot.aggregate_id.as_uuid())
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.version.as_i64())
        .bind(snapshot.timestamp)
        .bind(&snapshot.state)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT aggregate_id, aggregate_type, version, timestamp, state FROM snapshots WHERE aggregate_id = $1",
        )
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<Snapshot> {
            Ok(Snapshot {
                aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
                aggregate_type: row.try_get("aggregate_type")?,
                version: Version::new(row.try_get("version")?),
                timestamp: row.try_get("timestamp")?,
                state: row.try_get("state")?,
            })
        })
        .transpose()
    }
}
