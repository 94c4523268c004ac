//! EFBD scale ingestion and snapshot queries.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::{AxisCode, AxisScore, RecordTriggers, ScaleSnapshot};
use crate::time_utils::from_epoch_millis;

/// Scale-core operations the EFBD controller relies on.
#[async_trait]
pub trait ScaleIngestion: Send + Sync {
    async fn record_triggers(&self, batch: &RecordTriggers) -> Result<(), AppError>;

    async fn fetch_snapshot(&self, profile_id: &str) -> Result<ScaleSnapshot, AppError>;
}

/// `ScaleIngestion` backed by the `efbd_triggers` table.
///
/// An axis score is the sum of every trigger value recorded on it.
#[derive(Clone)]
pub struct SqlScaleService {
    pool: SqlitePool,
}

impl SqlScaleService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TriggerRow {
    axis_code: String,
    value: i64,
    source: String,
    recorded_at: i64,
}

#[async_trait]
impl ScaleIngestion for SqlScaleService {
    async fn record_triggers(&self, batch: &RecordTriggers) -> Result<(), AppError> {
        let now_ms = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        for trigger in &batch.triggers {
            sqlx::query(
                "INSERT INTO efbd_triggers \
                     (profile_id, axis_code, value, source, metadata, recorded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&batch.profile_id)
            .bind(trigger.axis.as_str())
            .bind(trigger.value)
            .bind(&trigger.source)
            .bind(trigger.metadata.to_string())
            .bind(now_ms)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            profile_id = %batch.profile_id,
            count = batch.triggers.len(),
            "Scale triggers recorded"
        );
        Ok(())
    }

    async fn fetch_snapshot(&self, profile_id: &str) -> Result<ScaleSnapshot, AppError> {
        let rows: Vec<TriggerRow> = sqlx::query_as(
            "SELECT axis_code, value, source, recorded_at FROM efbd_triggers \
             WHERE profile_id = ?1 ORDER BY recorded_at ASC, id ASC",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        let mut snapshot = ScaleSnapshot::default();

        for row in rows {
            let Ok(axis) = row.axis_code.parse::<AxisCode>() else {
                tracing::warn!(axis = %row.axis_code, "Skipping trigger with unknown axis");
                continue;
            };
            let recorded_at = from_epoch_millis(row.recorded_at);

            let score = snapshot.axis_scores.entry(axis).or_insert(AxisScore {
                value: 0,
                last_updated: None,
                last_trigger_source: None,
            });
            score.value += row.value;
            score.last_updated = recorded_at;
            score.last_trigger_source = Some(row.source);

            snapshot.updated_at = recorded_at.or(snapshot.updated_at);
        }

        Ok(snapshot)
    }
}
