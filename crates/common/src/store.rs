//! Upstream record store.
//!
//! Notification rows are written by the bet flow; this service only reads the
//! unprocessed view and flips `processed` once fan-out has settled.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::types::{NotificationRecord, NotificationRow};

/// Postgres channel the change trigger publishes on.
pub const CHANGE_CHANNEL: &str = "notification_changes";

const SELECT_COLUMNS: &str = r#"
    SELECT id::text AS id,
           type AS kind,
           bet_id,
           bet_description,
           ROUND(bet_amount * 100)::bigint AS bet_amount_cents,
           creator_name,
           creator_photo,
           taker_name,
           taker_photo,
           created_at,
           processed
    FROM notifications
"#;

/// Write side of the upstream store used by the dispatch coordinator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Set `processed = true` for the record.
    ///
    /// Returns `true` if this call performed the transition and `false` if the
    /// record was already processed (or no longer exists).
    async fn mark_processed(&self, id: &str) -> Result<bool, AppError>;
}

/// Postgres-backed record store.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// All unprocessed records, oldest first.
    pub async fn fetch_unprocessed(&self) -> Result<Vec<NotificationRecord>, AppError> {
        let sql = format!("{SELECT_COLUMNS} WHERE processed = FALSE ORDER BY created_at ASC");
        let rows: Vec<NotificationRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(NotificationRecord::from).collect())
    }

    /// A single record by id, whatever its processed state.
    pub async fn fetch_by_id(&self, id: &str) -> Result<Option<NotificationRecord>, AppError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1::uuid");
        let row: Option<NotificationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(NotificationRecord::from))
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn mark_processed(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET processed = TRUE WHERE id = $1::uuid AND processed = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
