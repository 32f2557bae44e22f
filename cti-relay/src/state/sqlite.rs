//! SQLite-backed checkpoint storage for standalone deployments.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::StateStore;
use crate::Result;
use crate::domain::{Checkpoint, ConnectorIdentity};

/// Busy timeout in milliseconds.
const BUSY_TIMEOUT_MS: u64 = 30_000;

/// Checkpoints stored in the `connector_state` table.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open (creating if missing) the database and apply migrations.
    ///
    /// A single connection serializes writes; the store is touched twice per run.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Checkpoint database ready");

        Ok(Self { pool })
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, identity: &ConnectorIdentity) -> Result<Checkpoint> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT state FROM connector_state WHERE connector_id = ?")
                .bind(&identity.id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((state,)) => Checkpoint::from_json(&state),
            None => {
                debug!(connector_id = %identity.id, "No stored checkpoint");
                Ok(Checkpoint::default())
            }
        }
    }

    async fn set(&self, identity: &ConnectorIdentity, checkpoint: &Checkpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO connector_state (connector_id, state, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(connector_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&identity.id)
        .bind(checkpoint.to_json()?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
