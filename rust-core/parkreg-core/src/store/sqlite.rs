//! SQLite-backed record store.

use super::RecordStore;
use crate::error::{Error, Result};
use crate::vehicle::{VehicleId, VehicleRecord, VehicleType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::info;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS vehicle (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plate TEXT NOT NULL,
    vehicle_type TEXT NOT NULL,
    owner TEXT,
    entry_time TEXT
)";

const INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_vehicle_plate_type ON vehicle (plate, vehicle_type)";

const COLUMNS: &str = "id, plate, vehicle_type, owner, entry_time";

/// Vehicle table in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a SQLite database and create the vehicle table if needed
    ///
    /// # Arguments
    ///
    /// * `url` - Database URL (e.g., "sqlite:parking.db?mode=rwc" or "sqlite::memory:")
    /// * `max_connections` - Maximum pool size (default: 5)
    ///
    /// In-memory databases are private to a connection, so the pool is pinned
    /// to a single connection that never expires.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the connection or the schema setup fails.
    pub async fn connect(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let in_memory = url.contains(":memory:");
        let mut options = SqlitePoolOptions::new();
        options = if in_memory {
            options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options.max_connections(max_connections.unwrap_or(5))
        };

        let pool = options.connect(url).await.map_err(|e| Error::Database {
            message: format!("SQLite connection failed: {e}"),
        })?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        sqlx::query(INDEX).execute(&pool).await?;

        info!(url = %url, in_memory, "SQLite vehicle store ready");
        Ok(Self { pool })
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Convert a vehicle row back into a record
fn row_to_record(row: &SqliteRow) -> Result<VehicleRecord> {
    let vehicle_type: String = row.try_get("vehicle_type")?;
    let vehicle_type = vehicle_type
        .parse::<VehicleType>()
        .map_err(|message| Error::Database { message })?;

    let entry_time = row
        .try_get::<Option<String>, _>("entry_time")?
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| Error::Database {
                    message: format!("Corrupt entry_time '{raw}': {e}"),
                })
        })
        .transpose()?;

    Ok(VehicleRecord {
        id: Some(row.try_get("id")?),
        plate: row.try_get("plate")?,
        vehicle_type,
        owner: row.try_get("owner")?,
        entry_time,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_by_plate_and_type(
        &self,
        plate: &str,
        vehicle_type: VehicleType,
    ) -> Result<Vec<VehicleRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM vehicle WHERE plate = ? AND vehicle_type = ? ORDER BY id"
        ))
        .bind(plate)
        .bind(vehicle_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn count_by_type(&self, vehicle_type: VehicleType) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) FROM vehicle WHERE vehicle_type = ?")
            .bind(vehicle_type.as_str())
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get(0)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn save(&self, mut record: VehicleRecord) -> Result<VehicleRecord> {
        let entry_time = record.entry_time.map(|t| t.to_rfc3339());

        match record.id {
            None => {
                let done = sqlx::query(
                    "INSERT INTO vehicle (plate, vehicle_type, owner, entry_time) VALUES (?, ?, ?, ?)",
                )
                .bind(&record.plate)
                .bind(record.vehicle_type.as_str())
                .bind(&record.owner)
                .bind(entry_time)
                .execute(&self.pool)
                .await?;
                record.id = Some(done.last_insert_rowid());
            }
            Some(id) => {
                sqlx::query(
                    "INSERT INTO vehicle (id, plate, vehicle_type, owner, entry_time) VALUES (?, ?, ?, ?, ?)
                     ON CONFLICT(id) DO UPDATE SET
                        plate = excluded.plate,
                        vehicle_type = excluded.vehicle_type,
                        owner = excluded.owner,
                        entry_time = excluded.entry_time",
                )
                .bind(id)
                .bind(&record.plate)
                .bind(record.vehicle_type.as_str())
                .bind(&record.owner)
                .bind(entry_time)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(record)
    }

    async fn find_by_id(&self, id: VehicleId) -> Result<Option<VehicleRecord>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM vehicle WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_all(&self) -> Result<Vec<VehicleRecord>> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM vehicle ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn delete_by_id(&self, id: VehicleId) -> Result<bool> {
        let done = sqlx::query("DELETE FROM vehicle WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
