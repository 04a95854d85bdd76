use calldesk_common::{
    next_priority, AppointmentRecord, AppointmentStatus, ComplaintRecord, ComplaintStatus,
    Escalation,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{migrate::MigrateDatabase, sqlite::SqliteRow, Row, Sqlite, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// How often a conditional escalation update is retried before giving up.
const ESCALATION_RETRIES: usize = 3;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Conflicting update: {0}")]
    Conflict(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

impl From<StoreError> for calldesk_common::AgentError {
    fn from(e: StoreError) -> Self {
        calldesk_common::AgentError::Store(e.to_string())
    }
}

/// Complaint and appointment persistence.
///
/// Not-found is `Ok(None)`; an unreachable or failing store is `Err`, so
/// callers can tell a missing record from a broken backend.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    // Complaint operations
    async fn insert_complaint(&self, record: &ComplaintRecord) -> Result<(), StoreError>;
    async fn find_latest_complaint(
        &self,
        mobile: &str,
    ) -> Result<Option<ComplaintRecord>, StoreError>;
    async fn find_by_complaint_number(
        &self,
        complaint_number: &str,
    ) -> Result<Option<ComplaintRecord>, StoreError>;
    async fn escalate_priority(
        &self,
        complaint_number: &str,
    ) -> Result<Option<Escalation>, StoreError>;

    // Appointment operations
    async fn insert_appointment(&self, record: &AppointmentRecord) -> Result<(), StoreError>;
    async fn find_latest_booked_appointment(
        &self,
        mobile: &str,
    ) -> Result<Option<AppointmentRecord>, StoreError>;
    async fn reschedule_appointment(
        &self,
        mobile: &str,
        new_scheduled_at: &str,
    ) -> Result<Option<AppointmentRecord>, StoreError>;
    async fn cancel_appointment(
        &self,
        mobile: &str,
    ) -> Result<Option<AppointmentRecord>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub enable_wal_mode: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./data/calldesk.db".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            enable_wal_mode: true,
        }
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let in_memory = config.database_url.contains(":memory:");

        if !in_memory && !Sqlite::database_exists(&config.database_url).await.unwrap_or(false) {
            info!("Creating database at {}", config.database_url);
            Sqlite::create_database(&config.database_url)
                .await
                .map_err(|e| StoreError::Unavailable(format!("Failed to create database: {}", e)))?;
        }

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {}", e)))?;

        if config.enable_wal_mode && !in_memory {
            sqlx::query("PRAGMA journal_mode = WAL")
                .execute(&pool)
                .await
                .map_err(|e| StoreError::Query(format!("Failed to enable WAL mode: {}", e)))?;
        }

        let store = Self { pool };
        store.ensure_schema().await?;

        info!("SQLite complaint store initialized");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS complaints (
                id TEXT PRIMARY KEY,
                mobile TEXT NOT NULL,
                name TEXT NOT NULL,
                address TEXT NOT NULL,
                product TEXT NOT NULL,
                issue TEXT NOT NULL,
                status TEXT NOT NULL,
                priority INTEGER NOT NULL,
                complaint_number TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_complaints_mobile ON complaints (mobile)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_complaints_number ON complaints (complaint_number)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS appointments (
                id TEXT PRIMARY KEY,
                mobile TEXT NOT NULL,
                customer_name TEXT NOT NULL,
                reason TEXT NOT NULL,
                scheduled_at TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_appointments_mobile ON appointments (mobile)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn complaint_from_row(row: &SqliteRow) -> Result<ComplaintRecord, StoreError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| StoreError::InvalidData(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| StoreError::InvalidData(e.to_string()))?;
    let priority: i64 = row
        .try_get("priority")
        .map_err(|e| StoreError::InvalidData(e.to_string()))?;

    Ok(ComplaintRecord {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::InvalidData(format!("Invalid UUID: {}", e)))?,
        mobile: row
            .try_get("mobile")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        name: row
            .try_get("name")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        address: row
            .try_get("address")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        product: row
            .try_get("product")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        issue: row
            .try_get("issue")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        status: status
            .parse::<ComplaintStatus>()
            .map_err(StoreError::InvalidData)?,
        priority: priority as u8,
        complaint_number: row
            .try_get("complaint_number")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        timestamp: row
            .try_get::<DateTime<Utc>, _>("timestamp")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
    })
}

fn appointment_from_row(row: &SqliteRow) -> Result<AppointmentRecord, StoreError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| StoreError::InvalidData(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| StoreError::InvalidData(e.to_string()))?;

    Ok(AppointmentRecord {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::InvalidData(format!("Invalid UUID: {}", e)))?,
        mobile: row
            .try_get("mobile")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        customer_name: row
            .try_get("customer_name")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        reason: row
            .try_get("reason")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        scheduled_at: row
            .try_get("scheduled_at")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        status: status
            .parse::<AppointmentStatus>()
            .map_err(StoreError::InvalidData)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
    })
}

#[async_trait]
impl ComplaintStore for SqliteStore {
    async fn insert_complaint(&self, record: &ComplaintRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO complaints (id, mobile, name, address, product, issue, status, priority, complaint_number, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.mobile)
        .bind(&record.name)
        .bind(&record.address)
        .bind(&record.product)
        .bind(&record.issue)
        .bind(record.status.to_string())
        .bind(record.priority as i64)
        .bind(&record.complaint_number)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        debug!("Stored complaint {}", record.complaint_number);
        Ok(())
    }

    async fn find_latest_complaint(
        &self,
        mobile: &str,
    ) -> Result<Option<ComplaintRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM complaints WHERE mobile = ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(mobile)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(complaint_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_complaint_number(
        &self,
        complaint_number: &str,
    ) -> Result<Option<ComplaintRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM complaints WHERE complaint_number = ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(complaint_number)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(complaint_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn escalate_priority(
        &self,
        complaint_number: &str,
    ) -> Result<Option<Escalation>, StoreError> {
        // Conditional increment: the UPDATE re-checks the priority it read,
        // so two racing escalations cannot apply the same step twice.
        for _ in 0..ESCALATION_RETRIES {
            let row = sqlx::query(
                r#"
                SELECT mobile, priority FROM complaints
                WHERE complaint_number = ? AND status = 'pending'
                ORDER BY timestamp DESC LIMIT 1
                "#,
            )
            .bind(complaint_number)
            .fetch_optional(&self.pool)
            .await?;

            let row = match row {
                Some(row) => row,
                None => return Ok(None),
            };

            let mobile: String = row
                .try_get("mobile")
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
            let old_priority: i64 = row
                .try_get("priority")
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
            let new_priority = next_priority(old_priority as u8);

            let result = sqlx::query(
                r#"
                UPDATE complaints SET priority = ?, timestamp = ?
                WHERE complaint_number = ? AND status = 'pending' AND priority = ?
                "#,
            )
            .bind(new_priority as i64)
            .bind(Utc::now())
            .bind(complaint_number)
            .bind(old_priority)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                debug!(
                    "Escalated complaint {} from {} to {}",
                    complaint_number, old_priority, new_priority
                );
                return Ok(Some(Escalation {
                    complaint_number: complaint_number.to_string(),
                    mobile,
                    old_priority: old_priority as u8,
                    new_priority,
                }));
            }
        }

        Err(StoreError::Conflict(format!(
            "Escalation of complaint {} kept racing with concurrent updates",
            complaint_number
        )))
    }

    async fn insert_appointment(&self, record: &AppointmentRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO appointments (id, mobile, customer_name, reason, scheduled_at, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.mobile)
        .bind(&record.customer_name)
        .bind(&record.reason)
        .bind(&record.scheduled_at)
        .bind(record.status.to_string())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Stored appointment for {}", record.mobile);
        Ok(())
    }

    async fn find_latest_booked_appointment(
        &self,
        mobile: &str,
    ) -> Result<Option<AppointmentRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM appointments WHERE mobile = ? AND status = 'booked'
            ORDER BY updated_at DESC LIMIT 1
            "#,
        )
        .bind(mobile)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(appointment_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn reschedule_appointment(
        &self,
        mobile: &str,
        new_scheduled_at: &str,
    ) -> Result<Option<AppointmentRecord>, StoreError> {
        let appointment = match self.find_latest_booked_appointment(mobile).await? {
            Some(appointment) => appointment,
            None => return Ok(None),
        };

        let now = Utc::now();
        sqlx::query("UPDATE appointments SET scheduled_at = ?, updated_at = ? WHERE id = ?")
            .bind(new_scheduled_at)
            .bind(now)
            .bind(appointment.id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(Some(AppointmentRecord {
            scheduled_at: new_scheduled_at.to_string(),
            updated_at: now,
            ..appointment
        }))
    }

    async fn cancel_appointment(
        &self,
        mobile: &str,
    ) -> Result<Option<AppointmentRecord>, StoreError> {
        let appointment = match self.find_latest_booked_appointment(mobile).await? {
            Some(appointment) => appointment,
            None => return Ok(None),
        };

        let now = Utc::now();
        sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(AppointmentStatus::Cancelled.to_string())
            .bind(now)
            .bind(appointment.id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(Some(AppointmentRecord {
            status: AppointmentStatus::Cancelled,
            updated_at: now,
            ..appointment
        }))
    }
}

// Helper function to create a store instance
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn ComplaintStore>, StoreError> {
    let store = SqliteStore::new(config).await?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn memory_store() -> SqliteStore {
        let config = StoreConfig {
            database_url: "sqlite::memory:".to_string(),
            // A shared pool against :memory: would open one database per
            // connection; a single connection keeps tests on one database.
            max_connections: 1,
            enable_wal_mode: false,
            ..Default::default()
        };
        SqliteStore::new(&config).await.unwrap()
    }

    fn sample_complaint(mobile: &str) -> ComplaintRecord {
        ComplaintRecord::new("Asha", "12 MG Road", "Model X200", "No hot water", mobile)
    }

    #[tokio::test]
    async fn test_submit_and_find_latest() {
        let store = memory_store().await;
        let record = sample_complaint("+919000000001");

        store.insert_complaint(&record).await.unwrap();

        let found = store
            .find_latest_complaint("+919000000001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, ComplaintStatus::Pending);
        assert_eq!(found.priority, 1);
        assert!(!found.complaint_number.is_empty());
        assert_eq!(found.name, "Asha");
    }

    #[tokio::test]
    async fn test_latest_complaint_wins_by_timestamp() {
        let store = memory_store().await;

        let mut older = sample_complaint("+919000000002");
        older.issue = "older".to_string();
        older.timestamp = Utc::now() - Duration::hours(2);

        let mut newer = sample_complaint("+919000000002");
        newer.issue = "newer".to_string();

        store.insert_complaint(&older).await.unwrap();
        store.insert_complaint(&newer).await.unwrap();

        let found = store
            .find_latest_complaint("+919000000002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.issue, "newer");
    }

    #[tokio::test]
    async fn test_find_latest_unknown_number_is_none() {
        let store = memory_store().await;
        let found = store.find_latest_complaint("+919999999999").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_escalation_steps_and_caps_at_five() {
        let store = memory_store().await;
        let mut record = sample_complaint("+919000000003");
        record.complaint_number = "4821".to_string();
        record.priority = 2;
        store.insert_complaint(&record).await.unwrap();

        let escalation = store.escalate_priority("4821").await.unwrap().unwrap();
        assert_eq!(escalation.old_priority, 2);
        assert_eq!(escalation.new_priority, 3);
        assert_eq!(escalation.mobile, "+919000000003");

        let stored = store
            .find_by_complaint_number("4821")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.priority, 3);

        // Keep escalating past the cap
        store.escalate_priority("4821").await.unwrap().unwrap();
        store.escalate_priority("4821").await.unwrap().unwrap();
        let capped = store.escalate_priority("4821").await.unwrap().unwrap();
        assert_eq!(capped.old_priority, 5);
        assert_eq!(capped.new_priority, 5);
    }

    #[tokio::test]
    async fn test_escalate_unknown_number_is_not_found() {
        let store = memory_store().await;
        let outcome = store.escalate_priority("9999").await.unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_escalate_resolved_complaint_is_not_found() {
        let store = memory_store().await;
        let mut record = sample_complaint("+919000000004");
        record.complaint_number = "7777".to_string();
        record.status = ComplaintStatus::Resolved;
        store.insert_complaint(&record).await.unwrap();

        let outcome = store.escalate_priority("7777").await.unwrap();
        assert!(outcome.is_none());

        let stored = store
            .find_by_complaint_number("7777")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.priority, 1);
    }

    #[tokio::test]
    async fn test_appointment_lifecycle() {
        let store = memory_store().await;
        let appointment =
            AppointmentRecord::new("Rahul", "routine check-up", "Monday 10 AM", "+919000000005");
        store.insert_appointment(&appointment).await.unwrap();

        let booked = store
            .find_latest_booked_appointment("+919000000005")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(booked.status, AppointmentStatus::Booked);
        assert_eq!(booked.scheduled_at, "Monday 10 AM");

        let rescheduled = store
            .reschedule_appointment("+919000000005", "Tuesday 3 PM")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rescheduled.scheduled_at, "Tuesday 3 PM");

        let cancelled = store
            .cancel_appointment("+919000000005")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

        let remaining = store
            .find_latest_booked_appointment("+919000000005")
            .await
            .unwrap();
        assert!(remaining.is_none());
    }

    #[tokio::test]
    async fn test_reschedule_without_booking_is_not_found() {
        let store = memory_store().await;
        let outcome = store
            .reschedule_appointment("+919000000006", "Friday 5 PM")
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
