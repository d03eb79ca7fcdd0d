//! Database layer: migrations, the installment table, and session markers.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use loan_protocol::{AuthError, Installment, InstallmentStore, LoanError, SessionStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::errors::Result;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied successfully");
    Ok(())
}

fn unavailable(e: sqlx::Error) -> LoanError {
    error!("Installment store error: {e}");
    LoanError::StoreUnavailable(e.to_string())
}

// ─────────────────────────────────────────────────────────
// Installments
// ─────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct InstallmentRow {
    id: String,
    installment_number: i64,
    due_date: NaiveDate,
    paid: bool,
    paid_at: Option<DateTime<Utc>>,
}

impl From<InstallmentRow> for Installment {
    fn from(row: InstallmentRow) -> Self {
        Installment {
            id: row.id,
            // Out-of-range numbers become 0, which sequence validation rejects.
            sequence_number: u32::try_from(row.installment_number).unwrap_or(0),
            due_date: row.due_date,
            paid: row.paid,
            paid_at: row.paid_at,
        }
    }
}

/// [`InstallmentStore`] backed by the `installments` table.
#[derive(Clone)]
pub struct SqliteInstallmentStore {
    pool: SqlitePool,
}

impl SqliteInstallmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstallmentStore for SqliteInstallmentStore {
    async fn list(&self) -> loan_protocol::Result<Vec<Installment>> {
        let rows = sqlx::query_as::<_, InstallmentRow>(
            r#"
            SELECT id, installment_number, due_date, paid, paid_at
            FROM   installments
            ORDER  BY installment_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(rows.into_iter().map(Installment::from).collect())
    }

    /// Only applies when the stored flag differs from `paid`.
    async fn set_paid(&self, id: &str, paid: bool) -> loan_protocol::Result<()> {
        let now = Utc::now();
        let rows_affected = sqlx::query(
            r#"
            UPDATE installments
            SET    paid = ?1, paid_at = ?2, updated_at = ?3
            WHERE  id = ?4 AND paid != ?1
            "#,
        )
        .bind(paid)
        .bind(paid.then_some(now))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?
        .rows_affected();

        if rows_affected == 1 {
            return Ok(());
        }

        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM installments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        match exists {
            Some(_) => Err(LoanError::StaleSnapshot(id.to_string())),
            None => Err(LoanError::UnknownInstallment(id.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Session markers
// ─────────────────────────────────────────────────────────

/// [`SessionStore`] over the `session_kv` table, scoped to one session id.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    session_id: String,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool, session_id: impl Into<String>) -> Self {
        Self {
            pool,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, AuthError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM session_kv WHERE session_id = ?1 AND key = ?2")
                .bind(&self.session_id)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AuthError::Session(e.to_string()))?;
        Ok(row.map(|(v,)| v))
    }

    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO session_kv (session_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (session_id, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.session_id)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Session(e.to_string()))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Test helpers
// ─────────────────────────────────────────────────────────

/// Single-connection in-memory pool with migrations applied.
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Insert `count` unpaid monthly installments due on the 10th of 2025.
#[cfg(test)]
pub async fn insert_schedule(pool: &SqlitePool, count: u32) {
    for n in 1..=count {
        sqlx::query("INSERT INTO installments (id, installment_number, due_date) VALUES (?1, ?2, ?3)")
            .bind(format!("inst-{n}"))
            .bind(i64::from(n))
            .bind(NaiveDate::from_ymd_opt(2025, n, 10).unwrap())
            .execute(pool)
            .await
            .unwrap();
    }
}
