use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use tracing::debug;
use ts_rs::TS;
use uuid::Uuid;

use super::test_run::TestRun;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "execution_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Passed,
    Failed,
    Blocked,
    Skipped,
}

/// One execution of a test case within a test run. A (run, case) pair may
/// have several historical rows; re-executions insert rather than overwrite.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct Execution {
    pub id: Uuid,
    pub test_run_id: Uuid,
    pub test_case_id: Uuid,
    pub status: ExecutionStatus,
    pub executed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const EXECUTION_COLUMNS: &str =
    "id, test_run_id, test_case_id, status, executed_at, notes, created_at, updated_at";

impl Execution {
    pub async fn find_by_test_run_id(
        pool: &SqlitePool,
        test_run_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions WHERE test_run_id = $1 ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(test_run_id)
        .fetch_all(pool)
        .await
    }

    /// Insert a fresh execution row, used when a case is re-executed within
    /// the same run.
    pub async fn create(
        pool: &SqlitePool,
        test_run_id: Uuid,
        test_case_id: Uuid,
        status: ExecutionStatus,
        notes: Option<&str>,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO executions (id, test_run_id, test_case_id, status, executed_at, notes) \
             VALUES ($1, $2, $3, $4, CURRENT_TIMESTAMP, $5) \
             RETURNING {EXECUTION_COLUMNS}"
        ))
        .bind(id)
        .bind(test_run_id)
        .bind(test_case_id)
        .bind(status)
        .bind(notes)
        .fetch_one(pool)
        .await
    }

    /// Record the outcome of the most recent execution row for the pair,
    /// stamping `executed_at`.
    pub async fn record_result(
        pool: &SqlitePool,
        test_run_id: Uuid,
        test_case_id: Uuid,
        status: ExecutionStatus,
        notes: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "UPDATE executions \
             SET status = $3, notes = $4, executed_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP \
             WHERE id = ( \
                 SELECT id FROM executions \
                 WHERE test_run_id = $1 AND test_case_id = $2 \
                 ORDER BY created_at DESC, rowid DESC \
                 LIMIT 1) \
             RETURNING {EXECUTION_COLUMNS}"
        ))
        .bind(test_run_id)
        .bind(test_case_id)
        .bind(status)
        .bind(notes)
        .fetch_optional(pool)
        .await
    }

    /// Backfill a pending placeholder row for every non-deprecated test case
    /// in the run's project that has no execution for this run yet.
    /// Idempotent; returns the number of rows inserted. A run id that does
    /// not exist inserts nothing.
    pub async fn ensure_for_run(pool: &SqlitePool, test_run_id: Uuid) -> Result<u64, sqlx::Error> {
        let Some(run) = TestRun::find_by_id(pool, test_run_id).await? else {
            return Ok(0);
        };

        let missing: Vec<(Uuid,)> = sqlx::query_as(
            r#"SELECT tc.id
               FROM test_cases tc
               JOIN features f ON f.id = tc.feature_id
               WHERE f.project_id = $1
                 AND tc.status != 'deprecated'
                 AND NOT EXISTS (
                     SELECT 1 FROM executions e
                     WHERE e.test_run_id = $2 AND e.test_case_id = tc.id)"#,
        )
        .bind(run.project_id)
        .bind(test_run_id)
        .fetch_all(pool)
        .await?;

        if missing.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        for (test_case_id,) in &missing {
            sqlx::query(
                "INSERT INTO executions (id, test_run_id, test_case_id, status) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(test_run_id)
            .bind(test_case_id)
            .bind(ExecutionStatus::Pending)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(
            test_run_id = %test_run_id,
            inserted = missing.len(),
            "backfilled placeholder executions"
        );
        Ok(missing.len() as u64)
    }
}
