use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::test_case::Priority;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "bug_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BugStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Bug {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub severity: Priority,
    pub status: BugStatus,
    pub test_case_id: Option<Uuid>,
    pub test_run_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateBug {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub severity: Option<Priority>,
    pub test_case_id: Option<Uuid>,
    pub test_run_id: Option<Uuid>,
}

const BUG_COLUMNS: &str = "id, project_id, title, description, severity, status, test_case_id, test_run_id, created_at, updated_at";

impl Bug {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!("SELECT {BUG_COLUMNS} FROM bugs WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {BUG_COLUMNS} FROM bugs WHERE project_id = $1 ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateBug, id: Uuid) -> Result<Self, sqlx::Error> {
        let severity = data.severity.unwrap_or_default();
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO bugs (id, project_id, title, description, severity, test_case_id, test_run_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {BUG_COLUMNS}"
        ))
        .bind(id)
        .bind(data.project_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(severity)
        .bind(data.test_case_id)
        .bind(data.test_run_id)
        .fetch_one(pool)
        .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: BugStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE bugs SET status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bugs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
