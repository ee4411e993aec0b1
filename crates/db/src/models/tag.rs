use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Tag {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Many-to-many membership row between test cases and tags.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct TestCaseTag {
    pub test_case_id: Uuid,
    pub tag_id: Uuid,
}

impl Tag {
    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT id, project_id, name, created_at
               FROM tags
               WHERE project_id = $1
               ORDER BY name ASC"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        project_id: Uuid,
        name: &str,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO tags (id, project_id, name)
               VALUES ($1, $2, $3)
               RETURNING id, project_id, name, created_at"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(name)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl TestCaseTag {
    pub async fn assign(
        pool: &SqlitePool,
        test_case_id: Uuid,
        tag_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT OR IGNORE INTO test_case_tags (test_case_id, tag_id) VALUES ($1, $2)",
        )
        .bind(test_case_id)
        .bind(tag_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn unassign(
        pool: &SqlitePool,
        test_case_id: Uuid,
        tag_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM test_case_tags WHERE test_case_id = $1 AND tag_id = $2")
                .bind(test_case_id)
                .bind(tag_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Membership rows for any of `tag_ids`, restricted to `case_ids`. Both
    /// lists are expected to be small (selected filter tags and the test
    /// cases already loaded into the view).
    pub async fn find_memberships(
        pool: &SqlitePool,
        tag_ids: &[Uuid],
        case_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if tag_ids.is_empty() || case_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT test_case_id, tag_id FROM test_case_tags WHERE tag_id IN (",
        );
        {
            let mut separated = qb.separated(", ");
            for tag_id in tag_ids {
                separated.push_bind(*tag_id);
            }
        }
        qb.push(") AND test_case_id IN (");
        {
            let mut separated = qb.separated(", ");
            for case_id in case_ids {
                separated.push_bind(*case_id);
            }
        }
        qb.push(")");

        qb.build_query_as::<Self>().fetch_all(pool).await
    }
}
