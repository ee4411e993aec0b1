use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "test_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TestType {
    #[default]
    Manual,
    Automated,
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "test_case_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TestCaseStatus {
    #[default]
    Draft,
    Ready,
    Deprecated,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TestCase {
    pub id: Uuid,
    pub feature_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub steps: Option<String>,
    pub expected_result: Option<String>,
    pub priority: Priority,
    pub test_type: TestType,
    pub status: TestCaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape consumed by list views: the test case joined with its feature
/// name.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS, PartialEq)]
pub struct TestCaseSummary {
    pub id: Uuid,
    pub title: String,
    pub feature_id: Uuid,
    pub feature_name: String,
    pub priority: Priority,
    pub test_type: TestType,
    pub status: TestCaseStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTestCase {
    pub feature_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub steps: Option<String>,
    pub expected_result: Option<String>,
    pub priority: Option<Priority>,
    pub test_type: Option<TestType>,
    pub status: Option<TestCaseStatus>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateTestCase {
    pub title: Option<String>,
    pub description: Option<String>,
    pub steps: Option<String>,
    pub expected_result: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TestCaseStatus>,
}

/// Parameters for one page of the test-case list.
///
/// `search` matches the title only, as a case-insensitive substring. Scalar
/// filters are conjunctive; `None` means unrestricted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
pub struct TestCasePageQuery {
    pub test_type: TestType,
    pub search: Option<String>,
    pub feature_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub status: Option<TestCaseStatus>,
    pub page_index: i64,
}

impl TestCasePageQuery {
    pub const PAGE_SIZE: i64 = 20;

    pub fn first_page(test_type: TestType) -> Self {
        Self {
            test_type,
            search: None,
            feature_id: None,
            priority: None,
            status: None,
            page_index: 0,
        }
    }
}

impl TestCase {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT id, feature_id, title, description, steps, expected_result, priority, test_type, status, created_at, updated_at
               FROM test_cases
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTestCase,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let priority = data.priority.unwrap_or_default();
        let test_type = data.test_type.unwrap_or_default();
        let status = data.status.unwrap_or_default();
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO test_cases (id, feature_id, title, description, steps, expected_result, priority, test_type, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, feature_id, title, description, steps, expected_result, priority, test_type, status, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.feature_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.steps)
        .bind(&data.expected_result)
        .bind(priority)
        .bind(test_type)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateTestCase,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"UPDATE test_cases
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   steps = COALESCE($4, steps),
                   expected_result = COALESCE($5, expected_result),
                   priority = COALESCE($6, priority),
                   status = COALESCE($7, status),
                   updated_at = CURRENT_TIMESTAMP
               WHERE id = $1
               RETURNING id, feature_id, title, description, steps, expected_result, priority, test_type, status, created_at, updated_at"#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.steps)
        .bind(&data.expected_result)
        .bind(data.priority)
        .bind(data.status)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM test_cases WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Fetch one page of test-case summaries matching `query`, newest-created
    /// first. Ties on `created_at` break by insertion order, newest first, so
    /// page boundaries stay stable between calls.
    pub async fn find_page(
        pool: &SqlitePool,
        query: &TestCasePageQuery,
    ) -> Result<Vec<TestCaseSummary>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT tc.id, tc.title, tc.feature_id, f.name AS feature_name, \
             tc.priority, tc.test_type, tc.status, tc.description, tc.created_at \
             FROM test_cases tc \
             JOIN features f ON f.id = tc.feature_id \
             WHERE tc.test_type = ",
        );
        qb.push_bind(query.test_type);
        if let Some(feature_id) = query.feature_id {
            qb.push(" AND tc.feature_id = ");
            qb.push_bind(feature_id);
        }
        if let Some(priority) = query.priority {
            qb.push(" AND tc.priority = ");
            qb.push_bind(priority);
        }
        if let Some(status) = query.status {
            qb.push(" AND tc.status = ");
            qb.push_bind(status);
        }
        if let Some(search) = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            qb.push(" AND instr(lower(tc.title), lower(");
            qb.push_bind(search.to_owned());
            qb.push(")) > 0");
        }
        qb.push(" ORDER BY tc.created_at DESC, tc.rowid DESC LIMIT ");
        qb.push_bind(TestCasePageQuery::PAGE_SIZE);
        qb.push(" OFFSET ");
        qb.push_bind(query.page_index * TestCasePageQuery::PAGE_SIZE);

        qb.build_query_as::<TestCaseSummary>().fetch_all(pool).await
    }
}
