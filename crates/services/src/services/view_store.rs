//! Store interface consumed by the execution view, and its SQLite-backed
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use db::{
    DBService,
    models::{
        execution::Execution,
        tag::TestCaseTag,
        test_case::{TestCase, TestCasePageQuery, TestCaseSummary},
    },
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store did not respond within {0:?}")]
    Timeout(Duration),
}

/// Read operations the execution view needs from the backing store. The view
/// controller only ever consumes this trait, so tests can substitute an
/// in-memory implementation.
#[async_trait]
pub trait ExecutionViewStore: Send + Sync {
    /// One page of test-case summaries for the query, newest-created first.
    async fn fetch_test_case_page(
        &self,
        query: &TestCasePageQuery,
    ) -> Result<Vec<TestCaseSummary>, StoreError>;

    /// Tag membership rows restricted to the given tags and candidate cases.
    async fn find_tag_memberships(
        &self,
        tag_ids: &[Uuid],
        case_ids: &[Uuid],
    ) -> Result<Vec<TestCaseTag>, StoreError>;

    /// Every execution row recorded for a run, oldest first.
    async fn executions_for_run(&self, test_run_id: Uuid) -> Result<Vec<Execution>, StoreError>;

    /// Idempotent repair: backfill pending placeholder executions for cases
    /// missing a row in this run. Returns the number inserted.
    async fn ensure_executions_exist(&self, test_run_id: Uuid) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct SqliteViewStore {
    db: DBService,
}

impl SqliteViewStore {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExecutionViewStore for SqliteViewStore {
    async fn fetch_test_case_page(
        &self,
        query: &TestCasePageQuery,
    ) -> Result<Vec<TestCaseSummary>, StoreError> {
        Ok(TestCase::find_page(&self.db.pool, query).await?)
    }

    async fn find_tag_memberships(
        &self,
        tag_ids: &[Uuid],
        case_ids: &[Uuid],
    ) -> Result<Vec<TestCaseTag>, StoreError> {
        Ok(TestCaseTag::find_memberships(&self.db.pool, tag_ids, case_ids).await?)
    }

    async fn executions_for_run(&self, test_run_id: Uuid) -> Result<Vec<Execution>, StoreError> {
        Ok(Execution::find_by_test_run_id(&self.db.pool, test_run_id).await?)
    }

    async fn ensure_executions_exist(&self, test_run_id: Uuid) -> Result<u64, StoreError> {
        Ok(Execution::ensure_for_run(&self.db.pool, test_run_id).await?)
    }
}
