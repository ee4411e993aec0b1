//! Pure projection of fetched test-case pages against the execution overlay.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use db::models::{
    execution::{Execution, ExecutionStatus},
    test_case::TestCaseSummary,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Result filter selected in the view. `NotExecuted` deliberately also
/// matches stored `pending` rows: a placeholder that was never run reads the
/// same as a missing row to the user.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultFilter {
    #[default]
    All,
    NotExecuted,
    Passed,
    Failed,
    Blocked,
    Skipped,
}

/// Display status of a case in the execution view. `NotExecuted` exists only
/// here; it is never written to the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViewStatus {
    NotExecuted,
    Pending,
    Passed,
    Failed,
    Blocked,
    Skipped,
}

impl From<ExecutionStatus> for ViewStatus {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Pending => Self::Pending,
            ExecutionStatus::Passed => Self::Passed,
            ExecutionStatus::Failed => Self::Failed,
            ExecutionStatus::Blocked => Self::Blocked,
            ExecutionStatus::Skipped => Self::Skipped,
        }
    }
}

impl ResultFilter {
    pub fn matches(&self, status: ViewStatus) -> bool {
        match self {
            Self::All => true,
            Self::NotExecuted => {
                matches!(status, ViewStatus::NotExecuted | ViewStatus::Pending)
            }
            Self::Passed => status == ViewStatus::Passed,
            Self::Failed => status == ViewStatus::Failed,
            Self::Blocked => status == ViewStatus::Blocked,
            Self::Skipped => status == ViewStatus::Skipped,
        }
    }
}

/// A test case annotated with its execution outcome for the selected run.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
pub struct ProjectedCase {
    #[serde(flatten)]
    #[ts(flatten)]
    pub case: TestCaseSummary,
    pub execution: ViewStatus,
    pub executed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Annotate every case with its overlay status (missing entry reads as
/// `NotExecuted`), then keep the cases matching `result_filter`. Pure and
/// order-preserving with respect to `cases`.
pub fn project(
    cases: &[TestCaseSummary],
    overlay: &HashMap<Uuid, Execution>,
    result_filter: ResultFilter,
) -> Vec<ProjectedCase> {
    cases
        .iter()
        .filter_map(|case| {
            let entry = overlay.get(&case.id);
            let status = entry
                .map(|e| ViewStatus::from(e.status))
                .unwrap_or(ViewStatus::NotExecuted);
            result_filter.matches(status).then(|| ProjectedCase {
                case: case.clone(),
                execution: status,
                executed_at: entry.and_then(|e| e.executed_at),
                notes: entry.and_then(|e| e.notes.clone()),
            })
        })
        .collect()
}
