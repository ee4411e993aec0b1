//! State controller for the test-execution view: accumulates paginated
//! test-case fetches, narrows them by tag membership, and annotates them with
//! the execution overlay for the selected test run.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use chrono::Utc;
use db::models::{
    execution::Execution,
    test_case::{Priority, TestCasePageQuery, TestCaseStatus, TestCaseSummary, TestType},
};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    debounce::{DebouncedInput, SearchDebouncer},
    notification::NotificationService,
    projection::{ProjectedCase, ResultFilter, project},
    view_store::{ExecutionViewStore, StoreError},
};

pub const OVERLAY_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Feature name stamped on the built-in sample cases, so callers and tests
/// can tell fallback content from real rows.
pub const SAMPLE_FEATURE_NAME: &str = "Sample data";

/// Page-fetch cycle states.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ListPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Overlay-load cycle states, tracked separately from the list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OverlayPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Active filter selection. Every field defaults to "unrestricted"; fields
/// are only ever replaced one at a time or reset all at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct FilterSet {
    pub feature_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub status: Option<TestCaseStatus>,
    pub tag_ids: Vec<Uuid>,
    pub result: ResultFilter,
}

impl FilterSet {
    pub fn clear_all(&mut self) {
        *self = Self::default();
    }
}

/// A single-field filter update. No cross-field validation happens: selecting
/// a tag with zero matches is allowed and simply empties the projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "name", content = "value", rename_all = "snake_case")]
pub enum FilterChange {
    Feature(Option<Uuid>),
    Priority(Option<Priority>),
    Status(Option<TestCaseStatus>),
    Tags(Vec<Uuid>),
    Result(ResultFilter),
}

/// A page fetch in flight: the sequence number it was issued with and the
/// parameters frozen at issue time. Responses are only applied if no newer
/// request has been issued since.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub seq: u64,
    pub reset: bool,
    pub query: TestCasePageQuery,
}

/// Owns the list, filter, and overlay state for one (test type, test run)
/// pairing. Constructed per view; switching test type means constructing a
/// new controller.
pub struct ExecutionViewController {
    store: Arc<dyn ExecutionViewStore>,
    notifications: NotificationService,
    debouncer: SearchDebouncer,
    test_type: TestType,
    test_run_id: Option<Uuid>,
    filters: FilterSet,
    search_text: String,
    cases: Vec<TestCaseSummary>,
    next_page: i64,
    has_more: bool,
    list_phase: ListPhase,
    overlay_phase: OverlayPhase,
    overlay: HashMap<Uuid, Execution>,
    /// `None` while no tag filter is active; `Some` holds the ids of loaded
    /// cases that belong to at least one selected tag.
    tag_matches: Option<HashSet<Uuid>>,
    issued_seq: u64,
}

impl ExecutionViewController {
    pub fn new(
        store: Arc<dyn ExecutionViewStore>,
        notifications: NotificationService,
        test_type: TestType,
    ) -> Self {
        Self {
            store,
            notifications,
            debouncer: SearchDebouncer::default(),
            test_type,
            test_run_id: None,
            filters: FilterSet::default(),
            search_text: String::new(),
            cases: Vec::new(),
            next_page: 0,
            has_more: false,
            list_phase: ListPhase::Idle,
            overlay_phase: OverlayPhase::Idle,
            overlay: HashMap::new(),
            tag_matches: None,
            issued_seq: 0,
        }
    }

    pub fn test_type(&self) -> TestType {
        self.test_type
    }

    pub fn test_run_id(&self) -> Option<Uuid> {
        self.test_run_id
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn test_cases(&self) -> &[TestCaseSummary] {
        &self.cases
    }

    pub fn executions(&self) -> &HashMap<Uuid, Execution> {
        &self.overlay
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn list_phase(&self) -> ListPhase {
        self.list_phase
    }

    pub fn is_loading(&self) -> bool {
        self.list_phase == ListPhase::Loading
    }

    pub fn overlay_phase(&self) -> OverlayPhase {
        self.overlay_phase
    }

    pub fn is_loading_executions(&self) -> bool {
        self.overlay_phase == OverlayPhase::Loading
    }

    /// The list the presentation layer renders: loaded pages narrowed by tag
    /// membership, annotated and filtered by execution result.
    pub fn filtered_test_cases(&self) -> Vec<ProjectedCase> {
        match &self.tag_matches {
            None => project(&self.cases, &self.overlay, self.filters.result),
            Some(members) => {
                let narrowed: Vec<TestCaseSummary> = self
                    .cases
                    .iter()
                    .filter(|c| members.contains(&c.id))
                    .cloned()
                    .collect();
                project(&narrowed, &self.overlay, self.filters.result)
            }
        }
    }

    /// Issue a page fetch: bump the sequence number and freeze the query
    /// parameters. The matching response goes through [`apply_page_fetch`].
    ///
    /// [`apply_page_fetch`]: Self::apply_page_fetch
    pub fn begin_page_fetch(&mut self, reset: bool) -> PageRequest {
        self.issued_seq += 1;
        self.list_phase = ListPhase::Loading;
        let page_index = if reset { 0 } else { self.next_page };
        PageRequest {
            seq: self.issued_seq,
            reset,
            query: TestCasePageQuery {
                test_type: self.test_type,
                search: (!self.search_text.trim().is_empty())
                    .then(|| self.search_text.trim().to_string()),
                feature_id: self.filters.feature_id,
                priority: self.filters.priority,
                status: self.filters.status,
                page_index,
            },
        }
    }

    /// Apply a page-fetch response. A response for anything but the newest
    /// issued request is stale and silently discarded (last request wins).
    /// Returns whether the response was applied.
    pub async fn apply_page_fetch(
        &mut self,
        request: PageRequest,
        result: Result<Vec<TestCaseSummary>, StoreError>,
    ) -> bool {
        if request.seq != self.issued_seq {
            debug!(
                stale_seq = request.seq,
                current_seq = self.issued_seq,
                "discarding stale page response"
            );
            return false;
        }

        match result {
            Ok(rows) => {
                self.has_more = rows.len() as i64 == TestCasePageQuery::PAGE_SIZE;
                self.next_page = request.query.page_index + 1;
                if request.reset {
                    self.cases = rows;
                } else {
                    self.cases.extend(rows);
                }
                self.list_phase = ListPhase::Loaded;
            }
            Err(error) => {
                warn!(
                    test_type = %self.test_type,
                    %error,
                    "test case fetch failed, falling back to sample data"
                );
                self.cases = sample_test_cases(self.test_type);
                self.has_more = false;
                self.list_phase = ListPhase::Error;
                self.notifications
                    .warn(
                        "Test cases unavailable",
                        "Showing sample test cases; the backing store could not be reached.",
                    )
                    .await;
            }
        }
        true
    }

    /// Fetch a page for the current filters. `reset` replaces the
    /// accumulated list and starts over from page 0; otherwise the next page
    /// is appended.
    pub async fn load_test_cases(&mut self, reset: bool) {
        let request = self.begin_page_fetch(reset);
        let result = self.store.fetch_test_case_page(&request.query).await;
        if self.apply_page_fetch(request, result).await && !self.filters.tag_ids.is_empty() {
            self.refresh_tag_matches().await;
        }
    }

    /// Append the next page. No-op while a fetch is in flight or when the
    /// last page was short. Returns whether a fetch was started.
    pub async fn handle_load_more(&mut self) -> bool {
        if self.list_phase == ListPhase::Loading || !self.has_more {
            return false;
        }
        self.load_test_cases(false).await;
        true
    }

    /// Replace exactly one filter field and react to it: scalar filters
    /// restart pagination, tag changes only recompute the in-memory
    /// narrowing, and the result filter is applied at projection time.
    pub async fn handle_filter_change(&mut self, change: FilterChange) {
        match change {
            FilterChange::Feature(feature_id) => {
                self.filters.feature_id = feature_id;
                self.load_test_cases(true).await;
            }
            FilterChange::Priority(priority) => {
                self.filters.priority = priority;
                self.load_test_cases(true).await;
            }
            FilterChange::Status(status) => {
                self.filters.status = status;
                self.load_test_cases(true).await;
            }
            FilterChange::Tags(tag_ids) => {
                self.filters.tag_ids = tag_ids;
                self.refresh_tag_matches().await;
            }
            FilterChange::Result(result) => {
                self.filters.result = result;
            }
        }
    }

    /// Reset every filter to its default in one step and refetch.
    pub async fn clear_filters(&mut self) {
        self.filters.clear_all();
        self.tag_matches = None;
        self.load_test_cases(true).await;
    }

    /// Queue a search keystroke. The caller settles the returned input and,
    /// if it survives the debounce window, passes it to [`apply_search`].
    ///
    /// [`apply_search`]: Self::apply_search
    pub fn queue_search(&self, text: impl Into<String>) -> DebouncedInput {
        self.debouncer.submit(text)
    }

    /// Apply a settled search string and restart pagination.
    pub async fn apply_search(&mut self, text: String) {
        if self.search_text == text {
            return;
        }
        self.search_text = text;
        self.load_test_cases(true).await;
    }

    async fn refresh_tag_matches(&mut self) {
        if self.filters.tag_ids.is_empty() {
            self.tag_matches = None;
            return;
        }
        let candidates: Vec<Uuid> = self.cases.iter().map(|c| c.id).collect();
        match self
            .store
            .find_tag_memberships(&self.filters.tag_ids, &candidates)
            .await
        {
            Ok(rows) => {
                self.tag_matches = Some(rows.into_iter().map(|m| m.test_case_id).collect());
            }
            Err(error) => {
                // An active but failing tag filter suppresses all results
                // rather than pretending no filter is set.
                warn!(%error, "tag membership lookup failed, suppressing results");
                self.tag_matches = Some(HashSet::new());
            }
        }
    }

    /// Load the execution overlay for a run. `None` clears the overlay so
    /// every case reads as not executed. A run that exists but has zero
    /// execution rows is repaired once by backfilling placeholders, then
    /// re-read; fetch failures never trigger the repair.
    pub async fn load_test_executions(&mut self, test_run_id: Option<Uuid>) {
        self.test_run_id = test_run_id;
        self.overlay.clear();
        let Some(run_id) = test_run_id else {
            self.overlay_phase = OverlayPhase::Idle;
            return;
        };

        self.overlay_phase = OverlayPhase::Loading;
        let rows = match self.fetch_executions(run_id).await {
            Ok(rows) if rows.is_empty() => {
                match self.store.ensure_executions_exist(run_id).await {
                    Ok(created) if created > 0 => {
                        info!(test_run_id = %run_id, created, "backfilled executions, re-reading");
                        match self.fetch_executions(run_id).await {
                            Ok(rows) => rows,
                            Err(error) => {
                                self.fail_overlay(run_id, error).await;
                                return;
                            }
                        }
                    }
                    Ok(_) => Vec::new(),
                    Err(error) => {
                        warn!(test_run_id = %run_id, %error, "execution backfill failed");
                        Vec::new()
                    }
                }
            }
            Ok(rows) => rows,
            Err(error) => {
                self.fail_overlay(run_id, error).await;
                return;
            }
        };

        self.overlay = build_overlay(rows);
        self.overlay_phase = OverlayPhase::Loaded;
    }

    async fn fetch_executions(&self, run_id: Uuid) -> Result<Vec<Execution>, StoreError> {
        timeout(OVERLAY_LOAD_TIMEOUT, self.store.executions_for_run(run_id))
            .await
            .map_err(|_| StoreError::Timeout(OVERLAY_LOAD_TIMEOUT))?
    }

    async fn fail_overlay(&mut self, run_id: Uuid, error: StoreError) {
        warn!(test_run_id = %run_id, %error, "execution load failed, overlay left empty");
        self.overlay_phase = OverlayPhase::Error;
        self.notifications
            .warn(
                "Executions unavailable",
                "Execution results could not be loaded; cases are shown as not executed.",
            )
            .await;
    }
}

/// Keep the latest execution per case: rows are sorted by `executed_at`
/// ascending (never-executed placeholders first) so later executions
/// overwrite earlier ones in the map.
fn build_overlay(mut rows: Vec<Execution>) -> HashMap<Uuid, Execution> {
    rows.sort_by_key(|e| e.executed_at);
    let mut overlay = HashMap::with_capacity(rows.len());
    for row in rows {
        overlay.insert(row.test_case_id, row);
    }
    overlay
}

/// Static placeholder cases shown when the store is unreachable. Marked with
/// [`SAMPLE_FEATURE_NAME`] and a nil feature id so they are never mistaken
/// for real rows.
pub fn sample_test_cases(test_type: TestType) -> Vec<TestCaseSummary> {
    let (base, titles): (u128, &[&str]) = match test_type {
        TestType::Manual => (
            0xA0,
            &[
                "Login form rejects an unknown user",
                "Password reset email is delivered",
                "Profile edits persist after reload",
            ],
        ),
        TestType::Automated => (
            0xB0,
            &[
                "API returns 401 without a token",
                "Bulk import completes within limits",
                "Smoke suite passes on a clean build",
            ],
        ),
    };
    titles
        .iter()
        .enumerate()
        .map(|(i, title)| TestCaseSummary {
            id: Uuid::from_u128(base + i as u128),
            title: (*title).to_string(),
            feature_id: Uuid::nil(),
            feature_name: SAMPLE_FEATURE_NAME.to_string(),
            priority: Priority::Medium,
            test_type,
            status: TestCaseStatus::Ready,
            description: Some("Built-in sample shown while the store is unreachable.".to_string()),
            created_at: Utc::now(),
        })
        .collect()
}
