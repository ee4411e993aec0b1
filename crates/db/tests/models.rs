use db::{
    DBService,
    models::{
        bug::{Bug, BugStatus, CreateBug},
        execution::{Execution, ExecutionStatus},
        feature::{CreateFeature, Feature, UpdateFeature},
        project::{CreateProject, Project, UpdateProject},
        tag::{Tag, TestCaseTag},
        test_case::{
            CreateTestCase, Priority, TestCase, TestCasePageQuery, TestCaseStatus, TestType,
            UpdateTestCase,
        },
        test_run::{CreateTestRun, TestRun, TestRunStatus},
    },
};
use uuid::Uuid;

async fn db() -> DBService {
    DBService::new_in_memory().await.expect("in-memory db")
}

async fn seed_project(db: &DBService) -> Project {
    Project::create(
        &db.pool,
        &CreateProject {
            name: "Storefront".to_string(),
            description: Some("web shop".to_string()),
        },
        Uuid::new_v4(),
    )
    .await
    .expect("create project")
}

async fn seed_feature(db: &DBService, project_id: Uuid) -> Feature {
    Feature::create(
        &db.pool,
        &CreateFeature {
            project_id,
            name: "Checkout".to_string(),
            description: None,
        },
        Uuid::new_v4(),
    )
    .await
    .expect("create feature")
}

fn new_case(feature_id: Uuid, title: &str) -> CreateTestCase {
    CreateTestCase {
        feature_id,
        title: title.to_string(),
        description: None,
        steps: None,
        expected_result: None,
        priority: None,
        test_type: Some(TestType::Manual),
        status: Some(TestCaseStatus::Ready),
    }
}

#[tokio::test]
async fn project_crud_round_trip() {
    let db = db().await;
    let project = seed_project(&db).await;

    let found = Project::find_by_id(&db.pool, project.id)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(found.name, "Storefront");

    let updated = Project::update(
        &db.pool,
        project.id,
        &UpdateProject {
            name: Some("Storefront v2".to_string()),
            description: None,
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.name, "Storefront v2");
    assert_eq!(updated.description.as_deref(), Some("web shop"));

    assert_eq!(Project::delete(&db.pool, project.id).await.expect("delete"), 1);
    assert!(
        Project::find_by_id(&db.pool, project.id)
            .await
            .expect("query")
            .is_none()
    );
}

#[tokio::test]
async fn feature_queries_scope_to_project() {
    let db = db().await;
    let project = seed_project(&db).await;
    let other = Project::create(
        &db.pool,
        &CreateProject {
            name: "Other".to_string(),
            description: None,
        },
        Uuid::new_v4(),
    )
    .await
    .expect("create project");

    let feature = seed_feature(&db, project.id).await;
    seed_feature(&db, other.id).await;

    let features = Feature::find_by_project_id(&db.pool, project.id)
        .await
        .expect("query");
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].id, feature.id);

    let renamed = Feature::update(
        &db.pool,
        feature.id,
        &UpdateFeature {
            name: Some("Payments".to_string()),
            description: None,
        },
    )
    .await
    .expect("update");
    assert_eq!(renamed.name, "Payments");
}

#[tokio::test]
async fn test_case_update_keeps_unset_fields() {
    let db = db().await;
    let project = seed_project(&db).await;
    let feature = seed_feature(&db, project.id).await;

    let case = TestCase::create(&db.pool, &new_case(feature.id, "Coupon applies"), Uuid::new_v4())
        .await
        .expect("create");
    assert_eq!(case.priority, Priority::Medium);
    assert_eq!(case.status, TestCaseStatus::Ready);

    let updated = TestCase::update(
        &db.pool,
        case.id,
        &UpdateTestCase {
            title: None,
            description: Some("applies a percentage coupon".to_string()),
            steps: None,
            expected_result: None,
            priority: Some(Priority::High),
            status: None,
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.title, "Coupon applies");
    assert_eq!(updated.priority, Priority::High);
    assert_eq!(updated.status, TestCaseStatus::Ready);
}

#[tokio::test]
async fn page_query_orders_and_paginates() {
    let db = db().await;
    let project = seed_project(&db).await;
    let feature = seed_feature(&db, project.id).await;

    for i in 0..25 {
        TestCase::create(
            &db.pool,
            &new_case(feature.id, &format!("Case {i:02}")),
            Uuid::new_v4(),
        )
        .await
        .expect("create");
    }

    let mut query = TestCasePageQuery::first_page(TestType::Manual);
    let first = TestCase::find_page(&db.pool, &query).await.expect("page 0");
    assert_eq!(first.len() as i64, TestCasePageQuery::PAGE_SIZE);
    // Newest insert first.
    assert_eq!(first[0].title, "Case 24");
    assert_eq!(first[0].feature_name, "Checkout");

    query.page_index = 1;
    let second = TestCase::find_page(&db.pool, &query).await.expect("page 1");
    assert_eq!(second.len(), 5);
    assert_eq!(second[4].title, "Case 00");

    query.page_index = 2;
    let third = TestCase::find_page(&db.pool, &query).await.expect("page 2");
    assert!(third.is_empty());
}

#[tokio::test]
async fn page_query_applies_scalar_filters_and_search() {
    let db = db().await;
    let project = seed_project(&db).await;
    let feature = seed_feature(&db, project.id).await;
    let other_feature = Feature::create(
        &db.pool,
        &CreateFeature {
            project_id: project.id,
            name: "Search".to_string(),
            description: None,
        },
        Uuid::new_v4(),
    )
    .await
    .expect("create feature");

    TestCase::create(&db.pool, &new_case(feature.id, "Checkout totals"), Uuid::new_v4())
        .await
        .expect("create");
    let mut high = new_case(other_feature.id, "Search ranking");
    high.priority = Some(Priority::High);
    TestCase::create(&db.pool, &high, Uuid::new_v4())
        .await
        .expect("create");
    let mut automated = new_case(feature.id, "Checkout API");
    automated.test_type = Some(TestType::Automated);
    TestCase::create(&db.pool, &automated, Uuid::new_v4())
        .await
        .expect("create");

    let mut query = TestCasePageQuery::first_page(TestType::Manual);
    query.search = Some("checkout".to_string());
    let found = TestCase::find_page(&db.pool, &query).await.expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Checkout totals");

    let mut query = TestCasePageQuery::first_page(TestType::Manual);
    query.priority = Some(Priority::High);
    query.feature_id = Some(other_feature.id);
    let found = TestCase::find_page(&db.pool, &query).await.expect("filters");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Search ranking");
}

#[tokio::test]
async fn tag_memberships_are_restricted_to_both_sets() {
    let db = db().await;
    let project = seed_project(&db).await;
    let feature = seed_feature(&db, project.id).await;

    let a = TestCase::create(&db.pool, &new_case(feature.id, "a"), Uuid::new_v4())
        .await
        .expect("create");
    let b = TestCase::create(&db.pool, &new_case(feature.id, "b"), Uuid::new_v4())
        .await
        .expect("create");
    let tag = Tag::create(&db.pool, project.id, "regression", Uuid::new_v4())
        .await
        .expect("create tag");
    let other_tag = Tag::create(&db.pool, project.id, "smoke", Uuid::new_v4())
        .await
        .expect("create tag");

    TestCaseTag::assign(&db.pool, a.id, tag.id).await.expect("assign");
    TestCaseTag::assign(&db.pool, b.id, other_tag.id)
        .await
        .expect("assign");
    // Re-assign is a no-op, not an error.
    TestCaseTag::assign(&db.pool, a.id, tag.id).await.expect("assign");

    let rows = TestCaseTag::find_memberships(&db.pool, &[tag.id], &[a.id, b.id])
        .await
        .expect("lookup");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].test_case_id, a.id);

    // Candidate restriction: a's membership is invisible if a is not a
    // candidate.
    let rows = TestCaseTag::find_memberships(&db.pool, &[tag.id], &[b.id])
        .await
        .expect("lookup");
    assert!(rows.is_empty());

    let rows = TestCaseTag::find_memberships(&db.pool, &[], &[a.id, b.id])
        .await
        .expect("lookup");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn ensure_for_run_backfills_once_and_skips_deprecated() {
    let db = db().await;
    let project = seed_project(&db).await;
    let feature = seed_feature(&db, project.id).await;

    for i in 0..3 {
        TestCase::create(&db.pool, &new_case(feature.id, &format!("case {i}")), Uuid::new_v4())
            .await
            .expect("create");
    }
    let mut deprecated = new_case(feature.id, "legacy");
    deprecated.status = Some(TestCaseStatus::Deprecated);
    TestCase::create(&db.pool, &deprecated, Uuid::new_v4())
        .await
        .expect("create");

    let run = TestRun::create(
        &db.pool,
        &CreateTestRun {
            project_id: project.id,
            name: "Release 1.4".to_string(),
            description: None,
        },
        Uuid::new_v4(),
    )
    .await
    .expect("create run");

    assert_eq!(
        Execution::ensure_for_run(&db.pool, run.id).await.expect("backfill"),
        3
    );
    assert_eq!(
        Execution::ensure_for_run(&db.pool, run.id).await.expect("backfill"),
        0
    );

    let rows = Execution::find_by_test_run_id(&db.pool, run.id)
        .await
        .expect("query");
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|e| e.status == ExecutionStatus::Pending));
    assert!(rows.iter().all(|e| e.executed_at.is_none()));

    // Unknown run: nothing to do.
    assert_eq!(
        Execution::ensure_for_run(&db.pool, Uuid::new_v4())
            .await
            .expect("backfill"),
        0
    );
}

#[tokio::test]
async fn record_result_updates_the_latest_row_for_the_pair() {
    let db = db().await;
    let project = seed_project(&db).await;
    let feature = seed_feature(&db, project.id).await;
    let case = TestCase::create(&db.pool, &new_case(feature.id, "retry me"), Uuid::new_v4())
        .await
        .expect("create");
    let run = TestRun::create(
        &db.pool,
        &CreateTestRun {
            project_id: project.id,
            name: "Release 1.4".to_string(),
            description: None,
        },
        Uuid::new_v4(),
    )
    .await
    .expect("create run");

    Execution::ensure_for_run(&db.pool, run.id).await.expect("backfill");
    let recorded = Execution::record_result(
        &db.pool,
        run.id,
        case.id,
        ExecutionStatus::Failed,
        Some("flaky selector"),
    )
    .await
    .expect("record")
    .expect("row exists");
    assert_eq!(recorded.status, ExecutionStatus::Failed);
    assert!(recorded.executed_at.is_some());
    assert_eq!(recorded.notes.as_deref(), Some("flaky selector"));

    // A re-execution adds a second historical row for the pair.
    Execution::create(
        &db.pool,
        run.id,
        case.id,
        ExecutionStatus::Passed,
        None,
        Uuid::new_v4(),
    )
    .await
    .expect("re-execute");
    let rows = Execution::find_by_test_run_id(&db.pool, run.id)
        .await
        .expect("query");
    assert_eq!(rows.len(), 2);

    // record_result touches the newest row only.
    Execution::record_result(&db.pool, run.id, case.id, ExecutionStatus::Blocked, None)
        .await
        .expect("record")
        .expect("row exists");
    let rows = Execution::find_by_test_run_id(&db.pool, run.id)
        .await
        .expect("query");
    assert_eq!(rows[0].status, ExecutionStatus::Failed);
    assert_eq!(rows[1].status, ExecutionStatus::Blocked);

    // No row for an unknown pair.
    assert!(
        Execution::record_result(&db.pool, run.id, Uuid::new_v4(), ExecutionStatus::Passed, None)
            .await
            .expect("record")
            .is_none()
    );
}

#[tokio::test]
async fn run_status_transitions_and_listing() {
    let db = db().await;
    let project = seed_project(&db).await;

    let run = TestRun::create(
        &db.pool,
        &CreateTestRun {
            project_id: project.id,
            name: "Release 1.4".to_string(),
            description: Some("cart and checkout".to_string()),
        },
        Uuid::new_v4(),
    )
    .await
    .expect("create run");
    assert_eq!(run.status, TestRunStatus::Planned);

    TestRun::update_status(&db.pool, run.id, TestRunStatus::Active)
        .await
        .expect("update");
    let found = TestRun::find_by_id(&db.pool, run.id)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(found.status, TestRunStatus::Active);

    let runs = TestRun::find_by_project_id(&db.pool, project.id)
        .await
        .expect("query");
    assert_eq!(runs.len(), 1);
}

#[tokio::test]
async fn bug_lifecycle_and_case_link() {
    let db = db().await;
    let project = seed_project(&db).await;
    let feature = seed_feature(&db, project.id).await;
    let case = TestCase::create(&db.pool, &new_case(feature.id, "broken flow"), Uuid::new_v4())
        .await
        .expect("create");

    let bug = Bug::create(
        &db.pool,
        &CreateBug {
            project_id: project.id,
            title: "Total off by one cent".to_string(),
            description: None,
            severity: Some(Priority::Critical),
            test_case_id: Some(case.id),
            test_run_id: None,
        },
        Uuid::new_v4(),
    )
    .await
    .expect("create bug");
    assert_eq!(bug.status, BugStatus::Open);
    assert_eq!(bug.severity, Priority::Critical);

    Bug::update_status(&db.pool, bug.id, BugStatus::Resolved)
        .await
        .expect("update");
    let bugs = Bug::find_by_project_id(&db.pool, project.id)
        .await
        .expect("query");
    assert_eq!(bugs.len(), 1);
    assert_eq!(bugs[0].status, BugStatus::Resolved);

    // Deleting the linked case keeps the bug, clearing the link.
    TestCase::delete(&db.pool, case.id).await.expect("delete case");
    let found = Bug::find_by_id(&db.pool, bug.id)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(found.test_case_id, None);
}
