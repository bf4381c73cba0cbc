//! End-to-end tests driving the real `fixture-worker` binary through the
//! supervisor, exercising the scenarios spec §8 calls out explicitly:
//! crash recovery, FIFO response ordering, and process-per-test isolation.

use std::path::PathBuf;
use std::time::Duration;

use taut::config::{IsolationMode, RunnerConfig};
use taut::model::{Cohort, DispatchPlan, MarkerSet, TestItem};
use taut::supervisor::Supervisor;

fn fixture_worker_config(isolation_mode: IsolationMode, worker_count: usize) -> RunnerConfig {
    RunnerConfig {
        worker_count,
        isolation_mode,
        collect_coverage: true,
        timeout_secs: 2.0,
        worker_command: PathBuf::from(env!("CARGO_BIN_EXE_fixture-worker")),
        worker_args: Vec::new(),
        ..RunnerConfig::default()
    }
}

fn item(function: &str) -> TestItem {
    TestItem::new(PathBuf::from("tests/test_fixture.py"), None, function.to_string(), MarkerSet::new())
}

#[tokio::test]
async fn a_passing_sequential_item_reports_passed() {
    let config = fixture_worker_config(IsolationMode::ProcessPerRun, 1);
    let plan = DispatchPlan {
        cohorts: vec![Cohort::Sequential(item("test_ok"))],
        skipped: Vec::new(),
    };

    let mut supervisor = Supervisor::new(config);
    let outcomes = supervisor.run(plan).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].response.passed);
}

#[tokio::test]
async fn a_failing_item_carries_an_error_message() {
    let config = fixture_worker_config(IsolationMode::ProcessPerRun, 1);
    let plan = DispatchPlan {
        cohorts: vec![Cohort::Sequential(item("test_fail_assertion"))],
        skipped: Vec::new(),
    };

    let mut supervisor = Supervisor::new(config);
    let outcomes = supervisor.run(plan).await.unwrap();

    assert!(!outcomes[0].response.passed);
    assert!(outcomes[0].response.error.as_ref().unwrap().message.contains("test_fail_assertion"));
}

#[tokio::test]
async fn a_crashing_worker_yields_a_synthesized_failure_not_an_error() {
    let config = fixture_worker_config(IsolationMode::ProcessPerRun, 1);
    let plan = DispatchPlan {
        cohorts: vec![Cohort::Sequential(item("test_crash_mid_run"))],
        skipped: Vec::new(),
    };

    let mut supervisor = Supervisor::new(config);
    let outcomes = supervisor.run(plan).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].response.passed);
    assert!(outcomes[0].response.error.is_some());
}

#[tokio::test]
async fn a_hanging_worker_is_killed_on_timeout_and_reported_as_failed() {
    let config = fixture_worker_config(IsolationMode::ProcessPerRun, 1);
    let plan = DispatchPlan {
        cohorts: vec![Cohort::Sequential(item("test_hang_forever"))],
        skipped: Vec::new(),
    };

    let mut supervisor = Supervisor::new(config);
    let outcomes = tokio::time::timeout(Duration::from_secs(10), supervisor.run(plan))
        .await
        .expect("supervisor.run must not itself hang")
        .unwrap();

    assert!(!outcomes[0].response.passed);
}

#[tokio::test]
async fn process_per_run_sequential_cohort_reuses_one_worker() {
    let config = fixture_worker_config(IsolationMode::ProcessPerRun, 1);
    let plan = DispatchPlan {
        cohorts: vec![
            Cohort::Sequential(item("test_count_a")),
            Cohort::Sequential(item("test_count_b")),
            Cohort::Sequential(item("test_count_c")),
        ],
        skipped: Vec::new(),
    };

    let mut supervisor = Supervisor::new(config);
    let outcomes = supervisor.run(plan).await.unwrap();

    assert_eq!(outcomes.len(), 3);
    let counts: Vec<&str> = outcomes.iter().map(|o| o.response.stdout.as_str()).collect();
    assert_eq!(counts, vec!["1", "2", "3"], "a single reused worker must see its own request count climb");
}

#[tokio::test]
async fn process_per_test_sequential_cohort_spawns_a_fresh_worker_per_item() {
    let config = fixture_worker_config(IsolationMode::ProcessPerTest, 1);
    let plan = DispatchPlan {
        cohorts: vec![
            Cohort::Sequential(item("test_count_a")),
            Cohort::Sequential(item("test_count_b")),
        ],
        skipped: Vec::new(),
    };

    let mut supervisor = Supervisor::new(config);
    let outcomes = supervisor.run(plan).await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(
        outcomes.iter().all(|o| o.response.stdout == "1"),
        "a fresh worker per item must always report its own first request"
    );
}

#[tokio::test]
async fn parallel_cohort_runs_every_item_exactly_once() {
    let config = fixture_worker_config(IsolationMode::ProcessPerRun, 3);
    let items = (0..6).map(|i| item(&format!("test_ok_{i}"))).collect();
    let plan = DispatchPlan {
        cohorts: vec![Cohort::Parallel(items)],
        skipped: Vec::new(),
    };

    let mut supervisor = Supervisor::new(config);
    let outcomes = supervisor.run(plan).await.unwrap();

    assert_eq!(outcomes.len(), 6);
    assert!(outcomes.iter().all(|o| o.response.passed));
    let mut functions: Vec<_> = outcomes.iter().map(|o| o.item.function.clone()).collect();
    functions.sort();
    functions.dedup();
    assert_eq!(functions.len(), 6, "every item must be accounted for exactly once");
}

#[tokio::test]
async fn process_per_test_isolation_spawns_a_fresh_worker_for_every_item() {
    let config = fixture_worker_config(IsolationMode::ProcessPerTest, 2);
    let items = (0..4).map(|i| item(&format!("test_ok_{i}"))).collect();
    let plan = DispatchPlan {
        cohorts: vec![Cohort::Parallel(items)],
        skipped: Vec::new(),
    };

    let mut supervisor = Supervisor::new(config);
    let outcomes = supervisor.run(plan).await.unwrap();

    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| o.response.passed));
    assert!(outcomes.iter().all(|o| o.response.coverage.is_some()));
}
