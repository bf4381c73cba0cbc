//! Worker supervisor (spec §4.E): spawns worker processes, dispatches the
//! [`DispatchPlan`](crate::model::DispatchPlan) across them, and turns
//! process death or protocol errors into synthesized failure responses
//! rather than propagating them to the caller.
//!
//! Grounded in the teacher's `provider/process.rs` (spawning a child with
//! piped stdio via `tokio::process::Command`) and `orchestrator.rs` (fanning
//! a work queue out across a bounded pool of long-lived workers). Unlike the
//! teacher's `tokio_scoped::scope` + OS-thread-per-sandbox model, dispatch
//! here is single-threaded and cooperative: one `tokio::select!`-driven task
//! per worker, all polled on the current executor.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::config::{IsolationMode, RunnerConfig};
use crate::error::SupervisorError;
use crate::model::{Cohort, DispatchPlan, TestItem};
use crate::protocol::{self, Request, Response};

/// The outcome of dispatching one item, paired with the item it ran.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub item: TestItem,
    pub response: Response,
}

/// A live worker process and its framed stdio pipes.
struct Worker {
    id: usize,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Worker {
    async fn spawn(id: usize, config: &RunnerConfig) -> Result<Self, SupervisorError> {
        let mut child = Command::new(&config.worker_command)
            .args(&config.worker_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(SupervisorError::Spawn)?;

        let stdin = child.stdin.take().ok_or_else(|| SupervisorError::Internal("worker stdin not piped".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| SupervisorError::Internal("worker stdout not piped".into()))?;

        Ok(Self {
            id,
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Sends `request` and awaits the matching response, bounded by
    /// `timeout`. Any failure along the way — write error, read error, a
    /// response for the wrong id, or the timeout itself — is reported as a
    /// [`SupervisorError`] and the worker must be considered dead.
    async fn call(&mut self, request: Request, timeout: Duration) -> Result<Response, SupervisorError> {
        let request_id = request.id();
        let outcome = tokio::time::timeout(timeout, self.round_trip(request)).await;

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(SupervisorError::Timeout(self.id, timeout, request_id)),
        }
    }

    async fn round_trip(&mut self, request: Request) -> Result<Response, SupervisorError> {
        let request_id = request.id();
        protocol::write_frame(&mut self.stdin, &request)
            .await
            .map_err(|err| SupervisorError::Protocol(self.id, err))?;

        let response: Response = protocol::read_frame(&mut self.stdout)
            .await
            .map_err(|err| SupervisorError::Protocol(self.id, err))?;

        if response.id != request_id {
            return Err(SupervisorError::Internal(format!(
                "worker {} replied to request {} with response for {}",
                self.id, request_id, response.id
            )));
        }
        Ok(response)
    }

    async fn shutdown(mut self, request_id: u64, grace: Duration) {
        let _ = self.call(Request::Shutdown { id: request_id }, grace).await;
        let _ = tokio::time::timeout(grace, self.child.wait()).await;
        let _ = self.child.kill().await;
    }
}

/// Dispatches a [`DispatchPlan`] across a pool of workers and collects one
/// [`ItemOutcome`] per dispatchable item.
pub struct Supervisor {
    config: RunnerConfig,
    next_request_id: u64,
    next_worker_id: usize,
}

impl Supervisor {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            next_request_id: 0,
            next_worker_id: 0,
        }
    }

    fn take_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn take_worker_id(&mut self) -> usize {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        id
    }

    /// Runs every cohort in `plan` to completion, in order: the parallel
    /// cohort first (spec resolution, see [`crate::scheduler`]), then the
    /// sequential items, one at a time, in discovery order.
    ///
    /// # Arguments
    ///
    /// * `plan` - the cohorts to dispatch, as built by
    ///   [`crate::scheduler::Scheduler::plan`]. Items the scheduler marked
    ///   `skip` are not part of the plan and never reach the supervisor.
    ///
    /// # Returns
    ///
    /// One [`ItemOutcome`] per dispatchable item in `plan`, covering both
    /// cohorts. A worker crash or timeout never surfaces as an `Err` here —
    /// it is folded into that item's `Response` as a synthesized failure
    /// (spec §4.E); `Err` is reserved for conditions that make the whole
    /// run unable to proceed, such as a failure to spawn any worker at all.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use taut::config::RunnerConfig;
    /// use taut::model::{Cohort, DispatchPlan, MarkerSet, TestItem};
    /// use taut::supervisor::Supervisor;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let item = TestItem::new("tests/test_foo.py".into(), None, "test_bar".into(), MarkerSet::new());
    ///     let plan = DispatchPlan { cohorts: vec![Cohort::Sequential(item)], skipped: Vec::new() };
    ///
    ///     let mut supervisor = Supervisor::new(RunnerConfig::default());
    ///     let outcomes = supervisor.run(plan).await?;
    ///     assert_eq!(outcomes.len(), 1);
    ///     Ok(())
    /// }
    /// ```
    pub async fn run(&mut self, plan: DispatchPlan) -> Result<Vec<ItemOutcome>, SupervisorError> {
        let mut outcomes = Vec::with_capacity(plan.dispatchable_count());
        let mut sequential_batch = Vec::new();

        for cohort in plan.cohorts {
            match cohort {
                Cohort::Parallel(items) => {
                    if !sequential_batch.is_empty() {
                        outcomes.extend(self.run_sequential(std::mem::take(&mut sequential_batch)).await?);
                    }
                    outcomes.extend(self.run_parallel(items).await?);
                }
                Cohort::Sequential(item) => {
                    sequential_batch.push(item);
                }
            }
        }

        if !sequential_batch.is_empty() {
            outcomes.extend(self.run_sequential(sequential_batch).await?);
        }

        Ok(outcomes)
    }

    /// Runs the sequential cohort, one item at a time, in order.
    ///
    /// Honors `config.isolation_mode` for the whole cohort rather than
    /// spawning per item regardless of mode: under `ProcessPerRun` a single
    /// worker is spawned once and reused across every item (spec §4.E:
    /// "workers are reused until discovery is exhausted or they crash"),
    /// only being replaced if it crashes or times out mid-item; under
    /// `ProcessPerTest` a fresh worker is spawned and torn down for every
    /// item, matching the parallel cohort's `drain_queue` behavior.
    async fn run_sequential(&mut self, items: Vec<TestItem>) -> Result<Vec<ItemOutcome>, SupervisorError> {
        let worker_id = self.take_worker_id();
        let isolation = self.config.isolation_mode;
        let timeout = Duration::from_secs_f64(self.config.timeout_secs);
        let collect_coverage = self.config.collect_coverage;

        let mut worker = if isolation == IsolationMode::ProcessPerRun {
            Some(Worker::spawn(worker_id, &self.config).await?)
        } else {
            None
        };

        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            if isolation == IsolationMode::ProcessPerTest {
                worker = Some(Worker::spawn(worker_id, &self.config).await?);
            }

            let request_id = self.take_request_id();
            let request = run_request(request_id, &item, collect_coverage);

            let response = match worker.as_mut().unwrap().call(request, timeout).await {
                Ok(response) => response,
                Err(err) => {
                    let failure = synthesize_failure(request_id, &err);
                    if let Some(dead) = worker.take() {
                        let shutdown_id = self.take_request_id();
                        dead.shutdown(shutdown_id, Duration::from_millis(0)).await;
                    }
                    worker = Some(Worker::spawn(worker_id, &self.config).await?);
                    failure
                }
            };

            outcomes.push(ItemOutcome { item, response });

            if isolation == IsolationMode::ProcessPerTest {
                if let Some(used) = worker.take() {
                    let shutdown_id = self.take_request_id();
                    used.shutdown(shutdown_id, Duration::from_secs(5)).await;
                }
            }
        }

        if let Some(worker) = worker {
            let shutdown_id = self.take_request_id();
            worker.shutdown(shutdown_id, Duration::from_secs(5)).await;
        }

        Ok(outcomes)
    }

    /// Runs a batch of parallel-safe items across a bounded pool of
    /// concurrent workers, respecting `config.worker_count` and
    /// `config.isolation_mode`.
    async fn run_parallel(&mut self, items: Vec<TestItem>) -> Result<Vec<ItemOutcome>, SupervisorError> {
        let worker_count = self.config.worker_count.min(items.len().max(1));
        let queue = Arc::new(Mutex::new(VecDeque::from(items)));
        let outcomes = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let worker_id = self.take_worker_id();
            let queue = Arc::clone(&queue);
            let outcomes = Arc::clone(&outcomes);
            let config = self.config.clone();
            let isolation = config.isolation_mode;
            let timeout = Duration::from_secs_f64(config.timeout_secs);
            let collect_coverage = config.collect_coverage;

            tasks.push(tokio::spawn(async move {
                drain_queue(worker_id, &config, isolation, timeout, collect_coverage, queue, outcomes).await
            }));
        }

        for task in tasks {
            task.await.map_err(|err| SupervisorError::Internal(err.to_string()))??;
        }

        Ok(Arc::try_unwrap(outcomes)
            .map_err(|_| SupervisorError::Internal("worker task held outcomes past join".into()))?
            .into_inner())
    }
}

/// One worker's pull loop: takes items off the shared queue until it is
/// empty, either reusing a single long-lived worker (`process-per-run`) or
/// spawning fresh per item (`process-per-test`), replacing the worker
/// whenever a crash or protocol error makes it unusable.
async fn drain_queue(
    worker_id: usize,
    config: &RunnerConfig,
    isolation: IsolationMode,
    timeout: Duration,
    collect_coverage: bool,
    queue: Arc<Mutex<VecDeque<TestItem>>>,
    outcomes: Arc<Mutex<Vec<ItemOutcome>>>,
) -> Result<(), SupervisorError> {
    let mut worker = if isolation == IsolationMode::ProcessPerRun {
        Some(Worker::spawn(worker_id, config).await?)
    } else {
        None
    };
    let mut request_id = worker_id as u64 * 1_000_000;

    loop {
        let item = {
            let mut queue = queue.lock().await;
            queue.pop_front()
        };
        let Some(item) = item else { break };

        if isolation == IsolationMode::ProcessPerTest {
            worker = Some(Worker::spawn(worker_id, config).await?);
        }

        let this_request_id = request_id;
        request_id += 1;
        let request = run_request(this_request_id, &item, collect_coverage);

        let response = match worker.as_mut().unwrap().call(request, timeout).await {
            Ok(response) => response,
            Err(err) => {
                let failure = synthesize_failure(this_request_id, &err);
                // The worker is no longer trustworthy after any failure;
                // replace it so the next item gets a clean process.
                if let Some(dead) = worker.take() {
                    dead.shutdown(this_request_id, Duration::from_millis(0)).await;
                }
                worker = Some(Worker::spawn(worker_id, config).await?);
                failure
            }
        };

        outcomes.lock().await.push(ItemOutcome { item, response });

        if isolation == IsolationMode::ProcessPerTest {
            if let Some(used) = worker.take() {
                let shutdown_id = this_request_id + 1;
                used.shutdown(shutdown_id, Duration::from_secs(5)).await;
            }
        }
    }

    if let Some(worker) = worker {
        worker.shutdown(request_id, Duration::from_secs(5)).await;
    }

    Ok(())
}

fn run_request(id: u64, item: &TestItem, collect_coverage: bool) -> Request {
    Request::Run {
        id,
        file: item.file.display().to_string(),
        class: item.class.clone(),
        function: item.function.clone(),
        collect_coverage,
    }
}

fn synthesize_failure(id: u64, err: &SupervisorError) -> Response {
    Response::failure(id, err.to_string(), String::new())
}
