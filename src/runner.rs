//! The public entry point (spec §6): `run` wires discovery, filtering,
//! scheduling, dispatch, and aggregation into the one call an embedder
//! needs.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::aggregator::{Aggregator, RunReport};
use crate::config::RunnerConfig;
use crate::discovery;
use crate::filter::Filter;
use crate::scheduler::Scheduler;
use crate::supervisor::Supervisor;

/// Discovers, filters, schedules, and runs every test under `roots`,
/// returning a fully accounted-for [`RunReport`].
///
/// This is the only public surface spec §6 names: "A single library
/// entrypoint that a host process calls with a set of roots, a
/// configuration, and a filter, and that returns a structured report."
pub async fn run(roots: Vec<PathBuf>, config: RunnerConfig, filter: Filter) -> anyhow::Result<RunReport> {
    config.validate()?;
    let started = Instant::now();

    info!(roots = ?roots, "starting discovery");
    let item_set = discovery::discover(&roots, &config.excluded_dirs)?;
    for warning in &item_set.warnings {
        warn!(file = %warning.file.display(), message = %warning.message, "discovery warning");
    }
    debug!(discovered = item_set.items.len(), "discovery complete");

    let filtered = filter.apply(item_set.items);
    info!(selected = filtered.len(), "filter applied");

    let plan = Scheduler::plan(filtered);
    info!(
        dispatchable = plan.dispatchable_count(),
        skipped = plan.skipped.len(),
        "scheduling complete"
    );

    let mut supervisor = Supervisor::new(config);
    let dispatched = supervisor.run(plan.clone()).await?;

    let report = Aggregator::build(dispatched, plan.skipped, item_set.warnings, started.elapsed());
    info!(
        passed = report.passed_count(),
        failed = report.failed_count(),
        skipped = report.skipped_count(),
        "run complete"
    );

    Ok(report)
}
