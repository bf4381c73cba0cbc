//! # taut
//!
//! Discovery and dispatch core for a fast, process-isolated test runner for
//! a dynamic scripting language. `taut` statically discovers test items from
//! source files without ever importing or executing them, schedules them
//! into parallel and sequential cohorts, and dispatches them across a pool
//! of long-lived worker subprocesses speaking a length-prefixed MessagePack
//! protocol.
//!
//! ## Architecture
//!
//! ```text
//!   roots ──▶ [`discovery`] ──▶ [`filter`] ──▶ [`scheduler`] ──▶ [`supervisor`] ──▶ [`aggregator`]
//!              (walk + parse)    (group/id)     (cohorts)         (worker pool)      (RunReport)
//! ```
//!
//! - [`collector`] does the actual per-file work: parsing Python source with
//!   `tree-sitter` and extracting `skip`/`mark`/`parallel` decorators
//!   without evaluating any code.
//! - [`discovery`] walks a set of roots, applying naming conventions and
//!   exclusion rules, and hands every file to the collector.
//! - [`filter`] narrows the discovered item set by group, marker
//!   truthiness, or id substring.
//! - [`scheduler`] partitions the filtered set into a [`model::DispatchPlan`]:
//!   a parallel batch plus an ordered sequential tail.
//! - [`supervisor`] spawns and supervises worker processes, dispatching the
//!   plan across them and turning crashes or timeouts into synthesized
//!   failures rather than propagating errors out of a run.
//! - [`aggregator`] merges every outcome — dispatched or skipped — into one
//!   [`aggregator::RunReport`].
//!
//! ## Quick start
//!
//! ```no_run
//! use taut::config::RunnerConfig;
//! use taut::filter::Filter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RunnerConfig::default();
//!     let report = taut::run(vec!["tests".into()], config, Filter::default()).await?;
//!     std::process::exit(if report.is_success() { 0 } else { 1 });
//! }
//! ```
//!
//! ## Configuration
//!
//! `taut` is configured via TOML files loaded with [`config::load_config`];
//! see the [`config`] module for the schema.

pub mod aggregator;
pub mod collector;
pub mod config;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod model;
pub mod protocol;
pub mod runner;
pub mod scheduler;
pub mod supervisor;

pub use aggregator::{Aggregator, Outcome, RunReport, TestResult};
pub use config::{RunnerConfig, load_config};
pub use filter::Filter;
pub use model::{Cohort, DispatchPlan, MarkerSet, MarkerValue, TestItem};
pub use runner::run;
pub use scheduler::Scheduler;
pub use supervisor::{ItemOutcome, Supervisor};
