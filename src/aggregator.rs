//! Result aggregation (spec §4.G): merges every dispatched item's outcome,
//! plus the items the scheduler skipped, into one [`RunReport`].
//!
//! Grounded in the teacher's `orchestrator.rs` `RunResult`, which likewise
//! collects per-sandbox results into pass/fail counts and a combined
//! duration; coverage merging (union of executed lines per file) has no
//! direct teacher analogue and is built fresh per spec §4.G's description
//! of a "file -> sorted line numbers" merge.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::model::{DiscoveryWarning, TestItem};
use crate::protocol::Response;
use crate::supervisor::ItemOutcome;

/// The final, fully accounted-for result of one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<TestResult>,
    pub warnings: Vec<DiscoveryWarning>,
    pub wall_time: Duration,
    /// The union of every executed line, per file, across every item that
    /// reported coverage (spec §4.G). Empty when coverage collection was
    /// off for the run.
    pub coverage: BTreeMap<String, Vec<u32>>,
}

/// One item's place in the final report.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub item: TestItem,
    pub outcome: Outcome,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub coverage: Option<BTreeMap<String, Vec<u32>>>,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Passed,
    Failed { message: String, traceback: String },
    Skipped { reason: String },
}

impl RunReport {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| matches!(r.outcome, Outcome::Passed)).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| matches!(r.outcome, Outcome::Failed { .. })).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|r| matches!(r.outcome, Outcome::Skipped { .. })).count()
    }

    /// Merges a set of per-item coverage maps into one union, per file.
    ///
    /// # Arguments
    ///
    /// * `per_item` - one entry per dispatched item; `None` for items that
    ///   ran without coverage collection enabled.
    ///
    /// # Returns
    ///
    /// A map from file path to the sorted, deduplicated union of every line
    /// number any item executed in that file. Spec §4.G: "coverage is
    /// merged as a union, never overwritten, across every item that ran."
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use taut::RunReport;
    ///
    /// let per_item = vec![
    ///     Some(BTreeMap::from([("a.py".to_string(), vec![1, 2])])),
    ///     Some(BTreeMap::from([("a.py".to_string(), vec![2, 3])])),
    /// ];
    /// let merged = RunReport::merged_coverage(&per_item);
    /// assert_eq!(merged["a.py"], vec![1, 2, 3]);
    /// ```
    pub fn merged_coverage(per_item: &[Option<BTreeMap<String, Vec<u32>>>]) -> BTreeMap<String, Vec<u32>> {
        let mut merged: BTreeMap<String, std::collections::BTreeSet<u32>> = BTreeMap::new();
        for coverage in per_item.iter().flatten() {
            for (file, lines) in coverage {
                merged.entry(file.clone()).or_default().extend(lines.iter().copied());
            }
        }
        merged.into_iter().map(|(file, lines)| (file, lines.into_iter().collect())).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Builds the final report from dispatched outcomes, skipped items, and
/// discovery warnings, accounting for every item exactly once.
pub struct Aggregator;

impl Aggregator {
    pub fn build(
        dispatched: Vec<ItemOutcome>,
        skipped: Vec<TestItem>,
        warnings: Vec<DiscoveryWarning>,
        wall_time: Duration,
    ) -> RunReport {
        let mut results = Vec::with_capacity(dispatched.len() + skipped.len());

        for ItemOutcome { item, response } in dispatched {
            results.push(result_from_response(item, response));
        }

        for item in skipped {
            let reason = item.markers.skip_reason.clone();
            results.push(TestResult {
                item,
                outcome: Outcome::Skipped { reason },
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::ZERO,
                coverage: None,
            });
        }

        let per_item_coverage: Vec<_> = results.iter().map(|r| r.coverage.clone()).collect();
        let coverage = RunReport::merged_coverage(&per_item_coverage);

        RunReport { results, warnings, wall_time, coverage }
    }
}

fn result_from_response(item: TestItem, response: Response) -> TestResult {
    let outcome = if response.passed {
        Outcome::Passed
    } else {
        let (message, traceback) = response
            .error
            .map(|e| (e.message, e.traceback))
            .unwrap_or_else(|| ("test failed with no error detail".to_string(), String::new()));
        Outcome::Failed { message, traceback }
    };

    TestResult {
        item,
        outcome,
        stdout: response.stdout,
        stderr: response.stderr,
        duration: Duration::from_secs_f64(response.duration_sec.max(0.0)),
        coverage: response.coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarkerSet;
    use std::path::PathBuf;

    fn item(function: &str) -> TestItem {
        TestItem::new(PathBuf::from("t.py"), None, function.to_string(), MarkerSet::new())
    }

    #[test]
    fn every_item_is_accounted_for_exactly_once() {
        let dispatched = vec![
            ItemOutcome { item: item("test_pass"), response: Response::failure(0, "ignored".into(), String::new()) },
        ];
        let mut passed = dispatched;
        passed[0].response.passed = true;
        passed[0].response.error = None;

        let skipped = vec![item("test_skipped")];
        let report = Aggregator::build(passed, skipped, Vec::new(), Duration::from_secs(1));

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert!(report.is_success());
    }

    #[test]
    fn failed_response_without_error_detail_still_reports_failed() {
        let outcome = ItemOutcome { item: item("test_x"), response: Response::failure(0, "boom".into(), "trace".into()) };
        let report = Aggregator::build(vec![outcome], Vec::new(), Vec::new(), Duration::ZERO);
        assert_eq!(report.failed_count(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn merged_coverage_is_a_union_not_an_overwrite() {
        let per_item = vec![
            Some(BTreeMap::from([("a.py".to_string(), vec![1, 2])])),
            Some(BTreeMap::from([("a.py".to_string(), vec![2, 3])])),
        ];
        let merged = RunReport::merged_coverage(&per_item);
        assert_eq!(merged["a.py"], vec![1, 2, 3]);
    }

    #[test]
    fn build_populates_the_report_level_coverage_union() {
        let mut response_a = Response::failure(0, String::new(), String::new());
        response_a.passed = true;
        response_a.error = None;
        response_a.coverage = Some(BTreeMap::from([("a.py".to_string(), vec![1, 2])]));

        let mut response_b = Response::failure(1, String::new(), String::new());
        response_b.passed = true;
        response_b.error = None;
        response_b.coverage = Some(BTreeMap::from([("a.py".to_string(), vec![2, 3])]));

        let dispatched = vec![
            ItemOutcome { item: item("test_a"), response: response_a },
            ItemOutcome { item: item("test_b"), response: response_b },
        ];
        let report = Aggregator::build(dispatched, Vec::new(), Vec::new(), Duration::ZERO);

        assert_eq!(report.coverage["a.py"], vec![1, 2, 3]);
        assert!(report.results.iter().all(|r| r.coverage.is_some()));
    }
}
