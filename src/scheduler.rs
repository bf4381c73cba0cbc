//! Scheduler (spec §4.C): partitions a discovered item set into skip
//! reports, a single parallel batch, and an ordered sequential cohort, then
//! assembles the [`DispatchPlan`] the supervisor consumes.
//!
//! # Execution discipline
//!
//! Spec §4.C.4 leaves the choice between "parallel first, then sequential"
//! and the inverse open, as long as it is stable given identical input.
//! This scheduler always runs the parallel batch first: parallel-safe tests
//! are usually the bulk of a suite and this keeps worker utilization high
//! for as long as possible before falling back to the single-worker
//! sequential tail.
//!
//! # Example
//!
//! ```
//! use taut::{Cohort, MarkerSet, Scheduler, TestItem};
//!
//! let mut parallel_marker = MarkerSet::new();
//! parallel_marker.parallel = true;
//!
//! let items = vec![
//!     TestItem::new("t.py".into(), None, "test_seq".into(), MarkerSet::new()),
//!     TestItem::new("t.py".into(), None, "test_par".into(), parallel_marker),
//! ];
//!
//! let plan = Scheduler::plan(items);
//! assert_eq!(plan.cohorts.len(), 2); // one parallel batch, one sequential item
//! ```

use crate::model::{Cohort, DispatchPlan, TestItem};

/// Builds a [`DispatchPlan`] from an item set.
pub struct Scheduler;

impl Scheduler {
    /// Partitions `items` into skip reports, a parallel cohort, and an
    /// ordered sequential cohort, then assembles the final plan.
    ///
    /// # Arguments
    ///
    /// * `items` - the filtered item set to schedule, in discovery order.
    ///
    /// # Returns
    ///
    /// A [`DispatchPlan`] whose parallel cohort (if non-empty) always comes
    /// first, followed by the sequential items in their original order
    /// (spec: "its items must run one at a time, in discovery order"); the
    /// parallel cohort itself is an unordered batch. Items marked `skip`
    /// never enter a cohort at all.
    ///
    /// # Example
    ///
    /// ```
    /// use taut::{MarkerSet, Scheduler, TestItem};
    ///
    /// let mut skip_marker = MarkerSet::new();
    /// skip_marker.skip = true;
    ///
    /// let items = vec![TestItem::new("t.py".into(), None, "test_a".into(), skip_marker)];
    /// let plan = Scheduler::plan(items);
    /// assert_eq!(plan.skipped.len(), 1);
    /// assert_eq!(plan.dispatchable_count(), 0);
    /// ```
    pub fn plan(items: Vec<TestItem>) -> DispatchPlan {
        let mut skipped = Vec::new();
        let mut parallel = Vec::new();
        let mut sequential = Vec::new();

        for item in items {
            if item.markers.skip {
                skipped.push(item);
            } else if item.markers.parallel {
                parallel.push(item);
            } else {
                sequential.push(item);
            }
        }

        let mut cohorts = Vec::new();
        if !parallel.is_empty() {
            cohorts.push(Cohort::Parallel(parallel));
        }
        for item in sequential {
            cohorts.push(Cohort::Sequential(item));
        }

        DispatchPlan { cohorts, skipped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarkerSet;
    use std::path::PathBuf;

    fn item(function: &str, markers: MarkerSet) -> TestItem {
        TestItem::new(PathBuf::from("t.py"), None, function.to_string(), markers)
    }

    fn marked(skip: bool, parallel: bool) -> MarkerSet {
        let mut m = MarkerSet::new();
        m.skip = skip;
        m.parallel = parallel;
        m
    }

    #[test]
    fn skipped_items_never_enter_a_cohort() {
        let items = vec![
            item("test_a", marked(true, false)),
            item("test_b", marked(false, false)),
        ];
        let plan = Scheduler::plan(items);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].function, "test_a");
        assert_eq!(plan.dispatchable_count(), 1);
    }

    #[test]
    fn parallel_cohort_comes_first_and_is_one_batch() {
        let items = vec![
            item("test_seq1", marked(false, false)),
            item("test_par1", marked(false, true)),
            item("test_seq2", marked(false, false)),
            item("test_par2", marked(false, true)),
        ];
        let plan = Scheduler::plan(items);
        assert_eq!(plan.cohorts.len(), 3);
        match &plan.cohorts[0] {
            Cohort::Parallel(batch) => assert_eq!(batch.len(), 2),
            _ => panic!("expected a parallel cohort first"),
        }
        match &plan.cohorts[1] {
            Cohort::Sequential(item) => assert_eq!(item.function, "test_seq1"),
            _ => panic!("expected sequential cohort in discovery order"),
        }
        match &plan.cohorts[2] {
            Cohort::Sequential(item) => assert_eq!(item.function, "test_seq2"),
            _ => panic!("expected sequential cohort in discovery order"),
        }
    }

    #[test]
    fn empty_input_yields_empty_plan() {
        let plan = Scheduler::plan(Vec::new());
        assert!(plan.cohorts.is_empty());
        assert!(plan.skipped.is_empty());
    }
}
