//! Core data model: discovered test items, their marker metadata, and the
//! dispatch plan the scheduler builds from them.
//!
//! # Identity
//!
//! A [`TestItem`] is identified by the tuple `(file, class, function)`. Two
//! items with the same tuple are the same item; the discovery walker
//! deduplicates on this identity before producing the final item set.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// A value attached to a user marker via `@mark(key=value)`.
///
/// Only the three shapes the original decorator surface accepts are
/// representable; an unsupported literal shape in the source is a discovery
/// warning, never a `MarkerValue`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MarkerValue {
    Bool(bool),
    String(String),
    List(Vec<String>),
}

impl MarkerValue {
    /// Truthiness used by group/marker filtering (spec §6: "by `slow`
    /// truthiness"). Strings and lists are truthy when non-empty; booleans
    /// are truthy when `true`.
    pub fn is_truthy(&self) -> bool {
        match self {
            MarkerValue::Bool(b) => *b,
            MarkerValue::String(s) => !s.is_empty(),
            MarkerValue::List(items) => !items.is_empty(),
        }
    }

    /// Returns the group names this value names, if it names any.
    ///
    /// A `group` marker may be a single string or a list of strings; this
    /// normalizes both into a list for filtering.
    pub fn as_group_names(&self) -> Vec<&str> {
        match self {
            MarkerValue::String(s) => vec![s.as_str()],
            MarkerValue::List(items) => items.iter().map(String::as_str).collect(),
            MarkerValue::Bool(_) => Vec::new(),
        }
    }
}

/// The resolved marker metadata for one test item.
///
/// Built by merging class-level markers with method-level markers (method
/// wins on key conflicts), per spec §3: "Method-level markers override by
/// key (last write wins, with the method winning over the class)."
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerSet {
    pub skip: bool,
    pub skip_reason: String,
    pub parallel: bool,
    values: BTreeMap<String, MarkerValue>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `other` on top of `self`, with `other`'s flags and keys
    /// winning. Used to apply a class's markers first, then let the
    /// method's own decorators override them.
    pub fn merge_override(&mut self, other: &MarkerSet) {
        if other.skip {
            self.skip = true;
            self.skip_reason = other.skip_reason.clone();
        }
        if other.parallel {
            self.parallel = true;
        }
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: MarkerValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&MarkerValue> {
        self.values.get(key)
    }

    /// Convenience accessor for the conventional `group` marker, which may
    /// be a single string or a list of strings.
    pub fn groups(&self) -> Vec<&str> {
        self.values
            .get("group")
            .map(MarkerValue::as_group_names)
            .unwrap_or_default()
    }
}

/// A single discovered test, uniquely identified by `(file, class?, function)`.
///
/// Items are immutable once produced by the collector/walker; the scheduler
/// and supervisor only ever read from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestItem {
    pub file: PathBuf,
    pub class: Option<String>,
    pub function: String,
    pub markers: MarkerSet,
}

impl TestItem {
    pub fn new(file: PathBuf, class: Option<String>, function: String, markers: MarkerSet) -> Self {
        Self {
            file,
            class,
            function,
            markers,
        }
    }

    /// The identity tuple used for deduplication and ordering.
    pub fn identity(&self) -> (&std::path::Path, &str, &str) {
        (&self.file, self.class.as_deref().unwrap_or(""), &self.function)
    }

    /// A human-readable id, e.g. `tests/test_foo.py::TestBar::test_baz`.
    pub fn display_id(&self) -> String {
        match &self.class {
            Some(class) => format!("{}::{}::{}", self.file.display(), class, self.function),
            None => format!("{}::{}", self.file.display(), self.function),
        }
    }
}

/// A non-fatal problem encountered during discovery (spec §4.A/§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryWarning {
    pub file: PathBuf,
    pub message: String,
}

/// One batch of work in a [`DispatchPlan`].
#[derive(Debug, Clone)]
pub enum Cohort {
    /// A single item that must run in isolation, one at a time.
    Sequential(TestItem),
    /// Items safe to dispatch concurrently across any idle worker.
    Parallel(Vec<TestItem>),
}

/// An ordered sequence of cohorts produced by the scheduler, plus the items
/// that were flagged `skip` and never enter a cohort.
#[derive(Debug, Clone, Default)]
pub struct DispatchPlan {
    pub cohorts: Vec<Cohort>,
    pub skipped: Vec<TestItem>,
}

impl DispatchPlan {
    /// Total number of items that will actually be sent to a worker
    /// (i.e. excluding skipped items).
    pub fn dispatchable_count(&self) -> usize {
        self.cohorts
            .iter()
            .map(|c| match c {
                Cohort::Sequential(_) => 1,
                Cohort::Parallel(items) => items.len(),
            })
            .sum()
    }
}
