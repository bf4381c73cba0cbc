//! Post-discovery filtering (spec §6): "Filtering operates on marker sets
//! (e.g. include/exclude by group, by `slow` truthiness) and on item
//! identity substrings. Filters are applied after discovery, before
//! scheduling."
//!
//! # Example
//!
//! ```
//! use taut::{Filter, MarkerSet, MarkerValue, TestItem};
//!
//! let mut markers = MarkerSet::new();
//! markers.set("group", MarkerValue::String("auth".to_string()));
//! let items = vec![TestItem::new("t.py".into(), None, "test_login".into(), markers)];
//!
//! let filter = Filter { include_groups: vec!["auth".to_string()], ..Default::default() };
//! assert_eq!(filter.apply(items).len(), 1);
//! ```

use crate::model::TestItem;

/// A filter applied to the item set produced by [`crate::discovery::discover`]
/// before it reaches the scheduler.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Keep only items in at least one of these groups, if non-empty.
    pub include_groups: Vec<String>,
    /// Drop items in any of these groups.
    pub exclude_groups: Vec<String>,
    /// Keep only items whose truthy marker set includes this key.
    pub require_truthy: Option<String>,
    /// Keep only items whose display id contains this substring.
    pub id_substring: Option<String>,
}

impl Filter {
    /// Reports whether `item` survives every configured condition.
    ///
    /// # Arguments
    ///
    /// * `item` - the candidate item to test. Empty filter fields are
    ///   treated as "no constraint", not "match nothing".
    ///
    /// # Returns
    ///
    /// `true` if `item` is in at least one `include_groups` group (when
    /// non-empty), in none of `exclude_groups`, truthy for `require_truthy`
    /// (when set), and its [`TestItem::display_id`] contains `id_substring`
    /// (when set).
    pub fn matches(&self, item: &TestItem) -> bool {
        if !self.include_groups.is_empty() {
            let groups = item.markers.groups();
            if !self.include_groups.iter().any(|g| groups.contains(&g.as_str())) {
                return false;
            }
        }

        if !self.exclude_groups.is_empty() {
            let groups = item.markers.groups();
            if self.exclude_groups.iter().any(|g| groups.contains(&g.as_str())) {
                return false;
            }
        }

        if let Some(key) = &self.require_truthy {
            if !item.markers.get(key).is_some_and(|v| v.is_truthy()) {
                return false;
            }
        }

        if let Some(substring) = &self.id_substring {
            if !item.display_id().contains(substring.as_str()) {
                return false;
            }
        }

        true
    }

    /// Applies the filter to a full item set.
    ///
    /// # Arguments
    ///
    /// * `items` - the discovered (and possibly already-deduplicated) item
    ///   set, in discovery order.
    ///
    /// # Returns
    ///
    /// The subset of `items` that [`Filter::matches`], in their original
    /// relative order.
    ///
    /// # Example
    ///
    /// ```
    /// use taut::{Filter, MarkerSet, TestItem};
    ///
    /// let items = vec![
    ///     TestItem::new("t.py".into(), None, "test_login".into(), MarkerSet::new()),
    ///     TestItem::new("t.py".into(), None, "test_logout".into(), MarkerSet::new()),
    /// ];
    /// let filter = Filter { id_substring: Some("login".to_string()), ..Default::default() };
    /// let kept = filter.apply(items);
    /// assert_eq!(kept[0].function, "test_login");
    /// ```
    pub fn apply(&self, items: Vec<TestItem>) -> Vec<TestItem> {
        items.into_iter().filter(|item| self.matches(item)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MarkerSet, MarkerValue};
    use std::path::PathBuf;

    fn item(function: &str, group: Option<&str>, slow: bool) -> TestItem {
        let mut markers = MarkerSet::new();
        if let Some(group) = group {
            markers.set("group", MarkerValue::String(group.to_string()));
        }
        if slow {
            markers.set("slow", MarkerValue::Bool(true));
        }
        TestItem::new(PathBuf::from("t.py"), None, function.to_string(), markers)
    }

    #[test]
    fn include_groups_keeps_only_matching() {
        let items = vec![item("test_a", Some("auth"), false), item("test_b", Some("db"), false)];
        let filter = Filter {
            include_groups: vec!["auth".to_string()],
            ..Default::default()
        };
        let kept = filter.apply(items);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].function, "test_a");
    }

    #[test]
    fn require_truthy_filters_on_marker_value() {
        let items = vec![item("test_a", None, true), item("test_b", None, false)];
        let filter = Filter {
            require_truthy: Some("slow".to_string()),
            ..Default::default()
        };
        let kept = filter.apply(items);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].function, "test_a");
    }

    #[test]
    fn id_substring_matches_display_id() {
        let items = vec![item("test_login", None, false), item("test_logout", None, false)];
        let filter = Filter {
            id_substring: Some("login".to_string()),
            ..Default::default()
        };
        let kept = filter.apply(items);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].function, "test_login");
    }
}
