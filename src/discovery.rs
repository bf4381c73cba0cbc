//! Discovery walker (spec §4.B): turns a set of root directories into a
//! deduplicated, deterministically ordered item set.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::collector;
use crate::error::DiscoveryError;
use crate::model::{DiscoveryWarning, TestItem};

/// Directories skipped during traversal by default, matching the host
/// language's own build/cache directories.
pub fn default_excluded_dirs() -> HashSet<String> {
    ["__pycache__", ".git", ".venv", "venv", ".tox", "node_modules"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// The result of walking a set of roots: every discovered item plus any
/// non-fatal warnings encountered along the way.
#[derive(Debug, Clone, Default)]
pub struct ItemSet {
    pub items: Vec<TestItem>,
    pub warnings: Vec<DiscoveryWarning>,
}

/// Walks `roots`, collecting test items from every file that matches the
/// `test_*.py` / `*_test.py` naming convention, skipping hidden directories
/// and `excluded_dirs`.
///
/// Returns items sorted and deduplicated by identity, per spec §4.B:
/// "Deterministic ordering: sort items lexicographically by (file, class or
/// empty, function)."
pub fn discover(roots: &[PathBuf], excluded_dirs: &HashSet<String>) -> Result<ItemSet, DiscoveryError> {
    let mut items = Vec::new();
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    for root in roots {
        if !root.exists() {
            return Err(DiscoveryError::RootNotFound(root.clone()));
        }

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !is_excluded(e.path(), root, excluded_dirs))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                    return Err(DiscoveryError::Io { path, source });
                }
            };

            if !entry.file_type().is_file() || !is_test_file(entry.path()) {
                continue;
            }

            let path = entry.path().to_path_buf();
            let absolute = path.canonicalize().unwrap_or(path.clone());

            let bytes = match std::fs::read(&absolute) {
                Ok(bytes) => bytes,
                Err(source) => return Err(DiscoveryError::Io { path: absolute, source }),
            };

            let (file_items, file_warnings) = collector::collect(&absolute, &bytes);
            warnings.extend(file_warnings);

            for item in file_items {
                if seen.insert(identity_key(&item)) {
                    items.push(item);
                }
            }
        }
    }

    items.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then_with(|| a.class.as_deref().unwrap_or("").cmp(b.class.as_deref().unwrap_or("")))
            .then_with(|| a.function.cmp(&b.function))
    });

    Ok(ItemSet { items, warnings })
}

fn identity_key(item: &TestItem) -> (PathBuf, String, String) {
    (
        item.file.clone(),
        item.class.clone().unwrap_or_default(),
        item.function.clone(),
    )
}

fn is_excluded(path: &Path, root: &Path, excluded_dirs: &HashSet<String>) -> bool {
    if path == root {
        return false;
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') && path.is_dir() {
        return true;
    }
    path.is_dir() && excluded_dirs.contains(name)
}

fn is_test_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if path.extension().and_then(|e| e.to_str()) != Some("py") {
        return false;
    }
    let stem = &name[..name.len() - 3];
    stem.starts_with("test_") || stem.ends_with("_test")
}
