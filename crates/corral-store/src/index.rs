//! Remote template index
//!
//! The index is a plain text file with one relative package path per line:
//!
//! ```text
//! apps/demo_v1.0.0.tgz
//! ./capsules/dashboards_v2.1-beta.zip
//! ```
//!
//! The first path segment is the category the package is stored under.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::error::{Result, StoreError};

static INDEX_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\./)?([a-zA-Z]+)/([a-zA-Z0-9-]+)_v([0-9.]+)(-(alpha|beta))?\.(zip|tgz|tar\.gz)$")
        .expect("valid index line pattern")
});

/// Relative package path -> download URL
pub type Index = BTreeMap<String, String>;

/// Parse an index body.
///
/// Blank lines are skipped and a leading `./` is dropped. Any other line
/// that is not a package path rejects the whole index.
pub fn parse_index(body: &str, address: &str) -> Result<Index> {
    let mut index = Index::new();

    for (number, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !INDEX_LINE.is_match(line) {
            return Err(StoreError::InvalidIndexLine {
                line: number + 1,
                content: line.to_string(),
            });
        }
        let path = line.trim_start_matches("./");
        index.insert(path.to_string(), package_url(address, path));
    }

    Ok(index)
}

/// `address` joined with a relative path
pub fn package_url(address: &str, path: &str) -> String {
    format!("{}/{}", address.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Category segment of a normalized index path
pub fn category_of(path: &str) -> Option<&str> {
    path.split_once('/').map(|(category, _)| category)
}

/// Changes needed to go from the known index to the remote one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDiff {
    /// New entries and entries whose URL changed
    pub add: Index,
    /// Known entries no longer listed
    pub delete: Index,
}

impl IndexDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.delete.is_empty()
    }
}

/// Diff by path and URL identity
pub fn diff(known: &Index, remote: &Index) -> IndexDiff {
    if known.is_empty() {
        return IndexDiff {
            add: remote.clone(),
            delete: Index::new(),
        };
    }
    if remote.is_empty() {
        return IndexDiff {
            add: Index::new(),
            delete: known.clone(),
        };
    }

    let add = remote
        .iter()
        .filter(|(path, url)| known.get(*path) != Some(*url))
        .map(|(p, u)| (p.clone(), u.clone()))
        .collect();
    let delete = known
        .iter()
        .filter(|(path, _)| !remote.contains_key(*path))
        .map(|(p, u)| (p.clone(), u.clone()))
        .collect();

    IndexDiff { add, delete }
}
