//
//  cache.rs
//  typegraph
//

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::model::SourceUnit;

#[derive(Debug, Clone)]
struct CacheEntry {
    package_path: String,
    len: usize,
    hash: u64,
    unit: SourceUnit,
}

/// Parsed units keyed by file path, reused while the content is unchanged.
///
/// Owned by the caller; nothing is global.
#[derive(Debug, Default)]
pub struct ParseCache {
    entries: HashMap<PathBuf, CacheEntry>,
    hits: usize,
    misses: usize,
}

fn fingerprint(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached unit for `path` if it was parsed from the same content and package.
    pub fn get(&mut self, path: &Path, package_path: &str, source: &str) -> Option<SourceUnit> {
        let found = self.entries.get(path).filter(|entry| {
            entry.package_path == package_path
                && entry.len == source.len()
                && entry.hash == fingerprint(source)
        });
        match found {
            Some(entry) => {
                self.hits += 1;
                Some(entry.unit.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, path: PathBuf, source: &str, unit: SourceUnit) {
        self.entries.insert(
            path,
            CacheEntry {
                package_path: unit.package_path.clone(),
                len: source.len(),
                hash: fingerprint(source),
                unit,
            },
        );
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
