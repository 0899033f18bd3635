// Change detection: discovered files diffed against the store's cached stats.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Stat + hash cache for one path, read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    pub mtime: i64,
    pub size: i64,
    pub content_hash: String,
}

/// One discovered on-disk file: path plus cheap stat metadata.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: String,
    pub mtime: i64,
    pub size: i64,
}

/// A file needing work, with its freshly-computed content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub mtime: i64,
    pub size: i64,
    pub content_hash: String,
}

/// Result of diffing a discovery pass against the cache.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub added: Vec<Change>,
    pub modified: Vec<Change>,
    /// Stat metadata changed but content did not: record the new stats
    /// without re-extraction.
    pub touched: Vec<Change>,
    pub deleted: Vec<String>,
    /// Files whose content could not be read this pass. They keep whatever
    /// state the last successful pass committed.
    pub unreadable: Vec<String>,
    pub unchanged: usize,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.touched.is_empty()
            && self.deleted.is_empty()
    }
}

/// Classify discovered files against the cache.
///
/// A file is hashed (via `hash`) only when its stat metadata changed or it is
/// new; the hash, not the stat mismatch, is what decides `modified`. Cached
/// paths absent from discovery come back as `deleted`. A hash callback
/// returning `Ok(None)` marks the file `unreadable` and leaves its cached
/// state alone rather than failing the whole diff.
pub fn detect_changes<F>(
    discovered: &[DiscoveredFile],
    cached: &HashMap<String, CachedFile>,
    mut hash: F,
) -> anyhow::Result<ChangeSet>
where
    F: FnMut(&str) -> anyhow::Result<Option<String>>,
{
    let mut set = ChangeSet::default();
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for file in discovered {
        seen.insert(file.path.as_str());

        let Some(cache) = cached.get(&file.path) else {
            let Some(content_hash) = hash(&file.path)? else {
                set.unreadable.push(file.path.clone());
                continue;
            };
            set.added.push(Change {
                path: file.path.clone(),
                mtime: file.mtime,
                size: file.size,
                content_hash,
            });
            continue;
        };

        if cache.mtime == file.mtime && cache.size == file.size {
            set.unchanged += 1;
            continue;
        }

        let Some(content_hash) = hash(&file.path)? else {
            set.unreadable.push(file.path.clone());
            continue;
        };
        let change = Change {
            path: file.path.clone(),
            mtime: file.mtime,
            size: file.size,
            content_hash,
        };
        if change.content_hash == cache.content_hash {
            set.touched.push(change);
        } else {
            set.modified.push(change);
        }
    }

    for path in cached.keys() {
        if !seen.contains(path.as_str()) {
            set.deleted.push(path.clone());
        }
    }
    set.deleted.sort();

    Ok(set)
}

/// Hex blake3 digest of a content buffer.
pub fn content_hash(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}
