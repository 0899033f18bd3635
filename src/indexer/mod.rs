// Indexing passes: discover -> diff -> extract -> apply -> invalidate

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::diff::{self, DiscoveredFile};
use crate::facts::{
    detect_language, looks_binary, Extractor, FileFacts, MarkdownExtractor, PassContext,
};
use crate::invalidate;
use crate::store::{db, FileRecord, GraphStore};

/// Default store file name inside the project root.
pub const DB_FILE: &str = ".refgraph.db";

/// Summary of one indexing pass.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub added: usize,
    pub modified: usize,
    pub touched: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped_binary: usize,
    /// Files untouched on disk but re-extracted because their stored rows
    /// came from an older extractor version.
    pub reextracted: usize,
    pub refs_recomputed: usize,
    /// Files that could not be processed this pass, with reasons. Their
    /// stored state is whatever the last successful pass committed.
    pub failed: Vec<(String, String)>,
}

/// Coordinates extraction and storage for one project root.
///
/// Single-threaded and synchronous within a pass: discovery, diff,
/// extraction, store transactions and invalidation run strictly in sequence.
pub struct Indexer {
    root: PathBuf,
    config: Config,
    store: GraphStore,
    extractors: Vec<Box<dyn Extractor>>,
}

impl Indexer {
    pub fn new(root: impl AsRef<Path>, config: Config) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let store = GraphStore::open(
            root.join(DB_FILE),
            Duration::from_millis(config.store.busy_timeout_ms),
        )?;

        Ok(Self {
            root,
            config,
            store,
            extractors: vec![Box::new(MarkdownExtractor)],
        })
    }

    /// Register a language extractor. Later registrations win for paths
    /// multiple extractors claim.
    pub fn register_extractor(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.insert(0, extractor);
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn extractor_for(&self, path: &str) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.can_extract(path))
            .map(|e| e.as_ref())
    }

    /// Walk the project root and collect in-scope files with cheap stats.
    pub fn discover(&self) -> anyhow::Result<Vec<DiscoveredFile>> {
        let mut discovered = Vec::new();

        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let path = rel.to_string_lossy().replace('\\', "/");

            if !self.config.should_index_file(&path) || self.extractor_for(&path).is_none() {
                continue;
            }

            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            discovered.push(DiscoveredFile {
                path,
                mtime,
                size: meta.len() as i64,
            });
        }

        Ok(discovered)
    }

    /// Run one full indexing pass. With `force_refresh`, every in-scope
    /// file's references are recomputed regardless of fingerprints.
    pub fn run_pass(&self, force_refresh: bool) -> anyhow::Result<PassReport> {
        let mode = self.config.ref_mode();
        let config_hash = self.config.config_fingerprint(&self.root);
        let mut ctx = PassContext::new(mode, config_hash.clone());
        let mut report = PassReport::default();

        let discovered = self.discover()?;
        let cached = self.store.cached_files()?;
        info!(
            "Discovered {} files ({} cached)",
            discovered.len(),
            cached.len()
        );

        // Contents read for hashing are kept for the extraction step. A file
        // that fails to read is reported and skipped, not a pass failure.
        let mut contents: HashMap<String, Vec<u8>> = HashMap::new();
        let mut read_errors: HashMap<String, String> = HashMap::new();
        let root = self.root.clone();
        let changes = diff::detect_changes(&discovered, &cached, |path| {
            match std::fs::read(root.join(path)) {
                Ok(bytes) => {
                    let hash = diff::content_hash(&bytes);
                    contents.insert(path.to_string(), bytes);
                    Ok(Some(hash))
                }
                Err(e) => {
                    read_errors.insert(path.to_string(), e.to_string());
                    Ok(None)
                }
            }
        })?;

        report.unchanged = changes.unchanged;
        for path in &changes.unreadable {
            let reason = read_errors
                .remove(path)
                .unwrap_or_else(|| "unreadable".to_string());
            warn!("could not read {}: {}", path, reason);
            report.failed.push((path.clone(), reason));
        }

        for path in &changes.deleted {
            self.store.delete_file(path)?;
            report.deleted += 1;
        }

        let now = db::now();
        for change in &changes.touched {
            self.store
                .apply_touch(&change.path, change.mtime, change.size, now)?;
            report.touched += 1;
        }

        // First extraction of each file is kept for the invalidation step so
        // a pass never extracts the same file twice.
        let mut fresh_facts: HashMap<String, FileFacts> = HashMap::new();

        for (change, is_added) in changes
            .added
            .iter()
            .map(|c| (c, true))
            .chain(changes.modified.iter().map(|c| (c, false)))
        {
            let bytes = match contents.remove(&change.path) {
                Some(bytes) => bytes,
                None => match std::fs::read(self.root.join(&change.path)) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("could not read {}: {}", change.path, e);
                        report.failed.push((change.path.clone(), e.to_string()));
                        continue;
                    }
                },
            };
            if looks_binary(&bytes) {
                debug!("Skipping binary file {}", change.path);
                report.skipped_binary += 1;
                continue;
            }
            let content = String::from_utf8_lossy(&bytes);

            let Some(extractor) = self.extractor_for(&change.path) else {
                continue;
            };
            let facts = match extractor.extract(&mut ctx, &change.path, &content) {
                Ok(facts) => facts,
                Err(e) => {
                    warn!("extraction failed for {}: {}", change.path, e);
                    report.failed.push((change.path.clone(), e.to_string()));
                    continue;
                }
            };

            let record = FileRecord {
                path: change.path.clone(),
                mtime: change.mtime,
                size: change.size,
                content_hash: change.content_hash.clone(),
                language: detect_language(&change.path).to_string(),
                line_count: facts.line_count,
                extractor_version: extractor.version(),
                updated_at: now,
            };
            self.store.apply_file_change(&record, &facts)?;
            fresh_facts.insert(change.path.clone(), facts);
            if is_added {
                report.added += 1;
            } else {
                report.modified += 1;
            }
        }

        // Stored rows written by an older extractor version are stale even
        // when the file itself is untouched: re-extract them now. Dropping
        // their ref_state in the rewrite makes the invalidation step below
        // recompute their references and dependents.
        let processed: HashSet<&str> = changes
            .added
            .iter()
            .chain(changes.modified.iter())
            .map(|c| c.path.as_str())
            .chain(changes.unreadable.iter().map(|p| p.as_str()))
            .collect();
        for file in self.store.list_files()? {
            if processed.contains(file.path.as_str()) {
                continue;
            }
            let Some(extractor) = self.extractor_for(&file.path) else {
                continue;
            };
            if extractor.version() == file.extractor_version {
                continue;
            }
            let bytes = match std::fs::read(self.root.join(&file.path)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("could not read {}: {}", file.path, e);
                    report.failed.push((file.path.clone(), e.to_string()));
                    continue;
                }
            };
            if looks_binary(&bytes) {
                continue;
            }
            let content = String::from_utf8_lossy(&bytes);
            let facts = match extractor.extract(&mut ctx, &file.path, &content) {
                Ok(facts) => facts,
                Err(e) => {
                    warn!("extraction failed for {}: {}", file.path, e);
                    report.failed.push((file.path.clone(), e.to_string()));
                    continue;
                }
            };
            let record = FileRecord {
                path: file.path.clone(),
                mtime: file.mtime,
                size: file.size,
                content_hash: file.content_hash.clone(),
                language: detect_language(&file.path).to_string(),
                line_count: facts.line_count,
                extractor_version: extractor.version(),
                updated_at: now,
            };
            self.store.apply_file_change(&record, &facts)?;
            fresh_facts.insert(file.path.clone(), facts);
            report.reextracted += 1;
        }

        // Reference invalidation: changed files plus their transitive
        // dependents, with removals as closure seeds.
        let plan = invalidate::plan(
            &self.store,
            mode,
            config_hash.as_deref(),
            &changes.deleted,
            force_refresh,
        )?;
        debug!(
            "Invalidation: {} direct, {} affected",
            plan.direct.len(),
            plan.affected.len()
        );

        let outcome = invalidate::execute(&self.store, &mut ctx, &plan, |ctx, path| {
            if let Some(facts) = fresh_facts.remove(path) {
                return Ok(facts);
            }
            let bytes = std::fs::read(root.join(path))?;
            let content = String::from_utf8_lossy(&bytes);
            let extractor = self
                .extractor_for(path)
                .ok_or_else(|| anyhow::anyhow!("no extractor for {path}"))?;
            extractor.extract(ctx, path, &content)
        })?;

        report.refs_recomputed = outcome.recomputed.len();
        report.failed.extend(outcome.failed);

        info!(
            "Pass complete: +{} ~{} -{} touched {} unchanged {} refs {}",
            report.added,
            report.modified,
            report.deleted,
            report.touched,
            report.unchanged,
            report.refs_recomputed
        );
        Ok(report)
    }
}
