// CLI command implementations

pub mod annotate;
pub mod clear;
pub mod graph;
pub mod index;
pub mod query;
pub mod stats;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::indexer::DB_FILE;
use crate::store::GraphStore;

/// Open the store for a project without running an indexing pass.
pub(crate) fn open_store(project: &str, config: &Config) -> anyhow::Result<GraphStore> {
    let db_path = PathBuf::from(project).join(DB_FILE);
    if !db_path.exists() {
        anyhow::bail!(
            "No index found at {} (run 'refgraph index' first)",
            db_path.display()
        );
    }
    Ok(GraphStore::open(
        db_path,
        Duration::from_millis(config.store.busy_timeout_ms),
    )?)
}
