// Incremental reference-graph index: change detection, fact storage,
// reference resolution, invalidation and graph queries over one SQLite file
// per repository root.

pub mod annotations;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod facts;
pub mod indexer;
pub mod invalidate;
pub mod query;
pub mod resolve;
pub mod store;

pub use config::Config;
pub use error::{Result, StoreError};
pub use indexer::{Indexer, PassReport};
pub use store::GraphStore;
