// Configuration management for refgraph

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::store::RefMode;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub indexing: IndexingConfig,
    pub query: QueryConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub exclude: Vec<String>,
    pub include: Vec<String>,
    /// "structural" or "full" (full adds read/write identifier references)
    pub mode: String,
    /// Project file whose contents gate reference invalidation (for example
    /// a tsconfig); its hash is the config component of the fingerprint.
    pub resolution_config: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_depth: usize,
    pub max_items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            indexing: IndexingConfig::default(),
            query: QueryConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "unnamed-project".to_string(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "target/".to_string(),
                "node_modules/".to_string(),
                ".git/".to_string(),
                ".refgraph.db".to_string(),
            ],
            include: vec![],
            mode: "structural".to_string(),
            resolution_config: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_items: 200,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the project root, looking for .refgraph.toml;
    /// falls back to defaults when absent or unreadable.
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(".refgraph.toml");

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                Self::default()
            }
        }
    }

    pub fn ref_mode(&self) -> RefMode {
        match self.indexing.mode.as_str() {
            "full" => RefMode::Full,
            _ => RefMode::Structural,
        }
    }

    /// Hash of the resolution-config file contents, the config component of
    /// the reference fingerprint. Absence (not configured, or file missing)
    /// is None.
    pub fn config_fingerprint<P: AsRef<Path>>(&self, project_dir: P) -> Option<String> {
        let rel = self.indexing.resolution_config.as_deref()?;
        let path = project_dir.as_ref().join(rel);
        let content = std::fs::read(path).ok()?;
        Some(blake3::hash(&content).to_hex().to_string())
    }

    /// Check if a file path should be indexed based on include/exclude patterns
    pub fn should_index_file(&self, file_path: &str) -> bool {
        for pattern in &self.indexing.exclude {
            if matches_pattern(file_path, pattern) {
                return false;
            }
        }

        // If include patterns are specified, the file must match at least one
        if !self.indexing.include.is_empty() {
            return self
                .indexing
                .include
                .iter()
                .any(|pattern| matches_pattern(file_path, pattern));
        }

        true
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project.name.is_empty() {
            anyhow::bail!("Project name cannot be empty");
        }

        let valid_modes = ["structural", "full"];
        if !valid_modes.contains(&self.indexing.mode.as_str()) {
            anyhow::bail!("Invalid reference mode: {}", self.indexing.mode);
        }

        if self.query.max_depth == 0 {
            anyhow::bail!("Query max depth must be greater than 0");
        }
        if self.query.max_items == 0 {
            anyhow::bail!("Query max items must be greater than 0");
        }
        if self.store.busy_timeout_ms == 0 {
            anyhow::bail!("Busy timeout must be greater than 0");
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        Ok(())
    }
}

/// Simple glob-style pattern matching over forward-slash paths.
fn matches_pattern(file_path: &str, pattern: &str) -> bool {
    if let Some(dir) = pattern.strip_suffix('/') {
        // Directory pattern: anywhere in the path
        file_path.starts_with(pattern) || file_path.contains(&format!("/{dir}/"))
    } else if let Some(suffix) = pattern.strip_prefix("*.") {
        file_path.ends_with(&format!(".{suffix}"))
    } else if let Some(inner) = pattern
        .strip_prefix("**/")
        .and_then(|p| p.strip_suffix("/**"))
    {
        file_path.starts_with(&format!("{inner}/")) || file_path.contains(&format!("/{inner}/"))
    } else {
        file_path == pattern || file_path.ends_with(&format!("/{pattern}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.project.name, "unnamed-project");
        assert!(config.indexing.exclude.contains(&"target/".to_string()));
        assert_eq!(config.ref_mode(), RefMode::Structural);
    }

    #[test]
    fn test_should_index_file() {
        let config = Config::default();

        assert!(config.should_index_file("src/main.rs"));
        assert!(config.should_index_file("lib/utils.py"));

        assert!(!config.should_index_file("target/debug/binary"));
        assert!(!config.should_index_file("node_modules/package/file.js"));
        assert!(!config.should_index_file(".refgraph.db"));
    }

    #[test]
    fn test_include_patterns_narrow_scope() {
        let mut config = Config::default();
        config.indexing.include = vec!["*.ts".to_string()];

        assert!(config.should_index_file("src/app.ts"));
        assert!(!config.should_index_file("src/app.py"));
        // exclusion still wins over inclusion
        assert!(!config.should_index_file("node_modules/x/y.ts"));
    }

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("target/debug/file", "target/"));
        assert!(matches_pattern("src/target/file", "target/"));

        assert!(matches_pattern("test.py", "*.py"));
        assert!(!matches_pattern("test.rs", "*.py"));

        assert!(matches_pattern("src/__tests__/test.py", "**/__tests__/**"));
        assert!(matches_pattern("__tests__/test.py", "**/__tests__/**"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.indexing.mode = "everything".to_string();
        assert!(config.validate().is_err());
        config.indexing.mode = "full".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.ref_mode(), RefMode::Full);

        config.query.max_depth = 0;
        assert!(config.validate().is_err());
        config.query.max_depth = 10;

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_fingerprint_absent_is_none() {
        let config = Config::default();
        assert_eq!(config.config_fingerprint("."), None);
    }
}
