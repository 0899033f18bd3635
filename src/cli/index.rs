use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::indexer::Indexer;

pub fn index_project(project: String, mode: Option<String>, force: bool) -> Result<()> {
    info!("Indexing project: {}", project);

    let mut config = Config::from_project_dir(&project);
    if let Some(mode) = mode {
        config.indexing.mode = mode;
        config.validate()?;
    }

    println!("Refgraph Indexer v0.1.0");
    println!("Project: {}", project);
    println!(
        "Config: {}",
        if config.project.name != "unnamed-project" {
            "loaded"
        } else {
            "default"
        }
    );
    println!("Mode: {}", config.ref_mode().as_str());
    if force {
        println!("Force: recomputing all references");
    }

    let indexer = Indexer::new(&project, config)?;
    println!("Database: {}", indexer.store().db_path().display());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Indexing...");

    let report = indexer.run_pass(force)?;
    spinner.finish_and_clear();

    println!("\nPass complete:");
    println!("  Added:      {}", report.added);
    println!("  Modified:   {}", report.modified);
    println!("  Touched:    {}", report.touched);
    println!("  Deleted:    {}", report.deleted);
    println!("  Unchanged:  {}", report.unchanged);
    if report.skipped_binary > 0 {
        println!("  Skipped (binary): {}", report.skipped_binary);
    }
    if report.reextracted > 0 {
        println!("  Re-extracted (new extractor): {}", report.reextracted);
    }
    println!("  References recomputed: {}", report.refs_recomputed);

    if !report.failed.is_empty() {
        println!("\n{} file(s) failed (will retry next pass):", report.failed.len());
        for (path, reason) in &report.failed {
            println!("  {} - {}", path, reason);
        }
    }

    Ok(())
}
