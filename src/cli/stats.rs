use anyhow::Result;

use crate::config::Config;

pub fn show_stats(project: String, verbose: bool) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let store = super::open_store(&project, &config)?;

    let stats = store.stats()?;

    println!("Refgraph Statistics v0.1.0");
    println!("Project: {}", project);
    println!("\nIndex:");
    println!("  Files:       {}", stats.total_files);
    println!("  Symbols:     {}", stats.total_symbols);
    println!("  Imports:     {}", stats.total_imports);
    println!("  References:  {}", stats.total_refs);
    println!("  Annotations: {}", stats.total_annotations);

    let db_size = std::fs::metadata(store.db_path())
        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0);
    println!("  Size:        {:.2} MB", db_size);

    if verbose {
        let languages = store.files_by_language()?;
        if !languages.is_empty() {
            println!("\nFiles by language:");
            for (language, count) in languages {
                println!("  {}: {}", language, count);
            }
        }

        let kinds = store.refs_by_kind()?;
        if !kinds.is_empty() {
            println!("\nReferences by kind:");
            for (kind, count) in kinds {
                println!("  {}: {}", kind, count);
            }
        }
    }

    Ok(())
}
