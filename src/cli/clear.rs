use anyhow::Result;

use crate::config::Config;

/// Drop index data. Annotations are user-authored and survive unless
/// `include_annotations` is set.
pub fn clear_index(project: String, include_annotations: bool) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let store = super::open_store(&project, &config)?;

    store.clear(include_annotations)?;

    if include_annotations {
        println!("Index and annotations cleared");
    } else {
        println!("Index cleared (annotations preserved)");
    }
    Ok(())
}
