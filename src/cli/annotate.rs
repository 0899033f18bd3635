use anyhow::Result;

use crate::annotations::{AnnotationService, AnnotationTarget};
use crate::config::Config;
use crate::store::SymbolKind;

pub fn add_annotation(
    project: String,
    path: String,
    symbol: Option<String>,
    kind: Option<String>,
    content: String,
) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let store = super::open_store(&project, &config)?;
    let svc = AnnotationService::new(&store);

    let target = match symbol {
        Some(name) => AnnotationTarget::Symbol {
            name,
            kind: kind.as_deref().map(SymbolKind::parse).transpose()?,
            parent_name: None,
            signature: String::new(),
        },
        None => AnnotationTarget::File,
    };

    let ann = svc.add(&path, target, &content)?;
    println!("Annotation {} added to {}", ann.id, ann.path);
    Ok(())
}

pub fn list_annotations(project: String, path: Option<String>, format: String) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let store = super::open_store(&project, &config)?;
    let svc = AnnotationService::new(&store);

    let views = match path {
        Some(path) => svc.for_path(&path)?,
        None => svc.all()?,
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if views.is_empty() {
        println!("No annotations");
    }
    for view in &views {
        let ann = &view.annotation;
        let scope = ann
            .symbol_name
            .as_deref()
            .map(|s| format!(":{s}"))
            .unwrap_or_default();
        let status = if view.resolved { "" } else { " (orphaned)" };
        println!("[{}] {}{}{}", ann.id, ann.path, scope, status);
        println!("    {}", ann.content);
        for tag in &view.tags {
            println!("    #{}={}", tag.key, tag.value);
        }
    }
    Ok(())
}

pub fn tag_annotation(project: String, id: i64, key: String, value: String) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let store = super::open_store(&project, &config)?;
    AnnotationService::new(&store).tag(id, &key, &value)?;
    println!("Tagged annotation {id}: {key}={value}");
    Ok(())
}

pub fn delete_annotation(project: String, id: i64) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let store = super::open_store(&project, &config)?;
    AnnotationService::new(&store).delete(id)?;
    println!("Annotation {id} deleted");
    Ok(())
}

/// Remove annotations whose file or symbol no longer exists. Reindexing never
/// deletes them; this is the only way they go away in bulk.
pub fn prune_annotations(project: String) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let store = super::open_store(&project, &config)?;
    let removed = AnnotationService::new(&store).prune()?;
    println!("Pruned {removed} orphaned annotation(s)");
    Ok(())
}
