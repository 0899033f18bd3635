// User-authored annotations, attached to files or symbols by structural
// description rather than by row id, so they survive reindexing.

use serde::Serialize;

use crate::error::Result;
use crate::store::{db, AnnotationRecord, GraphStore, SymbolKind, SymbolRecord, TagRecord};

/// What an annotation attaches to.
#[derive(Debug, Clone)]
pub enum AnnotationTarget {
    File,
    Symbol {
        name: String,
        kind: Option<SymbolKind>,
        parent_name: Option<String>,
        /// Empty string matches any signature.
        signature: String,
    },
}

/// An annotation joined with its tags and current resolution status.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationView {
    pub annotation: AnnotationRecord,
    pub tags: Vec<TagRecord>,
    /// False when the annotated file or symbol no longer exists in the index.
    pub resolved: bool,
}

/// Annotation CRUD over the graph store.
///
/// Symbol-scoped annotations record a symbol description (name, optional kind,
/// optional parent, optional signature), never a symbol id: ids are
/// re-assigned on every extraction, while the description keeps matching as
/// long as an equivalent symbol exists.
pub struct AnnotationService<'a> {
    store: &'a GraphStore,
}

impl<'a> AnnotationService<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// Create an annotation. The target file (and symbol, if symbol-scoped)
    /// must currently exist in the index; annotating unindexed content is
    /// almost always a typo.
    pub fn add(
        &self,
        path: &str,
        target: AnnotationTarget,
        content: &str,
    ) -> Result<AnnotationRecord> {
        if self.store.get_file(path)?.is_none() {
            return Err(crate::error::StoreError::Store(format!(
                "File not indexed: {path}"
            )));
        }

        let now = db::now();
        let mut record = AnnotationRecord {
            id: 0,
            path: path.to_string(),
            symbol_name: None,
            symbol_kind: None,
            parent_name: None,
            signature: String::new(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };

        if let AnnotationTarget::Symbol {
            name,
            kind,
            parent_name,
            signature,
        } = target
        {
            record.symbol_name = Some(name);
            record.symbol_kind = kind;
            record.parent_name = parent_name;
            record.signature = signature;
            if self.resolve_symbol(&record)?.is_none() {
                return Err(crate::error::StoreError::Store(format!(
                    "No matching symbol in {}: {}",
                    record.path,
                    record.symbol_name.as_deref().unwrap_or("")
                )));
            }
        }

        record.id = self.store.insert_annotation(&record)?;
        Ok(record)
    }

    pub fn update(&self, id: i64, content: &str) -> Result<()> {
        self.store
            .update_annotation_content(id, content, db::now())
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.store.delete_annotation(id)
    }

    pub fn tag(&self, id: i64, key: &str, value: &str) -> Result<()> {
        self.store.add_tag(id, key, value)
    }

    /// Annotations for one file, each with tags and resolution status.
    pub fn for_path(&self, path: &str) -> Result<Vec<AnnotationView>> {
        self.store
            .annotations_for_path(path)?
            .into_iter()
            .map(|ann| self.view(ann))
            .collect()
    }

    pub fn all(&self) -> Result<Vec<AnnotationView>> {
        self.store
            .all_annotations()?
            .into_iter()
            .map(|ann| self.view(ann))
            .collect()
    }

    /// Annotations whose target no longer exists. Reindexing never deletes
    /// annotations; orphans accumulate until pruned.
    pub fn orphans(&self) -> Result<Vec<AnnotationRecord>> {
        let mut orphaned = Vec::new();
        for ann in self.store.all_annotations()? {
            if !self.is_resolved(&ann)? {
                orphaned.push(ann);
            }
        }
        Ok(orphaned)
    }

    /// Delete every orphaned annotation; returns how many were removed.
    pub fn prune(&self) -> Result<usize> {
        let orphans = self.orphans()?;
        let count = orphans.len();
        for ann in orphans {
            self.store.delete_annotation(ann.id)?;
        }
        Ok(count)
    }

    fn view(&self, annotation: AnnotationRecord) -> Result<AnnotationView> {
        let resolved = self.is_resolved(&annotation)?;
        let tags = self.store.tags_for(annotation.id)?;
        Ok(AnnotationView {
            annotation,
            tags,
            resolved,
        })
    }

    fn is_resolved(&self, ann: &AnnotationRecord) -> Result<bool> {
        if self.store.get_file(&ann.path)?.is_none() {
            return Ok(false);
        }
        if ann.symbol_name.is_none() {
            return Ok(true);
        }
        Ok(self.resolve_symbol(ann)?.is_some())
    }

    /// Find the symbol an annotation describes, if any still matches. Kind,
    /// parent and signature only constrain when set; a stored empty signature
    /// matches any.
    fn resolve_symbol(&self, ann: &AnnotationRecord) -> Result<Option<SymbolRecord>> {
        let Some(name) = &ann.symbol_name else {
            return Ok(None);
        };
        let matched = self
            .store
            .symbols_for_file(&ann.path)?
            .into_iter()
            .find(|s| {
                s.name == *name
                    && ann.symbol_kind.map_or(true, |k| s.kind == k)
                    && (ann.parent_name.is_none() || s.parent_name == ann.parent_name)
                    && (ann.signature.is_empty()
                        || s.signature.as_deref() == Some(ann.signature.as_str()))
            });
        Ok(matched)
    }
}
