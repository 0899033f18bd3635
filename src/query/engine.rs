// Flat queries: by file path, by symbol identity or structural key

use serde::Serialize;

use crate::error::Result;
use crate::store::{
    CodeBlockRecord, FileRecord, GraphStore, HeadingRecord, ImportRecord, RefKind, RefRecord,
    SymbolKind, SymbolRecord,
};

/// Everything stored for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOverview {
    pub file: FileRecord,
    pub symbols: Vec<SymbolRecord>,
    pub imports: Vec<ImportRecord>,
    pub headings: Vec<HeadingRecord>,
    pub code_blocks: Vec<CodeBlockRecord>,
}

/// Query engine
pub struct QueryEngine {
    store: GraphStore,
    max_items: usize,
}

impl QueryEngine {
    pub fn new(store: GraphStore, max_items: usize) -> Self {
        Self { store, max_items }
    }

    pub fn file_overview(&self, path: &str) -> Result<Option<FileOverview>> {
        let Some(file) = self.store.get_file(path)? else {
            return Ok(None);
        };
        Ok(Some(FileOverview {
            symbols: self.store.symbols_for_file(path)?,
            imports: self.store.imports_for_file(path)?,
            headings: self.store.headings_for_file(path)?,
            code_blocks: self.store.code_blocks_for_file(path)?,
            file,
        }))
    }

    /// Locate symbols by name, optionally narrowed by kind.
    pub fn find_symbols(&self, name: &str, kind: Option<SymbolKind>) -> Result<Vec<SymbolRecord>> {
        self.store.find_symbols_by_name(name, kind)
    }

    /// Incoming references to a symbol named by path + name, with an optional
    /// kind filter, capped at the configured item limit.
    pub fn incoming_references(
        &self,
        path: &str,
        symbol_name: &str,
        kinds: Option<&[RefKind]>,
        limit: Option<usize>,
    ) -> Result<Vec<RefRecord>> {
        self.store
            .incoming_refs(path, symbol_name, kinds, limit.unwrap_or(self.max_items))
    }

    /// Outgoing references from a file, optionally restricted to one
    /// enclosing symbol.
    pub fn outgoing_references(
        &self,
        path: &str,
        from_symbol: Option<&str>,
        kinds: Option<&[RefKind]>,
        limit: Option<usize>,
    ) -> Result<Vec<RefRecord>> {
        self.store
            .outgoing_refs(path, from_symbol, kinds, limit.unwrap_or(self.max_items))
    }

    /// Incoming references for every symbol with this name, across files.
    /// Used when the caller has a name but no path.
    pub fn references_by_name(
        &self,
        symbol_name: &str,
        kind: Option<SymbolKind>,
        ref_kinds: Option<&[RefKind]>,
    ) -> Result<Vec<RefRecord>> {
        let mut out = Vec::new();
        for symbol in self.store.find_symbols_by_name(symbol_name, kind)? {
            let mut refs = self.store.incoming_refs(
                &symbol.path,
                &symbol.name,
                ref_kinds,
                self.max_items.saturating_sub(out.len()),
            )?;
            out.append(&mut refs);
            if out.len() >= self.max_items {
                break;
            }
        }
        Ok(out)
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{FileFacts, RawSymbol};
    use crate::store::{FileRecord, MODULE_SENTINEL};
    use std::time::Duration;
    use tempfile::tempdir;

    fn seed() -> (tempfile::TempDir, QueryEngine) {
        let dir = tempdir().unwrap();
        let store =
            GraphStore::open(dir.path().join("t.db"), Duration::from_millis(100)).unwrap();

        let facts = FileFacts {
            symbols: vec![RawSymbol {
                name: "foo".to_string(),
                kind: SymbolKind::Function,
                start_line: 1,
                end_line: 3,
                exported: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        let file = FileRecord {
            path: "a.ts".to_string(),
            mtime: 1,
            size: 1,
            content_hash: "h".to_string(),
            language: "typescript".to_string(),
            line_count: 3,
            extractor_version: 1,
            updated_at: 0,
        };
        store.apply_file_change(&file, &facts).unwrap();

        let mut b = file.clone();
        b.path = "b.ts".to_string();
        store.apply_file_change(&b, &FileFacts::default()).unwrap();

        let refs = vec![
            RefRecord {
                id: 0,
                path: "b.ts".to_string(),
                from_symbol_name: Some("bar".to_string()),
                from_symbol_kind: Some(SymbolKind::Function),
                line: 2,
                col: 4,
                len: 3,
                kind: RefKind::Call,
                to_path: Some("a.ts".to_string()),
                to_symbol_id: None,
                to_symbol_name: "foo".to_string(),
                to_symbol_kind: Some(SymbolKind::Function),
                to_symbol_parent: None,
                unresolved_reason: None,
            },
            RefRecord {
                id: 0,
                path: "b.ts".to_string(),
                from_symbol_name: None,
                from_symbol_kind: None,
                line: 1,
                col: 0,
                len: 8,
                kind: RefKind::Import,
                to_path: Some("a.ts".to_string()),
                to_symbol_id: None,
                to_symbol_name: MODULE_SENTINEL.to_string(),
                to_symbol_kind: None,
                to_symbol_parent: None,
                unresolved_reason: None,
            },
        ];
        store.recompute_refs("b.ts", &refs, "h:structural:").unwrap();

        (dir, QueryEngine::new(store, 50))
    }

    #[test]
    fn incoming_references_filter_by_kind() {
        let (_dir, engine) = seed();

        let calls = engine
            .incoming_references("a.ts", "foo", Some(&[RefKind::Call]), None)
            .unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "b.ts");
        assert_eq!(calls[0].line, 2);

        let writes = engine
            .incoming_references("a.ts", "foo", Some(&[RefKind::Write]), None)
            .unwrap();
        assert!(writes.is_empty());
    }

    #[test]
    fn references_by_name_resolves_without_path() {
        let (_dir, engine) = seed();
        let refs = engine
            .references_by_name("foo", Some(SymbolKind::Function), Some(&[RefKind::Call]))
            .unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].from_symbol_name.as_deref(), Some("bar"));
    }

    #[test]
    fn file_overview_collects_all_row_kinds() {
        let (_dir, engine) = seed();
        let overview = engine.file_overview("a.ts").unwrap().unwrap();
        assert_eq!(overview.symbols.len(), 1);
        assert!(engine.file_overview("missing.ts").unwrap().is_none());
    }

    #[test]
    fn item_cap_bounds_results() {
        let (_dir, engine) = seed();
        let refs = engine
            .incoming_references("a.ts", "foo", None, Some(1))
            .unwrap();
        assert_eq!(refs.len(), 1);
    }
}
