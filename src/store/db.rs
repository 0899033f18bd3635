use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use super::schema::{self, ANNOTATION_TABLES, INDEX_TABLES};
use super::{
    AnnotationRecord, CodeBlockRecord, FileRecord, HeadingRecord, ImportRecord, RefKind,
    RefRecord, StoreStats, SymbolKind, SymbolKey, SymbolRecord, TagRecord,
};
use crate::diff::CachedFile;
use crate::error::{Result, StoreError};
use crate::facts::FileFacts;

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// The persisted graph store: one embedded SQLite file per repository root.
///
/// One writer at a time; readers proceed concurrently under WAL. A writer
/// blocked beyond the busy timeout gets a retryable [`StoreError::Contention`]
/// rather than waiting indefinitely.
#[derive(Clone)]
pub struct GraphStore {
    pool: ConnectionPool,
    db_path: PathBuf,
}

impl GraphStore {
    /// Open (or create) the store and bring its schema up to date.
    /// A migration failure is fatal; the store is unusable below the
    /// expected version.
    pub fn open(db_path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        info!("Opening graph store at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(&db_path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA synchronous = NORMAL;",
            )
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        {
            let mut conn = pool.get().map_err(StoreError::Pool)?;
            schema::migrate(&mut conn)?;
        }

        Ok(Self { pool, db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(StoreError::Pool)
    }

    // ---- file lifecycle ----

    /// Apply an added/modified file: delete every dependent row for the path,
    /// then insert the fresh extraction, all in one transaction. Symbol ids
    /// are renumbered on every change; only the structural key is stable.
    pub fn apply_file_change(&self, file: &FileRecord, facts: &FileFacts) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        debug!("Applying extraction for {}", file.path);

        // Child rows go first so incoming refs keep their to_path; deleting
        // symbols nulls to_symbol_id on incoming edges, which is correct
        // because the ids are about to be re-assigned.
        for table in ["refs", "ref_state", "imports", "headings", "code_blocks", "symbols"] {
            tx.execute(&format!("DELETE FROM {table} WHERE path = ?1"), [&file.path])?;
        }

        tx.execute(
            "INSERT INTO files (path, mtime, size, content_hash, language, line_count,
                                extractor_version, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(path) DO UPDATE SET
                mtime = excluded.mtime,
                size = excluded.size,
                content_hash = excluded.content_hash,
                language = excluded.language,
                line_count = excluded.line_count,
                extractor_version = excluded.extractor_version,
                updated_at = excluded.updated_at",
            params![
                file.path,
                file.mtime,
                file.size,
                file.content_hash,
                file.language,
                file.line_count,
                file.extractor_version,
                file.updated_at,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO symbols (path, name, kind, signature, start_line, end_line,
                                      exported, is_default, is_async, is_static, is_abstract,
                                      parent_name, doc_comment)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for sym in &facts.symbols {
                stmt.execute(params![
                    file.path,
                    sym.name,
                    sym.kind.as_str(),
                    sym.signature,
                    sym.start_line,
                    sym.end_line,
                    sym.exported,
                    sym.is_default,
                    sym.is_async,
                    sym.is_static,
                    sym.is_abstract,
                    sym.parent_name,
                    sym.doc_comment,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO imports (path, specifier, resolved_path, is_external, is_builtin,
                                      package_name, resolution_method, unresolved_reason, line,
                                      col, is_reexport)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for imp in &facts.imports {
                stmt.execute(params![
                    file.path,
                    imp.specifier,
                    imp.resolved_path,
                    imp.is_external,
                    imp.is_builtin,
                    imp.package_name,
                    imp.resolution_method,
                    imp.unresolved_reason,
                    imp.line,
                    imp.col,
                    imp.is_reexport,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO headings (path, level, text, line) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for heading in &facts.headings {
                stmt.execute(params![file.path, heading.level, heading.text, heading.line])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO code_blocks (path, language, start_line, end_line)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for block in &facts.code_blocks {
                stmt.execute(params![
                    file.path,
                    block.language,
                    block.start_line,
                    block.end_line
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Touch: stat metadata changed but content did not. Updates only the
    /// file row's stat columns; symbols and references stay untouched.
    pub fn apply_touch(&self, path: &str, mtime: i64, size: i64, updated_at: i64) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE files SET mtime = ?2, size = ?3, updated_at = ?4 WHERE path = ?1",
            params![path, mtime, size, updated_at],
        )?;
        Ok(())
    }

    /// Remove a file; cascade deletes its symbols, imports, refs, ref-state,
    /// headings and code blocks, and nulls the to-side of incoming edges.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        let conn = self.get_conn()?;
        debug!("Deleting file {}", path);
        conn.execute("DELETE FROM files WHERE path = ?1", [path])?;
        Ok(())
    }

    // ---- file queries ----

    pub fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        let conn = self.get_conn()?;
        let file = conn
            .query_row(
                "SELECT path, mtime, size, content_hash, language, line_count,
                        extractor_version, updated_at
                 FROM files WHERE path = ?1",
                [path],
                row_to_file,
            )
            .optional()?;
        Ok(file)
    }

    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT path, mtime, size, content_hash, language, line_count,
                    extractor_version, updated_at
             FROM files ORDER BY path",
        )?;
        let files = stmt
            .query_map([], row_to_file)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Cached stat map consumed by the change detector.
    pub fn cached_files(&self) -> Result<HashMap<String, CachedFile>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT path, mtime, size, content_hash FROM files")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                CachedFile {
                    mtime: row.get(1)?,
                    size: row.get(2)?,
                    content_hash: row.get(3)?,
                },
            ))
        })?;
        let mut map = HashMap::new();
        for row in rows {
            let (path, cached) = row?;
            map.insert(path, cached);
        }
        Ok(map)
    }

    // ---- symbols ----

    pub fn symbols_for_file(&self, path: &str) -> Result<Vec<SymbolRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOL_COLS} FROM symbols WHERE path = ?1 ORDER BY start_line, id"
        ))?;
        let symbols = stmt
            .query_map([path], row_to_symbol)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(symbols)
    }

    /// Re-map a symbol through its structural key, independent of row id.
    pub fn find_symbol_by_key(&self, path: &str, key: &SymbolKey) -> Result<Option<SymbolRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYMBOL_COLS} FROM symbols
             WHERE path = ?1 AND kind = ?2 AND name = ?3
               AND parent_name IS ?4 AND start_line = ?5"
        ))?;
        let symbol = stmt
            .query_row(
                params![path, key.kind.as_str(), key.name, key.parent_name, key.start_line],
                row_to_symbol,
            )
            .optional()?;
        Ok(symbol)
    }

    pub fn find_symbols_by_name(&self, name: &str, kind: Option<SymbolKind>) -> Result<Vec<SymbolRecord>> {
        let conn = self.get_conn()?;
        let symbols = if let Some(kind) = kind {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SYMBOL_COLS} FROM symbols WHERE name = ?1 AND kind = ?2 ORDER BY path, start_line"
            ))?;
            let rows = stmt
                .query_map(params![name, kind.as_str()], row_to_symbol)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SYMBOL_COLS} FROM symbols WHERE name = ?1 ORDER BY path, start_line"
            ))?;
            let rows = stmt
                .query_map([name], row_to_symbol)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        Ok(symbols)
    }

    pub fn get_symbol(&self, id: i64) -> Result<Option<SymbolRecord>> {
        let conn = self.get_conn()?;
        let symbol = conn
            .query_row(
                &format!("SELECT {SYMBOL_COLS} FROM symbols WHERE id = ?1"),
                [id],
                row_to_symbol,
            )
            .optional()?;
        Ok(symbol)
    }

    // ---- imports ----

    pub fn imports_for_file(&self, path: &str) -> Result<Vec<ImportRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {IMPORT_COLS} FROM imports WHERE path = ?1 ORDER BY line"
        ))?;
        let imports = stmt
            .query_map([path], row_to_import)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(imports)
    }

    /// Files that directly import `path` (reverse dependency edge).
    pub fn dependents_of(&self, path: &str) -> Result<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT path FROM imports WHERE resolved_path = ?1 ORDER BY path",
        )?;
        let paths = stmt
            .query_map([path], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths)
    }

    // ---- references + ref-state ----

    /// One invalidation step for one file, in one transaction: drop its
    /// reference rows and ref-state, insert the freshly-resolved edges, then
    /// record the new fingerprint. A crash mid-step rolls back to the prior
    /// consistent state.
    pub fn recompute_refs(&self, path: &str, refs: &[RefRecord], fingerprint: &str) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM refs WHERE path = ?1", [path])?;
        tx.execute("DELETE FROM ref_state WHERE path = ?1", [path])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO refs (path, from_symbol_name, from_symbol_kind, line, col, len,
                                   kind, to_path, to_symbol_id, to_symbol_name, to_symbol_kind,
                                   to_symbol_parent, unresolved_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for r in refs {
                stmt.execute(params![
                    path,
                    r.from_symbol_name,
                    r.from_symbol_kind.map(|k| k.as_str()),
                    r.line,
                    r.col,
                    r.len,
                    r.kind.as_str(),
                    r.to_path,
                    r.to_symbol_id,
                    r.to_symbol_name,
                    r.to_symbol_kind.map(|k| k.as_str()),
                    r.to_symbol_parent,
                    r.unresolved_reason,
                ])?;
            }
        }

        tx.execute(
            "INSERT INTO ref_state (path, fingerprint) VALUES (?1, ?2)",
            params![path, fingerprint],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Drop a file's reference rows and fingerprint without writing new ones.
    /// Used when extraction fails mid-pass: the missing fingerprint guarantees
    /// a retry on the next run.
    pub fn clear_refs(&self, path: &str) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM refs WHERE path = ?1", [path])?;
        tx.execute("DELETE FROM ref_state WHERE path = ?1", [path])?;
        tx.commit()?;
        Ok(())
    }

    pub fn ref_fingerprint(&self, path: &str) -> Result<Option<String>> {
        let conn = self.get_conn()?;
        let fp = conn
            .query_row("SELECT fingerprint FROM ref_state WHERE path = ?1", [path], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(fp)
    }

    pub fn refs_for_file(&self, path: &str) -> Result<Vec<RefRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REF_COLS} FROM refs WHERE path = ?1 ORDER BY line, col"
        ))?;
        let refs = stmt
            .query_map([path], row_to_ref)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(refs)
    }

    /// Incoming edges for a target named by path + symbol name, optionally
    /// filtered by kind, capped at `limit`.
    pub fn incoming_refs(
        &self,
        to_path: &str,
        to_symbol_name: &str,
        kinds: Option<&[RefKind]>,
        limit: usize,
    ) -> Result<Vec<RefRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {REF_COLS} FROM refs
             WHERE to_path = ?1 AND to_symbol_name = ?2{}
             ORDER BY path, line LIMIT ?3",
            kind_filter(kinds)
        );
        let mut stmt = conn.prepare(&sql)?;
        let refs = stmt
            .query_map(params![to_path, to_symbol_name, limit as i64], row_to_ref)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(refs)
    }

    /// Outgoing edges from a file, optionally restricted to one enclosing
    /// symbol and/or a kind set, capped at `limit`.
    pub fn outgoing_refs(
        &self,
        path: &str,
        from_symbol: Option<&str>,
        kinds: Option<&[RefKind]>,
        limit: usize,
    ) -> Result<Vec<RefRecord>> {
        let conn = self.get_conn()?;
        let refs = if let Some(from) = from_symbol {
            let sql = format!(
                "SELECT {REF_COLS} FROM refs
                 WHERE path = ?1 AND from_symbol_name = ?2{}
                 ORDER BY line, col LIMIT ?3",
                kind_filter(kinds)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![path, from, limit as i64], row_to_ref)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        } else {
            let sql = format!(
                "SELECT {REF_COLS} FROM refs WHERE path = ?1{}
                 ORDER BY line, col LIMIT ?2",
                kind_filter(kinds)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![path, limit as i64], row_to_ref)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        Ok(refs)
    }

    // ---- headings / code blocks ----

    pub fn headings_for_file(&self, path: &str) -> Result<Vec<HeadingRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT path, level, text, line FROM headings WHERE path = ?1 ORDER BY line",
        )?;
        let headings = stmt
            .query_map([path], |row| {
                Ok(HeadingRecord {
                    path: row.get(0)?,
                    level: row.get(1)?,
                    text: row.get(2)?,
                    line: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(headings)
    }

    pub fn code_blocks_for_file(&self, path: &str) -> Result<Vec<CodeBlockRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT path, language, start_line, end_line FROM code_blocks
             WHERE path = ?1 ORDER BY start_line",
        )?;
        let blocks = stmt
            .query_map([path], |row| {
                Ok(CodeBlockRecord {
                    path: row.get(0)?,
                    language: row.get(1)?,
                    start_line: row.get(2)?,
                    end_line: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(blocks)
    }

    // ---- annotations ----

    pub fn insert_annotation(&self, ann: &AnnotationRecord) -> Result<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO annotations (path, symbol_name, symbol_kind, parent_name, signature,
                                      content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                ann.path,
                ann.symbol_name,
                ann.symbol_kind.map(|k| k.as_str()),
                ann.parent_name,
                ann.signature,
                ann.content,
                ann.created_at,
                ann.updated_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_annotation_content(&self, id: i64, content: &str, updated_at: i64) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE annotations SET content = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, content, updated_at],
        )?;
        Ok(())
    }

    pub fn annotations_for_path(&self, path: &str) -> Result<Vec<AnnotationRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ANNOTATION_COLS} FROM annotations WHERE path = ?1 ORDER BY id"
        ))?;
        let anns = stmt
            .query_map([path], row_to_annotation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(anns)
    }

    pub fn all_annotations(&self) -> Result<Vec<AnnotationRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ANNOTATION_COLS} FROM annotations ORDER BY path, id"
        ))?;
        let anns = stmt
            .query_map([], row_to_annotation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(anns)
    }

    pub fn delete_annotation(&self, id: i64) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM annotations WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn add_tag(&self, annotation_id: i64, key: &str, value: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO annotation_tags (annotation_id, key, value) VALUES (?1, ?2, ?3)",
            params![annotation_id, key, value],
        )?;
        Ok(())
    }

    pub fn tags_for(&self, annotation_id: i64) -> Result<Vec<TagRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT annotation_id, key, value FROM annotation_tags
             WHERE annotation_id = ?1 ORDER BY key, value",
        )?;
        let tags = stmt
            .query_map([annotation_id], |row| {
                Ok(TagRecord {
                    annotation_id: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    // ---- maintenance ----

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.get_conn()?;
        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            total_files: count("files")?,
            total_symbols: count("symbols")?,
            total_imports: count("imports")?,
            total_refs: count("refs")?,
            total_annotations: count("annotations")?,
        })
    }

    pub fn files_by_language(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT language, COUNT(*) FROM files GROUP BY language ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as usize)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn refs_by_kind(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT kind, COUNT(*) FROM refs GROUP BY kind ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as usize)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Drop index data. Annotations survive unless `include_annotations` —
    /// the default clear never touches user-authored metadata.
    pub fn clear(&self, include_annotations: bool) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for table in INDEX_TABLES {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        if include_annotations {
            for table in ANNOTATION_TABLES {
                tx.execute(&format!("DELETE FROM {table}"), [])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

const SYMBOL_COLS: &str = "id, path, name, kind, signature, start_line, end_line, exported,
    is_default, is_async, is_static, is_abstract, parent_name, doc_comment";

const IMPORT_COLS: &str = "id, path, specifier, resolved_path, is_external, is_builtin,
    package_name, resolution_method, unresolved_reason, line, col, is_reexport";

const REF_COLS: &str = "id, path, from_symbol_name, from_symbol_kind, line, col, len, kind,
    to_path, to_symbol_id, to_symbol_name, to_symbol_kind, to_symbol_parent, unresolved_reason";

const ANNOTATION_COLS: &str =
    "id, path, symbol_name, symbol_kind, parent_name, signature, content, created_at, updated_at";

fn kind_filter(kinds: Option<&[RefKind]>) -> String {
    match kinds {
        Some(kinds) if !kinds.is_empty() => {
            let list = kinds
                .iter()
                .map(|k| format!("'{}'", k.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            format!(" AND kind IN ({list})")
        }
        _ => String::new(),
    }
}

fn parse_kind(row: &Row, idx: usize) -> rusqlite::Result<Option<SymbolKind>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        SymbolKind::parse(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

fn row_to_file(row: &Row) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        path: row.get(0)?,
        mtime: row.get(1)?,
        size: row.get(2)?,
        content_hash: row.get(3)?,
        language: row.get(4)?,
        line_count: row.get(5)?,
        extractor_version: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_symbol(row: &Row) -> rusqlite::Result<SymbolRecord> {
    let kind_str: String = row.get(3)?;
    let kind = SymbolKind::parse(&kind_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(SymbolRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        name: row.get(2)?,
        kind,
        signature: row.get(4)?,
        start_line: row.get(5)?,
        end_line: row.get(6)?,
        exported: row.get(7)?,
        is_default: row.get(8)?,
        is_async: row.get(9)?,
        is_static: row.get(10)?,
        is_abstract: row.get(11)?,
        parent_name: row.get(12)?,
        doc_comment: row.get(13)?,
    })
}

fn row_to_import(row: &Row) -> rusqlite::Result<ImportRecord> {
    Ok(ImportRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        specifier: row.get(2)?,
        resolved_path: row.get(3)?,
        is_external: row.get(4)?,
        is_builtin: row.get(5)?,
        package_name: row.get(6)?,
        resolution_method: row.get(7)?,
        unresolved_reason: row.get(8)?,
        line: row.get(9)?,
        col: row.get(10)?,
        is_reexport: row.get(11)?,
    })
}

fn row_to_ref(row: &Row) -> rusqlite::Result<RefRecord> {
    let kind_str: String = row.get(7)?;
    let kind = RefKind::parse(&kind_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(RefRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        from_symbol_name: row.get(2)?,
        from_symbol_kind: parse_kind(row, 3)?,
        line: row.get(4)?,
        col: row.get(5)?,
        len: row.get(6)?,
        kind,
        to_path: row.get(8)?,
        to_symbol_id: row.get(9)?,
        to_symbol_name: row.get(10)?,
        to_symbol_kind: parse_kind(row, 11)?,
        to_symbol_parent: row.get(12)?,
        unresolved_reason: row.get(13)?,
    })
}

fn row_to_annotation(row: &Row) -> rusqlite::Result<AnnotationRecord> {
    Ok(AnnotationRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        symbol_name: row.get(2)?,
        symbol_kind: parse_kind(row, 3)?,
        parent_name: row.get(4)?,
        signature: row.get(5)?,
        content: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Current timestamp in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
