use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Current schema version. Bump together with a new arm in `apply_migration`.
pub const SCHEMA_VERSION: i32 = 3;

/// Bring the store up to [`SCHEMA_VERSION`].
///
/// Each pending migration runs inside its own transaction together with the
/// `schema_version` record, so an interrupted migration leaves the prior
/// version fully intact. A migration failure is fatal: the store must not be
/// used in a partially-migrated state.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    debug!("Current schema version: {}", current_version);

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying schema migration v{}", version);
        let tx = conn.transaction().map_err(StoreError::from)?;
        apply_migration(&tx, version).map_err(|e| StoreError::SchemaMigration {
            version,
            message: e.to_string(),
        })?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
            .map_err(|e| StoreError::SchemaMigration {
                version,
                message: e.to_string(),
            })?;
        tx.commit().map_err(|e| StoreError::SchemaMigration {
            version,
            message: e.to_string(),
        })?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> rusqlite::Result<()> {
    match version {
        1 => create_v1_schema(conn),
        2 => create_v2_annotations(conn),
        3 => add_v3_import_reexport(conn),
        _ => unreachable!("Unknown schema version: {}", version),
    }
}

/// v1: files, symbols, imports, refs, ref_state, headings, code_blocks.
///
/// Deleting a file cascades to every dependent row keyed by its path; the
/// to-side of a reference is instead nulled so edges to removed files never
/// dangle.
fn create_v1_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS files (
            path TEXT PRIMARY KEY,
            mtime INTEGER NOT NULL,
            size INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            language TEXT NOT NULL,
            line_count INTEGER NOT NULL DEFAULT 0,
            extractor_version INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS symbols (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            signature TEXT,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            exported INTEGER NOT NULL DEFAULT 0,
            is_default INTEGER NOT NULL DEFAULT 0,
            is_async INTEGER NOT NULL DEFAULT 0,
            is_static INTEGER NOT NULL DEFAULT 0,
            is_abstract INTEGER NOT NULL DEFAULT 0,
            parent_name TEXT,
            doc_comment TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_symbols_path ON symbols(path);
        CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
        CREATE INDEX IF NOT EXISTS idx_symbols_key
            ON symbols(path, kind, name, start_line);

        CREATE TABLE IF NOT EXISTS imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
            specifier TEXT NOT NULL,
            resolved_path TEXT,
            is_external INTEGER NOT NULL DEFAULT 0,
            is_builtin INTEGER NOT NULL DEFAULT 0,
            package_name TEXT,
            resolution_method TEXT,
            unresolved_reason TEXT,
            line INTEGER NOT NULL,
            col INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_imports_path ON imports(path);
        CREATE INDEX IF NOT EXISTS idx_imports_resolved ON imports(resolved_path);

        CREATE TABLE IF NOT EXISTS refs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
            from_symbol_name TEXT,
            from_symbol_kind TEXT,
            line INTEGER NOT NULL,
            col INTEGER NOT NULL,
            len INTEGER NOT NULL,
            kind TEXT NOT NULL,
            to_path TEXT REFERENCES files(path) ON DELETE SET NULL,
            to_symbol_id INTEGER REFERENCES symbols(id) ON DELETE SET NULL,
            to_symbol_name TEXT NOT NULL,
            to_symbol_kind TEXT,
            to_symbol_parent TEXT,
            unresolved_reason TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_refs_path ON refs(path);
        CREATE INDEX IF NOT EXISTS idx_refs_to_path ON refs(to_path);
        CREATE INDEX IF NOT EXISTS idx_refs_target ON refs(to_symbol_name, kind);
        CREATE INDEX IF NOT EXISTS idx_refs_to_symbol ON refs(to_symbol_id);

        CREATE TABLE IF NOT EXISTS ref_state (
            path TEXT PRIMARY KEY REFERENCES files(path) ON DELETE CASCADE,
            fingerprint TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS headings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
            level INTEGER NOT NULL,
            text TEXT NOT NULL,
            line INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_headings_path ON headings(path);

        CREATE TABLE IF NOT EXISTS code_blocks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
            language TEXT,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_code_blocks_path ON code_blocks(path);",
    )
}

/// v2: annotation tables. Deliberately no foreign key into `files`:
/// annotations outlive reindexing and only an explicit prune removes them.
fn create_v2_annotations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS annotations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL,
            symbol_name TEXT,
            symbol_kind TEXT,
            parent_name TEXT,
            signature TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_annotations_path ON annotations(path);

        CREATE TABLE IF NOT EXISTS annotation_tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            annotation_id INTEGER NOT NULL
                REFERENCES annotations(id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_annotation_tags_key
            ON annotation_tags(annotation_id, key);",
    )
}

/// v3: record `export ... from` forms on import rows, so re-export chains
/// are distinguishable from plain imports when walking dependencies.
fn add_v3_import_reexport(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("ALTER TABLE imports ADD COLUMN is_reexport INTEGER NOT NULL DEFAULT 0;")
}

/// Tables wiped by the default `clear` operation. Annotations are preserved
/// unless the caller explicitly asks for them too.
pub const INDEX_TABLES: &[&str] = &[
    "refs",
    "ref_state",
    "imports",
    "headings",
    "code_blocks",
    "symbols",
    "files",
];

pub const ANNOTATION_TABLES: &[&str] = &["annotation_tags", "annotations"];

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn
    }

    #[test]
    fn migrate_creates_all_tables() {
        let mut conn = open();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();

        for table in INDEX_TABLES.iter().chain(ANNOTATION_TABLES) {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn migrate_is_idempotent_and_ordered() {
        let mut conn = open();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let versions: Vec<i32> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();

        assert_eq!(versions, (1..=SCHEMA_VERSION).collect::<Vec<_>>());
    }

    #[test]
    fn deleting_a_file_cascades_and_nulls_targets() {
        let mut conn = open();
        migrate(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO files (path, mtime, size, content_hash, language, updated_at)
             VALUES ('a.ts', 0, 1, 'h1', 'typescript', 0),
                    ('b.ts', 0, 1, 'h2', 'typescript', 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO symbols (path, name, kind, start_line, end_line)
             VALUES ('a.ts', 'foo', 'function', 1, 3)",
            [],
        )
        .unwrap();
        let sym_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO refs (path, line, col, len, kind, to_path, to_symbol_id, to_symbol_name)
             VALUES ('b.ts', 2, 0, 3, 'call', 'a.ts', ?1, 'foo')",
            [sym_id],
        )
        .unwrap();

        conn.execute("DELETE FROM files WHERE path = 'a.ts'", []).unwrap();

        let symbols: i64 = conn
            .query_row("SELECT COUNT(*) FROM symbols WHERE path = 'a.ts'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(symbols, 0);

        // b's edge survives but its target identity is nulled, not dangling
        let (to_path, to_id, to_name): (Option<String>, Option<i64>, String) = conn
            .query_row(
                "SELECT to_path, to_symbol_id, to_symbol_name FROM refs WHERE path = 'b.ts'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(to_path, None);
        assert_eq!(to_id, None);
        assert_eq!(to_name, "foo");
    }
}
