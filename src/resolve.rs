// Reference resolution: raw per-file reference facts become durable edges.

use tracing::trace;

use crate::error::Result;
use crate::facts::{FileFacts, PassContext, RawRef, RawRefForm, RawSymbol};
use crate::store::{GraphStore, RefKind, RefMode, RefRecord, SymbolKey, MODULE_SENTINEL};

/// Resolve one file's raw reference facts into reference rows.
///
/// Every produced row carries a non-empty target name (module-level targets
/// use the `(module)` sentinel) and, when the target declaration was located
/// in an indexed file, both the symbol id and the structural fallback fields.
/// An unresolvable target is recorded as data, never an error.
pub fn resolve_file_refs(
    store: &GraphStore,
    ctx: &PassContext,
    path: &str,
    facts: &FileFacts,
) -> Result<Vec<RefRecord>> {
    let mut out = Vec::with_capacity(facts.refs.len());

    for raw in &facts.refs {
        let Some(kind) = classify(raw, ctx.mode) else {
            continue;
        };

        let enclosing = enclosing_symbol(&facts.symbols, raw.line);

        // The target file must currently be in the store; otherwise the edge
        // degrades to the structural fallback with identity unresolved.
        let mut to_path = None;
        let mut to_symbol_id = None;
        let mut unresolved_reason = raw.target.unresolved_reason.clone();

        if let Some(target_path) = raw.target.path.as_deref() {
            if store.get_file(target_path)?.is_some() {
                to_path = Some(target_path.to_string());
                to_symbol_id = lookup_target_symbol(store, target_path, raw)?;
            } else if unresolved_reason.is_none() {
                unresolved_reason = Some(format!("target file not indexed: {target_path}"));
            }
        }

        let record = RefRecord {
            id: 0,
            path: path.to_string(),
            from_symbol_name: enclosing.map(|s| s.name.clone()),
            from_symbol_kind: enclosing.map(|s| s.kind),
            line: raw.line,
            col: raw.col,
            len: raw.len,
            kind,
            to_path,
            to_symbol_id,
            to_symbol_name: raw
                .target
                .name
                .clone()
                .unwrap_or_else(|| MODULE_SENTINEL.to_string()),
            to_symbol_kind: raw.target.kind,
            to_symbol_parent: raw.target.parent_name.clone(),
            unresolved_reason,
        };
        trace!(
            "ref {}:{} {} -> {}",
            path,
            record.line,
            record.kind.as_str(),
            record.to_symbol_name
        );
        out.push(record);
    }

    Ok(out)
}

/// Classify a raw reference's syntactic form into exactly one kind, or drop
/// it. Structural forms are captured unconditionally; identifier accesses are
/// only captured in full mode, and only when the site is not already covered
/// by another kind (declaration names, import clauses, call callees, member
/// names, type positions).
fn classify(raw: &RawRef, mode: RefMode) -> Option<RefKind> {
    match &raw.form {
        RawRefForm::Import => Some(RefKind::Import),
        RawRefForm::Reexport => Some(RefKind::Reexport),
        RawRefForm::Call => Some(RefKind::Call),
        RawRefForm::Instantiate => Some(RefKind::Instantiate),
        RawRefForm::TypeUse => Some(RefKind::Type),
        RawRefForm::Extends => Some(RefKind::Extends),
        RawRefForm::Implements => Some(RefKind::Implements),
        RawRefForm::Ident(access) => {
            if mode != RefMode::Full {
                return None;
            }
            if access.in_declaration
                || access.in_import
                || access.is_callee
                || access.is_member_name
                || access.in_type_position
            {
                return None;
            }
            // Assignment targets (including compound assignment and inc/dec)
            // are writes; everything else eligible is a read.
            Some(if access.write {
                RefKind::Write
            } else {
                RefKind::Read
            })
        }
    }
}

/// Walk outward to the nearest enclosing declaration of a site: the container
/// symbol whose span covers the line, innermost (latest start) first. None
/// means the reference is module-level.
fn enclosing_symbol(symbols: &[RawSymbol], line: i64) -> Option<&RawSymbol> {
    symbols
        .iter()
        .filter(|s| s.kind.is_container() && s.start_line <= line && line <= s.end_line)
        .max_by_key(|s| (s.start_line, -(s.end_line - s.start_line)))
}

fn lookup_target_symbol(
    store: &GraphStore,
    target_path: &str,
    raw: &RawRef,
) -> Result<Option<i64>> {
    let (Some(name), Some(kind), Some(start_line)) = (
        raw.target.name.as_deref(),
        raw.target.kind,
        raw.target.start_line,
    ) else {
        return Ok(None);
    };
    let key = SymbolKey {
        kind,
        name: name.to_string(),
        parent_name: raw.target.parent_name.clone(),
        start_line,
    };
    Ok(store.find_symbol_by_key(target_path, &key)?.map(|s| s.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{IdentAccess, RawTarget};
    use crate::store::{FileRecord, SymbolKind};
    use std::time::Duration;
    use tempfile::tempdir;

    fn store_with_target(dir: &tempfile::TempDir) -> GraphStore {
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
        store
    }

    fn call_ref(line: i64) -> RawRef {
        RawRef {
            line,
            col: 4,
            len: 3,
            form: RawRefForm::Call,
            target: RawTarget {
                name: Some("foo".to_string()),
                path: Some("a.ts".to_string()),
                kind: Some(SymbolKind::Function),
                parent_name: None,
                start_line: Some(1),
                unresolved_reason: None,
            },
        }
    }

    fn container(name: &str, start: i64, end: i64) -> RawSymbol {
        RawSymbol {
            name: name.to_string(),
            kind: SymbolKind::Function,
            start_line: start,
            end_line: end,
            ..Default::default()
        }
    }

    #[test]
    fn resolves_symbol_id_via_structural_key() {
        let dir = tempdir().unwrap();
        let store = store_with_target(&dir);
        let ctx = PassContext::new(RefMode::Structural, None);

        let facts = FileFacts {
            symbols: vec![container("caller", 1, 5)],
            refs: vec![call_ref(2)],
            ..Default::default()
        };
        let refs = resolve_file_refs(&store, &ctx, "b.ts", &facts).unwrap();

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, RefKind::Call);
        assert_eq!(refs[0].to_path.as_deref(), Some("a.ts"));
        assert!(refs[0].to_symbol_id.is_some());
        assert_eq!(refs[0].from_symbol_name.as_deref(), Some("caller"));
    }

    #[test]
    fn unknown_target_file_degrades_to_fallback() {
        let dir = tempdir().unwrap();
        let store = store_with_target(&dir);
        let ctx = PassContext::new(RefMode::Structural, None);

        let mut raw = call_ref(2);
        raw.target.path = Some("gone.ts".to_string());
        let facts = FileFacts {
            refs: vec![raw],
            ..Default::default()
        };
        let refs = resolve_file_refs(&store, &ctx, "b.ts", &facts).unwrap();

        assert_eq!(refs[0].to_path, None);
        assert_eq!(refs[0].to_symbol_id, None);
        // still queryable by name
        assert_eq!(refs[0].to_symbol_name, "foo");
        assert!(refs[0].unresolved_reason.is_some());
    }

    #[test]
    fn module_level_refs_use_the_sentinel() {
        let dir = tempdir().unwrap();
        let store = store_with_target(&dir);
        let ctx = PassContext::new(RefMode::Structural, None);

        let facts = FileFacts {
            refs: vec![RawRef {
                line: 1,
                col: 0,
                len: 10,
                form: RawRefForm::Import,
                target: RawTarget {
                    name: None,
                    path: Some("a.ts".to_string()),
                    ..Default::default()
                },
            }],
            ..Default::default()
        };
        let refs = resolve_file_refs(&store, &ctx, "b.ts", &facts).unwrap();

        assert_eq!(refs[0].to_symbol_name, MODULE_SENTINEL);
        assert_eq!(refs[0].from_symbol_name, None);
    }

    #[test]
    fn ident_refs_gated_by_mode_and_context() {
        let mk = |access: IdentAccess| RawRef {
            line: 1,
            col: 0,
            len: 1,
            form: RawRefForm::Ident(access),
            target: RawTarget {
                name: Some("x".to_string()),
                ..Default::default()
            },
        };

        // structural mode drops idents entirely
        assert_eq!(classify(&mk(IdentAccess::default()), RefMode::Structural), None);

        // full mode: plain access is a read, assignment target a write
        assert_eq!(
            classify(&mk(IdentAccess::default()), RefMode::Full),
            Some(RefKind::Read)
        );
        assert_eq!(
            classify(
                &mk(IdentAccess {
                    write: true,
                    ..Default::default()
                }),
                RefMode::Full
            ),
            Some(RefKind::Write)
        );

        // sites covered by other kinds never become read/write
        for access in [
            IdentAccess { in_declaration: true, ..Default::default() },
            IdentAccess { in_import: true, ..Default::default() },
            IdentAccess { is_callee: true, ..Default::default() },
            IdentAccess { is_member_name: true, ..Default::default() },
            IdentAccess { in_type_position: true, ..Default::default() },
        ] {
            assert_eq!(classify(&mk(access), RefMode::Full), None);
        }
    }

    #[test]
    fn enclosing_symbol_picks_innermost_container() {
        let symbols = vec![
            container("outer", 1, 20),
            container("inner", 5, 10),
            RawSymbol {
                name: "not_a_container".to_string(),
                kind: SymbolKind::Variable,
                start_line: 6,
                end_line: 6,
                ..Default::default()
            },
        ];
        assert_eq!(enclosing_symbol(&symbols, 7).map(|s| s.name.as_str()), Some("inner"));
        assert_eq!(enclosing_symbol(&symbols, 15).map(|s| s.name.as_str()), Some("outer"));
        assert_eq!(enclosing_symbol(&symbols, 25), None);
    }
}
