// Invalidation: decide which files' reference data must be recomputed and
// recompute it transactionally.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::Result;
use crate::facts::{FileFacts, PassContext};
use crate::resolve::resolve_file_refs;
use crate::store::{GraphStore, RefMode};

/// Opaque reference fingerprint: `content_hash ++ ":" ++ mode ++ ":" ++
/// (config_hash | "")`. Only ever compared for equality.
pub fn fingerprint(content_hash: &str, mode: RefMode, config_hash: Option<&str>) -> String {
    format!("{}:{}:{}", content_hash, mode.as_str(), config_hash.unwrap_or(""))
}

/// Per-file staleness relative to its stored fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    /// Content hash changed.
    StaleDirect,
    /// Content unchanged but the project resolution config's hash changed.
    StaleConfig,
    /// Reference extraction mode changed since last run.
    StaleMode,
}

/// Compare a stored fingerprint against the current pass inputs.
pub fn staleness(
    stored: Option<&str>,
    content_hash: &str,
    mode: RefMode,
    config_hash: Option<&str>,
) -> Staleness {
    let Some(stored) = stored else {
        return Staleness::StaleDirect;
    };
    let mut parts = stored.splitn(3, ':');
    let (Some(old_hash), Some(old_mode), Some(old_config)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Staleness::StaleDirect;
    };

    if old_hash != content_hash {
        Staleness::StaleDirect
    } else if old_mode != mode.as_str() {
        Staleness::StaleMode
    } else if old_config != config_hash.unwrap_or("") {
        Staleness::StaleConfig
    } else {
        Staleness::Fresh
    }
}

/// The files whose references this pass will recompute.
#[derive(Debug, Clone, Default)]
pub struct InvalidationPlan {
    /// Files whose own fingerprint no longer matches.
    pub direct: Vec<String>,
    /// Direct set plus the transitive closure of their dependents, sorted.
    pub affected: Vec<String>,
}

/// Decide the affected set for one pass.
///
/// `deleted` paths seed the dependents closure (a consumer of a now-deleted
/// file must surface its edges as unresolved) but are never recompute targets
/// themselves. A dependency's changed shape can invalidate edges recorded in
/// files whose own content is untouched, hence the closure.
pub fn plan(
    store: &GraphStore,
    mode: RefMode,
    config_hash: Option<&str>,
    deleted: &[String],
    force_refresh: bool,
) -> Result<InvalidationPlan> {
    let files = store.list_files()?;

    let mut direct = Vec::new();
    for file in &files {
        let state = if force_refresh {
            Staleness::StaleDirect
        } else {
            let stored = store.ref_fingerprint(&file.path)?;
            staleness(stored.as_deref(), &file.content_hash, mode, config_hash)
        };
        if state != Staleness::Fresh {
            debug!("{} is {:?}", file.path, state);
            direct.push(file.path.clone());
        }
    }

    // closure(direct ∪ deleted, dependents) to fixpoint
    let mut affected: BTreeSet<String> = direct.iter().cloned().collect();
    let mut worklist: Vec<String> = direct.iter().chain(deleted).cloned().collect();
    let mut visited: BTreeSet<String> = worklist.iter().cloned().collect();

    while let Some(path) = worklist.pop() {
        for dependent in store.dependents_of(&path)? {
            if visited.insert(dependent.clone()) {
                affected.insert(dependent.clone());
                worklist.push(dependent);
            }
        }
    }

    // deleted files are seeds, not targets; their rows are already gone
    for path in deleted {
        affected.remove(path);
    }

    Ok(InvalidationPlan {
        direct,
        affected: affected.into_iter().collect(),
    })
}

/// Result of executing a plan.
#[derive(Debug, Clone, Default)]
pub struct InvalidationOutcome {
    pub recomputed: Vec<String>,
    /// Path and reason for each file whose extraction failed. Their
    /// references are left empty and their fingerprint unwritten, so they
    /// retry next pass.
    pub failed: Vec<(String, String)>,
}

/// Recompute references for every file in the plan, one transaction per file.
/// A single file's extraction failure never aborts the batch.
pub fn execute<F>(
    store: &GraphStore,
    ctx: &mut PassContext,
    plan: &InvalidationPlan,
    mut facts_for: F,
) -> Result<InvalidationOutcome>
where
    F: FnMut(&mut PassContext, &str) -> anyhow::Result<FileFacts>,
{
    let mut outcome = InvalidationOutcome::default();

    for path in &plan.affected {
        let Some(file) = store.get_file(path)? else {
            continue;
        };

        let facts = match facts_for(ctx, path) {
            Ok(facts) => facts,
            Err(e) => {
                warn!("extraction failed for {}: {}", path, e);
                store.clear_refs(path)?;
                outcome.failed.push((path.clone(), e.to_string()));
                continue;
            }
        };

        let refs = resolve_file_refs(store, ctx, path, &facts)?;
        let fp = fingerprint(&file.content_hash, ctx.mode, ctx.config_hash.as_deref());
        store.recompute_refs(path, &refs, &fp)?;
        outcome.recomputed.push(path.clone());
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{RawImport, RawRef, RawRefForm, RawTarget};
    use crate::store::FileRecord;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn fingerprint_format_is_stable() {
        assert_eq!(
            fingerprint("abc", RefMode::Structural, Some("cfg")),
            "abc:structural:cfg"
        );
        assert_eq!(fingerprint("abc", RefMode::Full, None), "abc:full:");
    }

    #[test]
    fn staleness_distinguishes_causes() {
        let fp = fingerprint("h1", RefMode::Structural, Some("c1"));

        assert_eq!(
            staleness(Some(&fp), "h1", RefMode::Structural, Some("c1")),
            Staleness::Fresh
        );
        assert_eq!(
            staleness(Some(&fp), "h2", RefMode::Structural, Some("c1")),
            Staleness::StaleDirect
        );
        assert_eq!(
            staleness(Some(&fp), "h1", RefMode::Full, Some("c1")),
            Staleness::StaleMode
        );
        assert_eq!(
            staleness(Some(&fp), "h1", RefMode::Structural, Some("c2")),
            Staleness::StaleConfig
        );
        assert_eq!(
            staleness(None, "h1", RefMode::Structural, None),
            Staleness::StaleDirect
        );
    }

    fn store() -> (tempfile::TempDir, GraphStore) {
        let dir = tempdir().unwrap();
        let store =
            GraphStore::open(dir.path().join("t.db"), Duration::from_millis(100)).unwrap();
        (dir, store)
    }

    fn file(path: &str, hash: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            mtime: 1,
            size: 1,
            content_hash: hash.to_string(),
            language: "typescript".to_string(),
            line_count: 1,
            extractor_version: 1,
            updated_at: 0,
        }
    }

    fn imports(target: &str) -> FileFacts {
        FileFacts {
            imports: vec![RawImport {
                specifier: format!("./{}", target.trim_end_matches(".ts")),
                line: 1,
                col: 0,
                resolved_path: Some(target.to_string()),
                is_external: false,
                is_builtin: false,
                package_name: None,
                resolution_method: Some("relative".to_string()),
                unresolved_reason: None,
                is_reexport: false,
            }],
            refs: vec![RawRef {
                line: 1,
                col: 0,
                len: 1,
                form: RawRefForm::Import,
                target: RawTarget {
                    name: None,
                    path: Some(target.to_string()),
                    ..Default::default()
                },
            }],
            ..Default::default()
        }
    }

    /// chain c imports b imports a; a change to a invalidates all three
    #[test]
    fn closure_reaches_transitive_dependents() {
        let (_dir, store) = store();
        store.apply_file_change(&file("a.ts", "ha"), &FileFacts::default()).unwrap();
        store.apply_file_change(&file("b.ts", "hb"), &imports("a.ts")).unwrap();
        store.apply_file_change(&file("c.ts", "hc"), &imports("b.ts")).unwrap();

        // mark b and c fresh so only a is directly stale
        for path in ["b.ts", "c.ts"] {
            let f = store.get_file(path).unwrap().unwrap();
            let fp = fingerprint(&f.content_hash, RefMode::Structural, None);
            store.recompute_refs(path, &[], &fp).unwrap();
        }

        let plan = plan(&store, RefMode::Structural, None, &[], false).unwrap();
        assert_eq!(plan.direct, vec!["a.ts".to_string()]);
        assert_eq!(
            plan.affected,
            vec!["a.ts".to_string(), "b.ts".to_string(), "c.ts".to_string()]
        );
    }

    #[test]
    fn deleted_files_seed_but_are_not_targets() {
        let (_dir, store) = store();
        store.apply_file_change(&file("a.ts", "ha"), &FileFacts::default()).unwrap();
        store.apply_file_change(&file("b.ts", "hb"), &imports("a.ts")).unwrap();

        // both fresh
        for path in ["a.ts", "b.ts"] {
            let f = store.get_file(path).unwrap().unwrap();
            let fp = fingerprint(&f.content_hash, RefMode::Structural, None);
            store.recompute_refs(path, &[], &fp).unwrap();
        }

        store.delete_file("a.ts").unwrap();
        let plan =
            plan(&store, RefMode::Structural, None, &["a.ts".to_string()], false).unwrap();

        assert!(plan.direct.is_empty());
        assert_eq!(plan.affected, vec!["b.ts".to_string()]);
    }

    #[test]
    fn failed_extraction_is_isolated_and_retried() {
        let (_dir, store) = store();
        store.apply_file_change(&file("a.ts", "ha"), &FileFacts::default()).unwrap();
        store.apply_file_change(&file("b.ts", "hb"), &imports("a.ts")).unwrap();

        let mut ctx = PassContext::new(RefMode::Structural, None);
        let plan = plan(&store, RefMode::Structural, None, &[], false).unwrap();
        assert_eq!(plan.affected.len(), 2);

        let outcome = execute(&store, &mut ctx, &plan, |_, path| {
            if path == "b.ts" {
                anyhow::bail!("parse error")
            }
            Ok(FileFacts::default())
        })
        .unwrap();

        assert_eq!(outcome.recomputed, vec!["a.ts".to_string()]);
        assert_eq!(outcome.failed.len(), 1);
        assert!(store.ref_fingerprint("a.ts").unwrap().is_some());
        // no fingerprint -> b retries next pass
        assert!(store.ref_fingerprint("b.ts").unwrap().is_none());
        assert!(store.refs_for_file("b.ts").unwrap().is_empty());
    }

    #[test]
    fn second_pass_with_no_changes_is_fresh() {
        let (_dir, store) = store();
        store.apply_file_change(&file("a.ts", "ha"), &FileFacts::default()).unwrap();

        let mut ctx = PassContext::new(RefMode::Structural, None);
        let p1 = plan(&store, RefMode::Structural, None, &[], false).unwrap();
        execute(&store, &mut ctx, &p1, |_, _| Ok(FileFacts::default())).unwrap();

        let p2 = plan(&store, RefMode::Structural, None, &[], false).unwrap();
        assert!(p2.affected.is_empty());

        // mode flip invalidates without any content change
        let p3 = plan(&store, RefMode::Full, None, &[], false).unwrap();
        assert_eq!(p3.affected, vec!["a.ts".to_string()]);
    }
}
