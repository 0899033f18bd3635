// Graph traversals: dependency trees, cycle detection, call graphs and type
// hierarchies. All walks are depth-bounded and cycle-safe.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::error::Result;
use crate::store::{GraphStore, RefKind, SymbolKind};

/// Traversal direction: what a node depends on, or what depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Leaf/node classification in a dependency tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DepNodeKind {
    File,
    External,
    Builtin,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepNode {
    /// Repo-relative path for files; package/module name otherwise.
    pub name: String,
    pub kind: DepNodeKind,
    /// The node is already open on the current path; not expanded further.
    pub circular: bool,
    pub children: Vec<DepNode>,
}

/// A node in a call graph or type hierarchy.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolNode {
    pub id: Option<i64>,
    pub path: Option<String>,
    pub name: String,
    pub kind: Option<SymbolKind>,
    pub circular: bool,
    pub children: Vec<SymbolNode>,
}

/// Bounded walker over the stored graph.
pub struct GraphWalker<'a> {
    store: &'a GraphStore,
    max_depth: usize,
    max_items: usize,
}

const CALL_KINDS: &[RefKind] = &[RefKind::Call, RefKind::Instantiate];
const TYPE_KINDS: &[RefKind] = &[RefKind::Extends, RefKind::Implements];

impl<'a> GraphWalker<'a> {
    pub fn new(store: &'a GraphStore, max_depth: usize, max_items: usize) -> Self {
        Self {
            store,
            max_depth,
            max_items,
        }
    }

    /// Build a dependency tree rooted at `path`.
    ///
    /// Each recursion carries its own "currently open" path set, so diamonds
    /// re-converge and expand normally while genuine cycles are marked
    /// `circular` and cut. External and builtin edges are always leaves.
    pub fn dependency_tree(&self, path: &str, direction: Direction) -> Result<DepNode> {
        let mut open = Vec::new();
        self.build_dep_node(path, direction, 0, &mut open)
    }

    fn build_dep_node(
        &self,
        path: &str,
        direction: Direction,
        depth: usize,
        open: &mut Vec<String>,
    ) -> Result<DepNode> {
        if open.iter().any(|p| p == path) {
            return Ok(DepNode {
                name: path.to_string(),
                kind: DepNodeKind::File,
                circular: true,
                children: Vec::new(),
            });
        }

        let mut children = Vec::new();
        if depth < self.max_depth {
            open.push(path.to_string());
            match direction {
                Direction::Forward => {
                    for import in self.store.imports_for_file(path)? {
                        if let Some(resolved) = &import.resolved_path {
                            children.push(self.build_dep_node(
                                resolved,
                                direction,
                                depth + 1,
                                open,
                            )?);
                        } else {
                            let kind = if import.is_builtin {
                                DepNodeKind::Builtin
                            } else {
                                DepNodeKind::External
                            };
                            children.push(DepNode {
                                name: import
                                    .package_name
                                    .clone()
                                    .unwrap_or_else(|| import.specifier.clone()),
                                kind,
                                circular: false,
                                children: Vec::new(),
                            });
                        }
                    }
                }
                Direction::Reverse => {
                    for dependent in self.store.dependents_of(path)? {
                        children.push(self.build_dep_node(
                            &dependent,
                            direction,
                            depth + 1,
                            open,
                        )?);
                    }
                }
            }
            open.pop();
        }

        Ok(DepNode {
            name: path.to_string(),
            kind: DepNodeKind::File,
            circular: false,
            children,
        })
    }

    /// Find every import cycle in the stored graph.
    ///
    /// Classic DFS with an on-stack set; a back-edge to a node still on the
    /// stack yields the stack suffix as a cycle. Cycles are canonicalized by
    /// rotating to their lexicographically smallest member, since the same
    /// cycle is discovered from each of its members.
    pub fn cycles(&self) -> Result<Vec<Vec<String>>> {
        let files = self.store.list_files()?;
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for file in &files {
            let mut targets = Vec::new();
            for import in self.store.imports_for_file(&file.path)? {
                if let Some(resolved) = import.resolved_path {
                    targets.push(resolved);
                }
            }
            adjacency.insert(file.path.clone(), targets);
        }

        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();
        let mut found = BTreeSet::new();

        for file in &files {
            if !visited.contains(&file.path) {
                dfs_cycles(
                    &file.path,
                    &adjacency,
                    &mut visited,
                    &mut stack,
                    &mut on_stack,
                    &mut found,
                );
            }
        }

        Ok(found.into_iter().collect())
    }

    /// Call graph rooted at a symbol: forward follows call/instantiate edges
    /// out of the symbol, reverse collects its callers.
    pub fn call_graph(
        &self,
        path: &str,
        symbol_name: &str,
        direction: Direction,
    ) -> Result<SymbolNode> {
        self.symbol_tree(path, symbol_name, direction, CALL_KINDS)
    }

    /// Type hierarchy rooted at a type: forward follows extends/implements
    /// edges to base types, reverse collects subtypes/implementors.
    pub fn type_hierarchy(
        &self,
        path: &str,
        type_name: &str,
        direction: Direction,
    ) -> Result<SymbolNode> {
        self.symbol_tree(path, type_name, direction, TYPE_KINDS)
    }

    fn symbol_tree(
        &self,
        path: &str,
        name: &str,
        direction: Direction,
        kinds: &[RefKind],
    ) -> Result<SymbolNode> {
        let id = self
            .store
            .find_symbols_by_name(name, None)?
            .into_iter()
            .find(|s| s.path == path)
            .map(|s| s.id);

        let root = SymbolNode {
            id,
            path: Some(path.to_string()),
            name: name.to_string(),
            kind: None,
            circular: false,
            children: Vec::new(),
        };
        let mut open = Vec::new();
        self.expand_symbol_node(root, direction, kinds, 0, &mut open)
    }

    fn expand_symbol_node(
        &self,
        mut node: SymbolNode,
        direction: Direction,
        kinds: &[RefKind],
        depth: usize,
        open: &mut Vec<(String, String)>,
    ) -> Result<SymbolNode> {
        let Some(node_path) = node.path.clone() else {
            // unresolved target: always a leaf
            return Ok(node);
        };
        let open_key = (node_path.clone(), node.name.clone());

        if open.iter().any(|k| *k == open_key) {
            node.circular = true;
            return Ok(node);
        }
        if depth >= self.max_depth {
            return Ok(node);
        }

        open.push(open_key);
        // Sibling dedup: the same call site can resolve the same target from
        // multiple references; keep one child per (id, path, name, kind).
        let mut seen: HashSet<(Option<i64>, Option<String>, String, Option<SymbolKind>)> =
            HashSet::new();

        match direction {
            Direction::Forward => {
                let refs = self.store.outgoing_refs(
                    &node_path,
                    Some(&node.name),
                    Some(kinds),
                    self.max_items,
                )?;
                for r in refs {
                    let key = (
                        r.to_symbol_id,
                        r.to_path.clone(),
                        r.to_symbol_name.clone(),
                        r.to_symbol_kind,
                    );
                    if !seen.insert(key) {
                        continue;
                    }
                    let child = SymbolNode {
                        id: r.to_symbol_id,
                        path: r.to_path.clone(),
                        name: r.to_symbol_name.clone(),
                        kind: r.to_symbol_kind,
                        circular: false,
                        children: Vec::new(),
                    };
                    node.children
                        .push(self.expand_symbol_node(child, direction, kinds, depth + 1, open)?);
                }
            }
            Direction::Reverse => {
                let refs = self.store.incoming_refs(
                    &node_path,
                    &node.name,
                    Some(kinds),
                    self.max_items,
                )?;
                for r in refs {
                    let caller_name = r
                        .from_symbol_name
                        .clone()
                        .unwrap_or_else(|| crate::store::MODULE_SENTINEL.to_string());
                    let key = (None, Some(r.path.clone()), caller_name.clone(), r.from_symbol_kind);
                    if !seen.insert(key) {
                        continue;
                    }
                    let child = SymbolNode {
                        id: None,
                        path: Some(r.path.clone()),
                        name: caller_name,
                        kind: r.from_symbol_kind,
                        circular: false,
                        children: Vec::new(),
                    };
                    // module-level callers have no symbol identity to expand
                    let child = if r.from_symbol_name.is_some() {
                        self.expand_symbol_node(child, direction, kinds, depth + 1, open)?
                    } else {
                        child
                    };
                    node.children.push(child);
                }
            }
        }
        open.pop();

        Ok(node)
    }
}

fn dfs_cycles(
    node: &str,
    adjacency: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
    on_stack: &mut HashSet<String>,
    found: &mut BTreeSet<Vec<String>>,
) {
    visited.insert(node.to_string());
    stack.push(node.to_string());
    on_stack.insert(node.to_string());

    if let Some(targets) = adjacency.get(node) {
        for next in targets {
            if !visited.contains(next) {
                dfs_cycles(next, adjacency, visited, stack, on_stack, found);
            } else if on_stack.contains(next) {
                if let Some(pos) = stack.iter().position(|p| p == next) {
                    found.insert(canonicalize_cycle(&stack[pos..]));
                }
            }
        }
    }

    stack.pop();
    on_stack.remove(node);
}

/// Rotate a cycle to start at its lexicographically smallest member so the
/// same cycle deduplicates regardless of discovery order.
fn canonicalize_cycle(members: &[String]) -> Vec<String> {
    let Some((min_idx, _)) = members.iter().enumerate().min_by_key(|(_, p)| p.as_str()) else {
        return Vec::new();
    };
    members[min_idx..]
        .iter()
        .chain(members[..min_idx].iter())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{FileFacts, RawImport};
    use crate::store::{FileRecord, RefRecord};
    use std::time::Duration;
    use tempfile::tempdir;

    fn open_store(dir: &tempfile::TempDir) -> GraphStore {
        GraphStore::open(dir.path().join("t.db"), Duration::from_millis(100)).unwrap()
    }

    fn file(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            mtime: 1,
            size: 1,
            content_hash: format!("h-{path}"),
            language: "typescript".to_string(),
            line_count: 1,
            extractor_version: 1,
            updated_at: 0,
        }
    }

    fn import_of(target: &str) -> RawImport {
        RawImport {
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
        }
    }

    fn link(store: &GraphStore, from: &str, targets: &[&str]) {
        let facts = FileFacts {
            imports: targets.iter().map(|t| import_of(t)).collect(),
            ..Default::default()
        };
        store.apply_file_change(&file(from), &facts).unwrap();
    }

    fn call_edge(from_path: &str, from_sym: &str, to_path: &str, to_sym: &str) -> RefRecord {
        RefRecord {
            id: 0,
            path: from_path.to_string(),
            from_symbol_name: Some(from_sym.to_string()),
            from_symbol_kind: Some(SymbolKind::Function),
            line: 1,
            col: 0,
            len: 1,
            kind: RefKind::Call,
            to_path: Some(to_path.to_string()),
            to_symbol_id: None,
            to_symbol_name: to_sym.to_string(),
            to_symbol_kind: Some(SymbolKind::Function),
            to_symbol_parent: None,
            unresolved_reason: None,
        }
    }

    #[test]
    fn cycle_is_marked_circular_and_terminates() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        link(&store, "a.ts", &["b.ts"]);
        link(&store, "b.ts", &["c.ts"]);
        link(&store, "c.ts", &["a.ts"]);

        let walker = GraphWalker::new(&store, 10, 100);
        let tree = walker.dependency_tree("a.ts", Direction::Forward).unwrap();

        let b = &tree.children[0];
        let c = &b.children[0];
        let a_again = &c.children[0];
        assert_eq!(a_again.name, "a.ts");
        assert!(a_again.circular);
        assert!(a_again.children.is_empty());
        assert!(!tree.circular);
    }

    #[test]
    fn diamond_reconvergence_expands_both_sides() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        link(&store, "d.ts", &[]);
        link(&store, "b.ts", &["d.ts"]);
        link(&store, "c.ts", &["d.ts"]);
        link(&store, "a.ts", &["b.ts", "c.ts"]);

        let walker = GraphWalker::new(&store, 10, 100);
        let tree = walker.dependency_tree("a.ts", Direction::Forward).unwrap();

        assert_eq!(tree.children.len(), 2);
        for mid in &tree.children {
            assert_eq!(mid.children.len(), 1);
            assert_eq!(mid.children[0].name, "d.ts");
            assert!(!mid.children[0].circular);
        }
    }

    #[test]
    fn external_and_builtin_imports_are_leaves() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        let facts = FileFacts {
            imports: vec![
                RawImport {
                    specifier: "lodash".to_string(),
                    line: 1,
                    col: 0,
                    resolved_path: None,
                    is_external: true,
                    is_builtin: false,
                    package_name: Some("lodash".to_string()),
                    resolution_method: None,
                    unresolved_reason: None,
                    is_reexport: false,
                },
                RawImport {
                    specifier: "node:fs".to_string(),
                    line: 2,
                    col: 0,
                    resolved_path: None,
                    is_external: false,
                    is_builtin: true,
                    package_name: Some("fs".to_string()),
                    resolution_method: None,
                    unresolved_reason: None,
                    is_reexport: false,
                },
            ],
            ..Default::default()
        };
        store.apply_file_change(&file("a.ts"), &facts).unwrap();

        let walker = GraphWalker::new(&store, 10, 100);
        let tree = walker.dependency_tree("a.ts", Direction::Forward).unwrap();

        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].kind, DepNodeKind::External);
        assert_eq!(tree.children[0].name, "lodash");
        assert_eq!(tree.children[1].kind, DepNodeKind::Builtin);
        assert_eq!(tree.children[1].name, "fs");
    }

    #[test]
    fn max_depth_bounds_the_walk() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        link(&store, "c.ts", &[]);
        link(&store, "b.ts", &["c.ts"]);
        link(&store, "a.ts", &["b.ts"]);

        let walker = GraphWalker::new(&store, 1, 100);
        let tree = walker.dependency_tree("a.ts", Direction::Forward).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert!(tree.children[0].children.is_empty());
    }

    #[test]
    fn reverse_tree_lists_dependents() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        link(&store, "a.ts", &[]);
        link(&store, "b.ts", &["a.ts"]);
        link(&store, "c.ts", &["a.ts"]);

        let walker = GraphWalker::new(&store, 10, 100);
        let tree = walker.dependency_tree("a.ts", Direction::Reverse).unwrap();
        let names: Vec<&str> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b.ts", "c.ts"]);
    }

    #[test]
    fn cycles_are_canonical_and_deduplicated() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        // discovery order intentionally starts mid-cycle
        link(&store, "b.ts", &["c.ts"]);
        link(&store, "c.ts", &["a.ts"]);
        link(&store, "a.ts", &["b.ts"]);
        link(&store, "solo.ts", &[]);

        let walker = GraphWalker::new(&store, 10, 100);
        let cycles = walker.cycles().unwrap();

        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], vec!["a.ts", "b.ts", "c.ts"]);
    }

    #[test]
    fn self_import_is_a_single_member_cycle() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        link(&store, "a.ts", &["a.ts"]);

        let walker = GraphWalker::new(&store, 10, 100);
        let cycles = walker.cycles().unwrap();
        assert_eq!(cycles, vec![vec!["a.ts".to_string()]]);
    }

    #[test]
    fn call_graph_dedupes_identical_children_and_marks_recursion() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        link(&store, "a.ts", &[]);
        link(&store, "b.ts", &["a.ts"]);

        // bar calls foo twice (two sites resolve to the same target), and
        // foo calls bar back
        let edges = vec![
            call_edge("b.ts", "bar", "a.ts", "foo"),
            call_edge("b.ts", "bar", "a.ts", "foo"),
        ];
        store.recompute_refs("b.ts", &edges, "fp").unwrap();
        let back = vec![call_edge("a.ts", "foo", "b.ts", "bar")];
        store.recompute_refs("a.ts", &back, "fp").unwrap();

        let walker = GraphWalker::new(&store, 10, 100);
        let tree = walker.call_graph("b.ts", "bar", Direction::Forward).unwrap();

        assert_eq!(tree.children.len(), 1, "duplicate siblings collapse");
        let foo = &tree.children[0];
        assert_eq!(foo.name, "foo");
        let bar_again = &foo.children[0];
        assert_eq!(bar_again.name, "bar");
        assert!(bar_again.circular);
    }

    #[test]
    fn reverse_call_graph_finds_callers() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        link(&store, "a.ts", &[]);
        link(&store, "b.ts", &["a.ts"]);
        let edges = vec![call_edge("b.ts", "bar", "a.ts", "foo")];
        store.recompute_refs("b.ts", &edges, "fp").unwrap();

        let walker = GraphWalker::new(&store, 10, 100);
        let tree = walker.call_graph("a.ts", "foo", Direction::Reverse).unwrap();

        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "bar");
        assert_eq!(tree.children[0].path.as_deref(), Some("b.ts"));
    }

    #[test]
    fn type_hierarchy_follows_extends_edges_only() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        link(&store, "base.ts", &[]);
        link(&store, "derived.ts", &["base.ts"]);

        let mut extend = call_edge("derived.ts", "Derived", "base.ts", "Base");
        extend.kind = RefKind::Extends;
        extend.from_symbol_kind = Some(SymbolKind::Class);
        extend.to_symbol_kind = Some(SymbolKind::Class);
        let call = call_edge("derived.ts", "Derived", "base.ts", "helper");
        store.recompute_refs("derived.ts", &[extend, call], "fp").unwrap();

        let walker = GraphWalker::new(&store, 10, 100);
        let tree = walker
            .type_hierarchy("derived.ts", "Derived", Direction::Forward)
            .unwrap();

        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name, "Base");
    }
}
