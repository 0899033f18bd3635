use anyhow::Result;

use crate::config::Config;
use crate::query::traverse::{DepNode, Direction, GraphWalker, SymbolNode};

/// Graph traversals: `deps <path>`, `cycles`, `calls <path:symbol>`,
/// `hierarchy <path:type>`. `--reverse` flips deps/calls/hierarchy.
pub fn graph_query(
    graph_type: String,
    target: Option<String>,
    project: String,
    reverse: bool,
    depth: Option<usize>,
    format: String,
) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let store = super::open_store(&project, &config)?;
    let walker = GraphWalker::new(
        &store,
        depth.unwrap_or(config.query.max_depth),
        config.query.max_items,
    );
    let direction = if reverse {
        Direction::Reverse
    } else {
        Direction::Forward
    };
    let json = format == "json";

    match graph_type.as_str() {
        "deps" => {
            let path = require_target(&graph_type, target)?;
            let tree = walker.dependency_tree(&path, direction)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                print_dep_node(&tree, 0);
            }
        }

        "cycles" => {
            let cycles = walker.cycles()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&cycles)?);
                return Ok(());
            }
            if cycles.is_empty() {
                println!("No import cycles");
            }
            for cycle in &cycles {
                println!("{} -> {}", cycle.join(" -> "), cycle[0]);
            }
        }

        "calls" => {
            let raw = require_target(&graph_type, target)?;
            let (path, symbol) = split_target(&raw)?;
            let tree = walker.call_graph(path, symbol, direction)?;
            print_symbol_tree(&tree, json)?;
        }

        "hierarchy" => {
            let raw = require_target(&graph_type, target)?;
            let (path, name) = split_target(&raw)?;
            let tree = walker.type_hierarchy(path, name, direction)?;
            print_symbol_tree(&tree, json)?;
        }

        other => anyhow::bail!(
            "Unknown graph type '{other}' (expected deps, cycles, calls, hierarchy)"
        ),
    }

    Ok(())
}

fn require_target(graph_type: &str, target: Option<String>) -> Result<String> {
    target.ok_or_else(|| anyhow::anyhow!("'{graph_type}' requires a target"))
}

fn split_target(target: &str) -> Result<(&str, &str)> {
    target
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("Expected <path>:<symbol>, got '{target}'"))
}

fn print_dep_node(node: &DepNode, depth: usize) {
    let marker = match (node.circular, node.kind) {
        (true, _) => " (circular)",
        (false, crate::query::traverse::DepNodeKind::External) => " (external)",
        (false, crate::query::traverse::DepNodeKind::Builtin) => " (builtin)",
        _ => "",
    };
    println!("{}{}{}", "  ".repeat(depth), node.name, marker);
    for child in &node.children {
        print_dep_node(child, depth + 1);
    }
}

fn print_symbol_tree(tree: &SymbolNode, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tree)?);
        return Ok(());
    }
    print_symbol_node(tree, 0);
    Ok(())
}

fn print_symbol_node(node: &SymbolNode, depth: usize) {
    let location = node
        .path
        .as_deref()
        .map(|p| format!(" [{p}]"))
        .unwrap_or_default();
    let marker = if node.circular { " (circular)" } else { "" };
    println!("{}{}{}{}", "  ".repeat(depth), node.name, location, marker);
    for child in &node.children {
        print_symbol_node(child, depth + 1);
    }
}
