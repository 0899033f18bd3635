use anyhow::Result;

use crate::config::Config;
use crate::query::engine::QueryEngine;
use crate::store::{RefRecord, SymbolKind};

/// Query the index: `file <path>`, `symbol <name>`, `refs <name>`,
/// `refs-to <path:name>`, `refs-from <path>`.
pub fn query_index(
    query_type: String,
    target: String,
    project: String,
    format: String,
) -> Result<()> {
    let config = Config::from_project_dir(&project);
    let store = super::open_store(&project, &config)?;
    let engine = QueryEngine::new(store, config.query.max_items);
    let json = format == "json";

    match query_type.as_str() {
        "file" => {
            let Some(overview) = engine.file_overview(&target)? else {
                anyhow::bail!("File not indexed: {target}");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
                return Ok(());
            }
            println!("{} ({}, {} lines)", overview.file.path, overview.file.language, overview.file.line_count);
            if !overview.symbols.is_empty() {
                println!("\nSymbols:");
                for s in &overview.symbols {
                    println!(
                        "  {:>4}  {} {}{}",
                        s.start_line,
                        s.kind.as_str(),
                        s.name,
                        if s.exported { " (exported)" } else { "" }
                    );
                }
            }
            if !overview.imports.is_empty() {
                println!("\nImports:");
                for imp in &overview.imports {
                    let resolution = imp
                        .resolved_path
                        .as_deref()
                        .unwrap_or(if imp.is_builtin {
                            "(builtin)"
                        } else if imp.is_external {
                            "(external)"
                        } else {
                            "(unresolved)"
                        });
                    let marker = if imp.is_reexport { " (re-export)" } else { "" };
                    println!("  {:>4}  {} -> {}{}", imp.line, imp.specifier, resolution, marker);
                }
            }
            if !overview.headings.is_empty() {
                println!("\nHeadings:");
                for h in &overview.headings {
                    println!("  {:>4}  {} {}", h.line, "#".repeat(h.level as usize), h.text);
                }
            }
        }

        "symbol" => {
            let (name, kind) = parse_symbol_filter(&target)?;
            let symbols = engine.find_symbols(name, kind)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&symbols)?);
                return Ok(());
            }
            if symbols.is_empty() {
                println!("No symbols named '{name}'");
            }
            for s in symbols {
                println!(
                    "{}:{} {} {}{}",
                    s.path,
                    s.start_line,
                    s.kind.as_str(),
                    s.name,
                    s.parent_name
                        .as_deref()
                        .map(|p| format!(" (in {p})"))
                        .unwrap_or_default()
                );
            }
        }

        "refs" => {
            let refs = engine.references_by_name(&target, None, None)?;
            print_refs(&refs, json)?;
        }

        "refs-to" => {
            let (path, name) = split_target(&target)?;
            let refs = engine.incoming_references(path, name, None, None)?;
            print_refs(&refs, json)?;
        }

        "refs-from" => {
            let refs = engine.outgoing_references(&target, None, None, None)?;
            print_refs(&refs, json)?;
        }

        other => anyhow::bail!(
            "Unknown query type '{other}' (expected file, symbol, refs, refs-to, refs-from)"
        ),
    }

    Ok(())
}

/// `name` or `kind:name`, e.g. `class:Parser`.
fn parse_symbol_filter(target: &str) -> Result<(&str, Option<SymbolKind>)> {
    match target.split_once(':') {
        Some((kind, name)) => Ok((name, Some(SymbolKind::parse(kind)?))),
        None => Ok((target, None)),
    }
}

fn split_target(target: &str) -> Result<(&str, &str)> {
    target
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("Expected <path>:<symbol>, got '{target}'"))
}

fn print_refs(refs: &[RefRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(refs)?);
        return Ok(());
    }
    if refs.is_empty() {
        println!("No references found");
    }
    for r in refs {
        let from = r.from_symbol_name.as_deref().unwrap_or("(module)");
        let to = match &r.to_path {
            Some(path) => format!("{}:{}", path, r.to_symbol_name),
            None => format!(
                "{} [{}]",
                r.to_symbol_name,
                r.unresolved_reason.as_deref().unwrap_or("unresolved")
            ),
        };
        println!(
            "{}:{}:{}  {}  {} -> {}",
            r.path,
            r.line,
            r.col,
            r.kind.as_str(),
            from,
            to
        );
    }
    Ok(())
}
