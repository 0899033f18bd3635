// Extraction seam: raw facts produced per file, consumed by the engine.
//
// Per-language AST walking lives outside this crate. Hosts implement
// `Extractor` (or fill a `StaticFacts` table from out-of-process extraction);
// the engine only ever sees the raw fact types below, keyed by the same
// repo-relative paths used everywhere else.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::store::{RefMode, SymbolKind};

/// Raw symbol fact from an extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub signature: Option<String>,
    pub start_line: i64,
    pub end_line: i64,
    pub exported: bool,
    pub is_default: bool,
    pub is_async: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    pub parent_name: Option<String>,
    pub doc_comment: Option<String>,
}

/// Raw import fact plus its resolution outcome (supplied by the host's
/// module-resolution collaborator; this crate applies no import heuristics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawImport {
    pub specifier: String,
    pub line: i64,
    pub col: i64,
    pub resolved_path: Option<String>,
    pub is_external: bool,
    pub is_builtin: bool,
    pub package_name: Option<String>,
    pub resolution_method: Option<String>,
    pub unresolved_reason: Option<String>,
    /// True for `export ... from` forms.
    pub is_reexport: bool,
}

/// Syntactic form of a raw reference site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawRefForm {
    Import,
    Reexport,
    Call,
    Instantiate,
    TypeUse,
    Extends,
    Implements,
    /// Bare identifier access, only considered in full mode.
    Ident(IdentAccess),
}

/// Context flags for an identifier access. The extractor records what it saw;
/// the resolver decides whether the site becomes a read/write edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentAccess {
    /// Assignment target, including compound assignment and inc/dec.
    pub write: bool,
    pub in_declaration: bool,
    pub in_import: bool,
    pub is_callee: bool,
    pub is_member_name: bool,
    pub in_type_position: bool,
}

/// Syntactic target of a raw reference, as far as the extractor could resolve
/// it. Everything optional: an entirely unresolved target is first-class data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTarget {
    /// None for whole-module targets (stored under the module sentinel).
    pub name: Option<String>,
    /// File declaring the target, if the declaration was found in scope.
    pub path: Option<String>,
    pub kind: Option<SymbolKind>,
    pub parent_name: Option<String>,
    /// Declaration start line, for the structural-key symbol lookup.
    pub start_line: Option<i64>,
    pub unresolved_reason: Option<String>,
}

/// One raw reference fact: an exact site plus a syntactic target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRef {
    pub line: i64,
    pub col: i64,
    pub len: i64,
    pub form: RawRefForm,
    pub target: RawTarget,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHeading {
    pub level: i64,
    pub text: String,
    pub line: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCodeBlock {
    pub language: Option<String>,
    pub start_line: i64,
    pub end_line: i64,
}

/// Everything an extractor produces for one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFacts {
    pub symbols: Vec<RawSymbol>,
    pub imports: Vec<RawImport>,
    pub refs: Vec<RawRef>,
    pub headings: Vec<RawHeading>,
    pub code_blocks: Vec<RawCodeBlock>,
    pub line_count: i64,
}

/// Per-pass extraction state. Created at pass start, discarded at pass end;
/// never a module-level singleton, so repeated passes cannot leak state.
#[derive(Debug)]
pub struct PassContext {
    pub mode: RefMode,
    pub config_hash: Option<String>,
    pub files_extracted: usize,
}

impl PassContext {
    pub fn new(mode: RefMode, config_hash: Option<String>) -> Self {
        Self {
            mode,
            config_hash,
            files_extracted: 0,
        }
    }
}

/// Extraction seam. One implementation per source language.
pub trait Extractor {
    fn can_extract(&self, path: &str) -> bool;
    /// Bumping this invalidates previously-extracted rows for matching files.
    fn version(&self) -> i64;
    fn extract(&self, ctx: &mut PassContext, path: &str, content: &str)
        -> anyhow::Result<FileFacts>;
}

/// Pre-computed facts keyed by path, for hosts that run extraction
/// out-of-process (and for tests).
#[derive(Debug, Default)]
pub struct StaticFacts {
    facts: HashMap<String, FileFacts>,
    version: i64,
}

impl StaticFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, facts: FileFacts) {
        self.facts.insert(path.into(), facts);
    }

    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

impl Extractor for StaticFacts {
    fn can_extract(&self, path: &str) -> bool {
        self.facts.contains_key(path)
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn extract(
        &self,
        ctx: &mut PassContext,
        path: &str,
        _content: &str,
    ) -> anyhow::Result<FileFacts> {
        ctx.files_extracted += 1;
        self.facts
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No facts registered for {path}"))
    }
}

/// Built-in markdown extractor: headings and fenced code blocks from a plain
/// line scan. Heading lines inside a fence are not headings.
#[derive(Debug, Default)]
pub struct MarkdownExtractor;

impl Extractor for MarkdownExtractor {
    fn can_extract(&self, path: &str) -> bool {
        path.ends_with(".md") || path.ends_with(".markdown")
    }

    fn version(&self) -> i64 {
        1
    }

    fn extract(
        &self,
        ctx: &mut PassContext,
        _path: &str,
        content: &str,
    ) -> anyhow::Result<FileFacts> {
        ctx.files_extracted += 1;

        let mut facts = FileFacts::default();
        let mut fence_start: Option<(i64, Option<String>)> = None;

        for (idx, raw_line) in content.lines().enumerate() {
            let line_no = idx as i64 + 1;
            facts.line_count = line_no;
            let line = raw_line.trim_end();

            if let Some(rest) = line.trim_start().strip_prefix("```") {
                match fence_start.take() {
                    Some((start, language)) => {
                        facts.code_blocks.push(RawCodeBlock {
                            language,
                            start_line: start,
                            end_line: line_no,
                        });
                    }
                    None => {
                        let lang = rest.trim();
                        let language = if lang.is_empty() {
                            None
                        } else {
                            Some(lang.to_string())
                        };
                        fence_start = Some((line_no, language));
                    }
                }
                continue;
            }

            if fence_start.is_some() {
                continue;
            }

            if let Some(stripped) = line.strip_prefix('#') {
                let level = 1 + stripped.chars().take_while(|c| *c == '#').count() as i64;
                if level <= 6 {
                    let text = stripped.trim_start_matches('#').trim();
                    if !text.is_empty() {
                        facts.headings.push(RawHeading {
                            level,
                            text: text.to_string(),
                            line: line_no,
                        });
                    }
                }
            }
        }

        // Unterminated fence: keep it, closed at EOF
        if let Some((start, language)) = fence_start {
            facts.code_blocks.push(RawCodeBlock {
                language,
                start_line: start,
                end_line: facts.line_count,
            });
        }

        Ok(facts)
    }
}

/// Null-byte sniff over the first 8 KiB. Binary files are skipped during
/// indexing, not errored.
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(8192).any(|b| *b == 0)
}

/// Language from file extension; extractors may refine this.
pub fn detect_language(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("rs") => "rust",
        Some("ts") | Some("tsx") => "typescript",
        Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => "javascript",
        Some("py") => "python",
        Some("go") => "go",
        Some("java") => "java",
        Some("md") | Some("markdown") => "markdown",
        _ => "unknown",
    }
}
