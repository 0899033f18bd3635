// Persisted graph store: schema, typed records, CRUD

pub mod db;
pub mod schema;

pub use db::GraphStore;

use serde::{Deserialize, Serialize};

/// Sentinel target name for module-level references; a reference row is never
/// stored without *a* target name, even when target identity is unresolved.
pub const MODULE_SENTINEL: &str = "(module)";

/// A file tracked by the index. One row per repo-relative path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub mtime: i64,
    pub size: i64,
    pub content_hash: String,
    pub language: String,
    pub line_count: i64,
    pub extractor_version: i64,
    pub updated_at: i64,
}

/// A symbol extracted from one file. The numeric `id` is ephemeral: it is
/// re-assigned every time the file is re-extracted. Anything that must survive
/// reindexing addresses the symbol by its structural key instead (see
/// [`SymbolKey`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub id: i64,
    pub path: String,
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
    /// Names the enclosing container symbol by its `name`, not its id, so
    /// lookups need no join ordering.
    pub parent_name: Option<String>,
    pub doc_comment: Option<String>,
}

/// Structural key re-identifying a symbol across extractions, independent of
/// its ephemeral numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolKey {
    pub kind: SymbolKind,
    pub name: String,
    pub parent_name: Option<String>,
    pub start_line: i64,
}

impl SymbolRecord {
    pub fn key(&self) -> SymbolKey {
        SymbolKey {
            kind: self.kind,
            name: self.name.clone(),
            parent_name: self.parent_name.clone(),
            start_line: self.start_line,
        }
    }
}

/// Symbol kinds (closed enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Type,
    Variable,
    Enum,
    EnumMember,
    Method,
    Property,
    Constructor,
    Getter,
    Setter,
    Namespace,
    Struct,
    Destructor,
}

impl Default for SymbolKind {
    fn default() -> Self {
        SymbolKind::Variable
    }
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Variable => "variable",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumMember => "enum_member",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Getter => "getter",
            SymbolKind::Setter => "setter",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Struct => "struct",
            SymbolKind::Destructor => "destructor",
        }
    }

    pub fn parse(s: &str) -> crate::error::Result<Self> {
        match s {
            "function" => Ok(SymbolKind::Function),
            "class" => Ok(SymbolKind::Class),
            "interface" => Ok(SymbolKind::Interface),
            "type" => Ok(SymbolKind::Type),
            "variable" => Ok(SymbolKind::Variable),
            "enum" => Ok(SymbolKind::Enum),
            "enum_member" => Ok(SymbolKind::EnumMember),
            "method" => Ok(SymbolKind::Method),
            "property" => Ok(SymbolKind::Property),
            "constructor" => Ok(SymbolKind::Constructor),
            "getter" => Ok(SymbolKind::Getter),
            "setter" => Ok(SymbolKind::Setter),
            "namespace" => Ok(SymbolKind::Namespace),
            "struct" => Ok(SymbolKind::Struct),
            "destructor" => Ok(SymbolKind::Destructor),
            _ => Err(crate::error::StoreError::Store(format!(
                "Unknown symbol kind: {s}"
            ))),
        }
    }

    /// Kinds that can enclose a reference site.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function
                | SymbolKind::Class
                | SymbolKind::Interface
                | SymbolKind::Enum
                | SymbolKind::Method
                | SymbolKind::Constructor
                | SymbolKind::Getter
                | SymbolKind::Setter
                | SymbolKind::Namespace
                | SymbolKind::Struct
                | SymbolKind::Destructor
        )
    }
}

/// Reference kinds. Import through implements are "structural" and always
/// captured; read/write are only captured in full extraction mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Import,
    Reexport,
    Call,
    Instantiate,
    Type,
    Extends,
    Implements,
    Read,
    Write,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Import => "import",
            RefKind::Reexport => "reexport",
            RefKind::Call => "call",
            RefKind::Instantiate => "instantiate",
            RefKind::Type => "type",
            RefKind::Extends => "extends",
            RefKind::Implements => "implements",
            RefKind::Read => "read",
            RefKind::Write => "write",
        }
    }

    pub fn parse(s: &str) -> crate::error::Result<Self> {
        match s {
            "import" => Ok(RefKind::Import),
            "reexport" => Ok(RefKind::Reexport),
            "call" => Ok(RefKind::Call),
            "instantiate" => Ok(RefKind::Instantiate),
            "type" => Ok(RefKind::Type),
            "extends" => Ok(RefKind::Extends),
            "implements" => Ok(RefKind::Implements),
            "read" => Ok(RefKind::Read),
            "write" => Ok(RefKind::Write),
            _ => Err(crate::error::StoreError::Store(format!(
                "Unknown reference kind: {s}"
            ))),
        }
    }

    pub fn is_structural(&self) -> bool {
        !matches!(self, RefKind::Read | RefKind::Write)
    }
}

/// Reference extraction mode, part of the invalidation fingerprint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RefMode {
    Structural,
    Full,
}

impl RefMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefMode::Structural => "structural",
            RefMode::Full => "full",
        }
    }

    pub fn parse(s: &str) -> crate::error::Result<Self> {
        match s {
            "structural" => Ok(RefMode::Structural),
            "full" => Ok(RefMode::Full),
            _ => Err(crate::error::StoreError::Store(format!(
                "Unknown reference mode: {s}"
            ))),
        }
    }
}

/// An import statement and its resolution outcome. One row per statement,
/// not deduplicated across statements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: i64,
    pub path: String,
    pub specifier: String,
    /// Null means external or unresolved.
    pub resolved_path: Option<String>,
    pub is_external: bool,
    pub is_builtin: bool,
    /// True for `export ... from` forms.
    pub is_reexport: bool,
    pub package_name: Option<String>,
    pub resolution_method: Option<String>,
    pub unresolved_reason: Option<String>,
    pub line: i64,
    pub col: i64,
}

/// A directional reference edge. The from side pins the exact site in the
/// source file; the to side carries both a nullable symbol id and a structural
/// fallback so the edge stays queryable by name across re-extractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefRecord {
    pub id: i64,
    pub path: String,
    /// Enclosing symbol of the site; null for module-level references.
    pub from_symbol_name: Option<String>,
    pub from_symbol_kind: Option<SymbolKind>,
    pub line: i64,
    pub col: i64,
    pub len: i64,
    pub kind: RefKind,
    /// Must name a file currently in the store; nulled (with `to_symbol_id`)
    /// when the target file leaves scope.
    pub to_path: Option<String>,
    pub to_symbol_id: Option<i64>,
    pub to_symbol_name: String,
    pub to_symbol_kind: Option<SymbolKind>,
    pub to_symbol_parent: Option<String>,
    pub unresolved_reason: Option<String>,
}

/// Markdown heading row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadingRecord {
    pub path: String,
    pub level: i64,
    pub text: String,
    pub line: i64,
}

/// Fenced code block row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlockRecord {
    pub path: String,
    pub language: Option<String>,
    pub start_line: i64,
    pub end_line: i64,
}

/// User-authored annotation, file- or symbol-scoped. Never deleted by
/// reindexing; an explicit prune removes those whose target no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: i64,
    pub path: String,
    /// Null for file-scoped annotations.
    pub symbol_name: Option<String>,
    pub symbol_kind: Option<SymbolKind>,
    pub parent_name: Option<String>,
    /// Empty string means "any signature".
    pub signature: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Key/value tag attached to an annotation; multi-valued per key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub annotation_id: i64,
    pub key: String,
    pub value: String,
}

/// Index statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_files: usize,
    pub total_symbols: usize,
    pub total_imports: usize,
    pub total_refs: usize,
    pub total_annotations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codecs_round_trip() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::EnumMember,
            SymbolKind::Destructor,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()).unwrap(), kind);
        }
        for kind in [RefKind::Reexport, RefKind::Write, RefKind::Type] {
            assert_eq!(RefKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(SymbolKind::parse("gadget").is_err());
    }

    #[test]
    fn structural_kinds_exclude_read_write() {
        assert!(RefKind::Call.is_structural());
        assert!(RefKind::Implements.is_structural());
        assert!(!RefKind::Read.is_structural());
        assert!(!RefKind::Write.is_structural());
    }
}
