//! AST input model: the contract between an external language front end and
//! the index.
//!
//! The front end hands the index a [`SourceUnit`] per analyzed file: an
//! ordered list of top-level [`AstNode`]s, each exposing a kind tag, indexed
//! children, a source file handle and a half-open byte range. Units can be
//! built programmatically or loaded from the JSON form an external parser
//! emits (see [`load_unit`]).

use crate::symbols::NSEP;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Closed set of syntactic constructs the index understands.
///
/// New kinds are added here and handled exhaustively in the extraction and
/// inference dispatchers; the compiler flags every match that misses one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Class,
    /// Instance method definition: `[name, body]`.
    Def,
    /// Class-level method definition: `[receiver, name, body]`.
    #[serde(rename = "defs")]
    DefS,
    /// Statement sequence: any number of children, evaluates to the last.
    Body,
    /// Assignment: `[target, value]`.
    Assign,
    /// Wrapper around a variable-like read: `[Ident | Const | IVar | CVar | Keyword]`.
    VarRef,
    Ident,
    Const,
    /// Root-anchored constant: `[Const]`.
    TopConst,
    /// Qualified constant: `[qualifier, Const]`.
    ConstPath,
    #[serde(rename = "ivar")]
    IVar,
    #[serde(rename = "cvar")]
    CVar,
    /// `self`, `true`, `false`, `nil`.
    #[serde(rename = "kw")]
    Keyword,
    Int,
    Str,
    /// Call with explicit receiver: `[receiver, Ident]`.
    Call,
    /// Call with implicit receiver and parentheses: `[Ident]`.
    #[serde(rename = "fcall")]
    FCall,
    /// Bare identifier call: `[Ident]`.
    #[serde(rename = "vcall")]
    VCall,
    VoidStmt,
    Comment,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Def => "def",
            NodeKind::DefS => "defs",
            NodeKind::Body => "body",
            NodeKind::Assign => "assign",
            NodeKind::VarRef => "var_ref",
            NodeKind::Ident => "ident",
            NodeKind::Const => "const",
            NodeKind::TopConst => "top_const",
            NodeKind::ConstPath => "const_path",
            NodeKind::IVar => "ivar",
            NodeKind::CVar => "cvar",
            NodeKind::Keyword => "kw",
            NodeKind::Int => "int",
            NodeKind::Str => "str",
            NodeKind::Call => "call",
            NodeKind::FCall => "fcall",
            NodeKind::VCall => "vcall",
            NodeKind::VoidStmt => "void_stmt",
            NodeKind::Comment => "comment",
        }
    }
}

/// Half-open byte range `[start, end)` within a source file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

impl SourceRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Identity of a node occurrence: `(file, kind, range)`.
///
/// Two sites with the same key are the same use site; the reference table
/// dedups on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub file: Arc<str>,
    pub kind: NodeKind,
    pub range: SourceRange,
}

impl NodeKey {
    pub fn site(&self) -> SiteKey {
        SiteKey {
            file: self.file.clone(),
            range: self.range,
        }
    }
}

/// Kind-insensitive site identity: `(file, range)`. Used for reverse lookup
/// from a node to the object it denotes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteKey {
    pub file: Arc<str>,
    pub range: SourceRange,
}

/// One node of the tagged syntax tree handed over by the front end.
#[derive(Debug, Clone)]
pub struct AstNode {
    pub kind: NodeKind,
    pub file: Arc<str>,
    pub range: SourceRange,
    /// Source text for leaves (identifier names, keyword text, literal source).
    pub text: Option<Arc<str>>,
    pub children: Vec<AstNode>,
}

impl AstNode {
    pub fn new(kind: NodeKind, file: &Arc<str>, range: SourceRange) -> Self {
        Self {
            kind,
            file: file.clone(),
            range,
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(Arc::from(text));
        self
    }

    pub fn with_children(mut self, children: Vec<AstNode>) -> Self {
        self.children = children;
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn child(&self, index: usize) -> Option<&AstNode> {
        self.children.get(index)
    }

    pub fn key(&self) -> NodeKey {
        NodeKey {
            file: self.file.clone(),
            kind: self.kind,
            range: self.range,
        }
    }

    pub fn site(&self) -> SiteKey {
        SiteKey {
            file: self.file.clone(),
            range: self.range,
        }
    }

    /// Renders the constant path this node spells, joining qualified segments
    /// with the namespace separator. `None` for nodes that do not name a
    /// constant.
    pub fn path_text(&self) -> Option<String> {
        match self.kind {
            NodeKind::Const => self.text().map(str::to_string),
            NodeKind::VarRef => self.child(0).and_then(AstNode::path_text),
            NodeKind::TopConst => {
                let name = self.child(0).and_then(AstNode::path_text)?;
                Some(format!("{NSEP}{name}"))
            }
            NodeKind::ConstPath => {
                let qualifier = self.child(0).and_then(AstNode::path_text)?;
                let name = self.child(1).and_then(AstNode::path_text)?;
                Some(format!("{qualifier}{NSEP}{name}"))
            }
            _ => None,
        }
    }
}

/// One analyzed file: its path and the ordered top-level nodes.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub file: Arc<str>,
    pub nodes: Vec<AstNode>,
}

#[derive(Debug, Error)]
pub enum AstError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk form of a node. The file is stated once per unit and filled into
/// every node when the unit is materialized.
#[derive(Debug, Deserialize)]
struct RawNode {
    kind: NodeKind,
    range: SourceRange,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    children: Vec<RawNode>,
}

#[derive(Debug, Deserialize)]
struct RawUnit {
    file: String,
    nodes: Vec<RawNode>,
}

impl RawNode {
    fn materialize(self, file: &Arc<str>) -> AstNode {
        AstNode {
            kind: self.kind,
            file: file.clone(),
            range: self.range,
            text: self.text.map(|t| Arc::from(t.as_str())),
            children: self
                .children
                .into_iter()
                .map(|c| c.materialize(file))
                .collect(),
        }
    }
}

/// Loads one externally-parsed unit from its JSON form.
pub fn load_unit(path: &Path) -> Result<SourceUnit, AstError> {
    let data = std::fs::read_to_string(path).map_err(|source| AstError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawUnit = serde_json::from_str(&data).map_err(|source| AstError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let file: Arc<str> = Arc::from(raw.file.as_str());
    let nodes = raw
        .nodes
        .into_iter()
        .map(|n| n.materialize(&file))
        .collect();
    Ok(SourceUnit { file, nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_path_text_for_qualified_constants() {
        let file: Arc<str> = Arc::from("a.rb");
        let path = AstNode::new(NodeKind::ConstPath, &file, SourceRange::new(0, 4)).with_children(
            vec![
                AstNode::new(NodeKind::Const, &file, SourceRange::new(0, 1)).with_text("A"),
                AstNode::new(NodeKind::Const, &file, SourceRange::new(3, 4)).with_text("B"),
            ],
        );
        assert_eq!(path.path_text().as_deref(), Some("A::B"));

        let top = AstNode::new(NodeKind::TopConst, &file, SourceRange::new(0, 3)).with_children(
            vec![AstNode::new(NodeKind::Const, &file, SourceRange::new(2, 3)).with_text("C")],
        );
        assert_eq!(top.path_text().as_deref(), Some("::C"));
    }

    #[test]
    fn test_load_unit_fills_file_into_every_node() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"{{
                "file": "lib/user.rb",
                "nodes": [
                    {{"kind": "assign", "range": {{"start": 0, "end": 10}}, "children": [
                        {{"kind": "ident", "range": {{"start": 0, "end": 1}}, "text": "x"}},
                        {{"kind": "int", "range": {{"start": 4, "end": 5}}, "text": "1"}}
                    ]}}
                ]
            }}"#
        )
        .unwrap();

        let unit = load_unit(tmp.path()).unwrap();
        assert_eq!(&*unit.file, "lib/user.rb");
        assert_eq!(unit.nodes.len(), 1);
        let assign = &unit.nodes[0];
        assert_eq!(assign.kind, NodeKind::Assign);
        assert_eq!(&*assign.children[0].file, "lib/user.rb");
        assert_eq!(assign.children[1].text(), Some("1"));
    }

    #[test]
    fn test_load_unit_reports_malformed_json() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "{{ not json").unwrap();
        let err = load_unit(tmp.path()).unwrap_err();
        assert!(matches!(err, AstError::Json { .. }));
    }
}
