//! JSON index document: the serialized form of one session.

use crate::session::Session;
use crate::symbols::Declaration;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct IndexDocument {
    pub objects: Vec<ObjectRecord>,
    pub references: Vec<ReferenceRecord>,
}

#[derive(Debug, Serialize)]
pub struct ObjectRecord {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub kind: &'static str,
    pub file: String,
    pub def_start: usize,
    pub def_end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_string: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReferenceRecord {
    pub target: String,
    pub kind: &'static str,
    pub file: String,
    pub start: usize,
    pub end: usize,
}

/// Snapshots a session. Objects are sorted by path; references keep their
/// registration order, grouped by first-seen target. Declarations without a
/// source node (the seeded built-ins) are not emitted.
pub fn build_document(session: &Session, include_types: bool) -> IndexDocument {
    let mut declarations: Vec<Arc<Declaration>> = session.all(&[]);
    declarations.sort_by(|a, b| a.path.cmp(&b.path));

    let objects = declarations
        .iter()
        .filter_map(|decl| {
            let node = decl.node.as_ref()?;
            let type_string = include_types
                .then(|| session.value_for_path(&decl.path))
                .flatten()
                .map(|id| session.type_string(id))
                .filter(|s| !s.is_empty());
            Some(ObjectRecord {
                name: decl.name.to_string(),
                path: decl.path.to_string(),
                module: decl
                    .namespace
                    .as_deref()
                    .filter(|ns| !ns.is_empty())
                    .map(str::to_string),
                kind: decl.kind.as_str(),
                file: node.file.to_string(),
                def_start: node.range.start,
                def_end: node.range.end,
                type_string,
            })
        })
        .collect();

    let references = session
        .all_references()
        .map(|reference| ReferenceRecord {
            target: reference.target.path().to_string(),
            kind: reference.site.kind.as_str(),
            file: reference.site.file.to_string(),
            start: reference.site.range.start,
            end: reference.site.range.end,
        })
        .collect();

    IndexDocument {
        objects,
        references,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstNode, NodeKind, SourceRange};
    use crate::session::references::Reference;
    use crate::symbols::{Symbol, SymbolKind};

    #[test]
    fn test_document_sorts_objects_and_skips_builtins() {
        let mut session = Session::new();
        let file: Arc<str> = Arc::from("a.rb");
        let node_b = AstNode::new(NodeKind::Class, &file, SourceRange::new(10, 20));
        let node_a = AstNode::new(NodeKind::Class, &file, SourceRange::new(0, 8));
        session.register(
            Declaration::new("B", "B", SymbolKind::Class, Some("")).with_node(&node_b),
        );
        session.register(
            Declaration::new("A", "A", SymbolKind::Class, Some("")).with_node(&node_a),
        );

        let doc = build_document(&session, false);
        let paths: Vec<&str> = doc.objects.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(paths, ["A", "B"]);
        assert!(doc.objects.iter().all(|o| o.type_string.is_none()));
    }

    #[test]
    fn test_document_carries_references_and_types() {
        let mut session = Session::new();
        let file: Arc<str> = Arc::from("a.rb");
        let node = AstNode::new(NodeKind::Class, &file, SourceRange::new(0, 8));
        let decl = session.register(
            Declaration::new("A", "A", SymbolKind::Class, Some("")).with_node(&node),
        );
        let symbol = Symbol::Resolved(decl);
        session.add_reference(Reference::new(
            symbol.clone(),
            crate::ast::NodeKey {
                file: file.clone(),
                kind: NodeKind::Const,
                range: SourceRange::new(30, 31),
            },
        ));
        let value = session.value_for_symbol(&symbol);
        session.add_type(value, crate::infer::types::Type::class("A"));

        let doc = build_document(&session, true);
        assert_eq!(doc.objects.len(), 1);
        assert_eq!(doc.objects[0].type_string.as_deref(), Some("A"));
        assert_eq!(doc.references.len(), 1);
        assert_eq!(doc.references[0].target, "A");
        assert_eq!(doc.references[0].kind, "const");
        assert_eq!(doc.references[0].start, 30);
    }

    #[test]
    fn test_serialized_shape() {
        let mut session = Session::new();
        let file: Arc<str> = Arc::from("a.rb");
        let node = AstNode::new(NodeKind::Module, &file, SourceRange::new(0, 5));
        session.register(
            Declaration::new("M", "M", SymbolKind::Module, Some("")).with_node(&node),
        );
        let doc = build_document(&session, false);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["objects"][0]["kind"], "module");
        assert_eq!(json["objects"][0]["file"], "a.rb");
        // Root-owned declarations omit the module field entirely.
        assert!(json["objects"][0].get("module").is_none());
    }
}
