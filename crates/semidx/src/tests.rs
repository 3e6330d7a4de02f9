//! End-to-end tests: extraction followed by inference over hand-built
//! units, checking resolved references and inferred type strings.

use crate::ast::{AstNode, NodeKind, SourceRange, SourceUnit};
use crate::extract::Extractor;
use crate::infer::Processor;
use crate::infer::types::{INTEGER_CLASS, STRING_CLASS, Type};
use crate::output::build_document;
use crate::session::Session;
use crate::symbols::{Declaration, SymbolKind};
use std::sync::Arc;

struct NodeBuilder {
    file: Arc<str>,
    cursor: usize,
}

impl NodeBuilder {
    fn new(file: &str) -> Self {
        Self {
            file: Arc::from(file),
            cursor: 0,
        }
    }

    fn node(&mut self, kind: NodeKind, width: usize) -> AstNode {
        let start = self.cursor;
        self.cursor += width + 1;
        AstNode::new(kind, &self.file, SourceRange::new(start, start + width))
    }

    fn leaf(&mut self, kind: NodeKind, text: &str) -> AstNode {
        self.node(kind, text.len()).with_text(text)
    }

    fn body(&mut self, children: Vec<AstNode>) -> AstNode {
        self.node(NodeKind::Body, 1).with_children(children)
    }

    fn const_ref(&mut self, name: &str) -> AstNode {
        let inner = self.leaf(NodeKind::Const, name);
        self.node(NodeKind::VarRef, name.len())
            .with_children(vec![inner])
    }

    fn ident_ref(&mut self, name: &str) -> AstNode {
        let inner = self.leaf(NodeKind::Ident, name);
        self.node(NodeKind::VarRef, name.len())
            .with_children(vec![inner])
    }

    fn assign(&mut self, target: AstNode, value: AstNode) -> AstNode {
        self.node(NodeKind::Assign, 3)
            .with_children(vec![target, value])
    }

    fn def(&mut self, name: &str, statements: Vec<AstNode>) -> AstNode {
        let name = self.leaf(NodeKind::Ident, name);
        let body = self.body(statements);
        self.node(NodeKind::Def, 3).with_children(vec![name, body])
    }

    fn class(&mut self, name: &str, statements: Vec<AstNode>) -> AstNode {
        let name = self.leaf(NodeKind::Const, name);
        let body = self.body(statements);
        self.node(NodeKind::Class, 5)
            .with_children(vec![name, body])
    }

    fn call(&mut self, receiver: AstNode, method: &str) -> AstNode {
        let ident = self.leaf(NodeKind::Ident, method);
        self.node(NodeKind::Call, 4)
            .with_children(vec![receiver, ident])
    }
}

fn run(unit: &SourceUnit) -> Session {
    let mut session = Session::new();
    Extractor::extract_unit(&mut session, unit);
    let mut processor = Processor::new();
    processor.process_all(&mut session, unit);
    session
}

fn unit(file: &str, nodes: Vec<AstNode>) -> SourceUnit {
    SourceUnit {
        file: Arc::from(file),
        nodes,
    }
}

fn declared_type(session: &mut Session, path: &str) -> String {
    let symbol = session.at(path).unwrap_or_else(|| panic!("missing {path}"));
    let value = session.value_for_symbol(&symbol);
    session.type_string(value)
}

#[test]
fn test_literal_assignment_types_the_local() {
    let mut b = NodeBuilder::new("a.rb");
    let x = {
        let target = b.leaf(NodeKind::Ident, "x");
        let value = b.leaf(NodeKind::Int, "1");
        b.assign(target, value)
    };
    let s = {
        let target = b.leaf(NodeKind::Ident, "s");
        let value = b.leaf(NodeKind::Str, "\"hi\"");
        b.assign(target, value)
    };
    let mut session = run(&unit("a.rb", vec![x, s]));
    assert_eq!(declared_type(&mut session, ">x"), "Integer#");
    assert_eq!(declared_type(&mut session, ">s"), "String#");
}

#[test]
fn test_assignment_chain_propagates_between_locals() {
    let mut b = NodeBuilder::new("a.rb");
    let first = {
        let target = b.leaf(NodeKind::Ident, "x");
        let value = b.leaf(NodeKind::Int, "1");
        b.assign(target, value)
    };
    let second = {
        let target = b.leaf(NodeKind::Ident, "y");
        let value = b.ident_ref("x");
        b.assign(target, value)
    };
    let mut session = run(&unit("a.rb", vec![first, second]));
    assert_eq!(declared_type(&mut session, ">y"), "Integer#");
}

#[test]
fn test_constructor_call_yields_an_instance() {
    let mut b = NodeBuilder::new("a.rb");
    let class = b.class("Widget", vec![]);
    let assign = {
        let target = b.leaf(NodeKind::Ident, "w");
        let receiver = b.const_ref("Widget");
        let value = b.call(receiver, "new");
        b.assign(target, value)
    };
    let mut session = run(&unit("a.rb", vec![class, assign]));
    assert_eq!(declared_type(&mut session, ">w"), "Widget#");
}

#[test]
fn test_constructor_reference_retargets_to_initializer() {
    let mut b = NodeBuilder::new("a.rb");
    let initialize = b.def("initialize", vec![]);
    let class = b.class("Widget", vec![initialize]);
    let assign = {
        let target = b.leaf(NodeKind::Ident, "w");
        let receiver = b.const_ref("Widget");
        let value = b.call(receiver, "new");
        b.assign(target, value)
    };
    let session = run(&unit("a.rb", vec![class, assign]));
    // The placeholder `Widget.new` site now points at real code.
    assert!(session.references_to("Widget.new").is_empty());
    let refs = session.references_to("Widget#initialize");
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].site.kind, NodeKind::Ident);
}

#[test]
fn test_method_return_type_flows_to_the_call_site() {
    let mut b = NodeBuilder::new("a.rb");
    let name_def = {
        let literal = b.leaf(NodeKind::Str, "\"n\"");
        b.def("name", vec![literal])
    };
    let class = b.class("User", vec![name_def]);
    let make = {
        let target = b.leaf(NodeKind::Ident, "u");
        let receiver = b.const_ref("User");
        let value = b.call(receiver, "new");
        b.assign(target, value)
    };
    let read = {
        let target = b.leaf(NodeKind::Ident, "n");
        let receiver = b.ident_ref("u");
        let value = b.call(receiver, "name");
        b.assign(target, value)
    };
    let mut session = run(&unit("a.rb", vec![class, make, read]));
    assert_eq!(declared_type(&mut session, ">u"), "User#");
    // `u.name` was resolved through the receiver's inferred type.
    assert_eq!(declared_type(&mut session, ">n"), "String#");
    assert_eq!(session.references_to("User#name").len(), 1);
}

#[test]
fn test_self_recursive_method_terminates() {
    let mut b = NodeBuilder::new("a.rb");
    let vcall = {
        let ident = b.leaf(NodeKind::Ident, "spin");
        b.node(NodeKind::VCall, 4).with_children(vec![ident])
    };
    let spin = b.def("spin", vec![vcall]);
    let class = b.class("A", vec![spin]);
    let session = run(&unit("a.rb", vec![class]));
    assert!(session.at("A#spin").is_some());
    assert_eq!(session.references_to("A#spin").len(), 1);
}

#[test]
fn test_class_mention_is_typed_as_the_class_value() {
    let mut b = NodeBuilder::new("a.rb");
    let class = b.class("Widget", vec![]);
    let assign = {
        let target = b.leaf(NodeKind::Ident, "k");
        let value = b.const_ref("Widget");
        b.assign(target, value)
    };
    let mut session = run(&unit("a.rb", vec![class, assign]));
    assert_eq!(declared_type(&mut session, ">k"), "Widget");
}

#[test]
fn test_namespace_lookup_prefers_nesting_over_members() {
    // With both `A::B` and a method whose path collides at `A#B`
    // registered, a bare `B` from inside `A` means the nested namespace.
    let mut session = Session::new();
    session.register(Declaration::new("A", "A", SymbolKind::Class, Some("")));
    session.register(Declaration::new("A::B", "B", SymbolKind::Class, Some("A")));
    session.register(
        Declaration::new("A#B", "B", SymbolKind::Method, Some("A"))
            .with_method_scope(crate::symbols::MethodScope::Instance),
    );
    let a = session.at("A").unwrap();
    let found = session.resolve(Some(&a), "B", false, false, None).unwrap();
    assert_eq!(found.path(), "A::B");
}

#[test]
fn test_mixed_branches_accumulate_types_in_order() {
    let mut b = NodeBuilder::new("a.rb");
    let first = {
        let target = b.leaf(NodeKind::Ident, "x");
        let value = b.leaf(NodeKind::Int, "1");
        b.assign(target, value)
    };
    let second = {
        let target = b.leaf(NodeKind::Ident, "x");
        let value = b.leaf(NodeKind::Str, "\"s\"");
        b.assign(target, value)
    };
    let mut session = run(&unit("a.rb", vec![first, second]));
    // Flow-insensitive: both assigned types stick, first seen first.
    assert_eq!(declared_type(&mut session, ">x"), "Integer#, String#");
}

#[test]
fn test_return_value_unions_branch_types_in_propagation_order() {
    // A method with two branches, one ending in an integer and one in a
    // string, modeled as two propagation chains feeding the shared
    // return-type value.
    let mut session = Session::new();
    let path: Arc<str> = Arc::from("A#value");
    let ret = session.method_return_value(&path);

    let int_branch = session.new_value();
    session.add_type(int_branch, Type::instance(INTEGER_CLASS));
    let str_branch = session.new_value();
    session.add_type(str_branch, Type::instance(STRING_CLASS));

    session.propagate(int_branch, ret);
    session.propagate(str_branch, ret);
    assert_eq!(session.type_string(ret), "Integer#, String#");
    // Every signature minted for the method sees the same union.
    assert_eq!(session.method_return_value(&path), ret);
}

#[test]
fn test_document_round_trip_over_a_full_unit() {
    let mut b = NodeBuilder::new("lib/user.rb");
    let name_def = {
        let literal = b.leaf(NodeKind::Str, "\"n\"");
        b.def("name", vec![literal])
    };
    let class = b.class("User", vec![name_def]);
    let assign = {
        let target = b.leaf(NodeKind::Ident, "u");
        let receiver = b.const_ref("User");
        let value = b.call(receiver, "new");
        b.assign(target, value)
    };
    let session = run(&unit("lib/user.rb", vec![class, assign]));
    let doc = build_document(&session, true);

    let paths: Vec<&str> = doc.objects.iter().map(|o| o.path.as_str()).collect();
    assert_eq!(paths, [">u", "User", "User#name"]);
    let user = &doc.objects[1];
    assert_eq!(user.kind, "class");
    assert_eq!(user.file, "lib/user.rb");
    assert!(user.module.is_none());
    let local = &doc.objects[0];
    assert_eq!(local.type_string.as_deref(), Some("User#"));
    assert!(doc.references.iter().any(|r| r.target == "User"));
}

#[test]
fn test_reference_sites_stay_unique_across_passes() {
    let mut b = NodeBuilder::new("a.rb");
    let class = b.class("Widget", vec![]);
    let mention = b.const_ref("Widget");
    let unit = unit("a.rb", vec![class, mention]);

    let mut session = Session::new();
    Extractor::extract_unit(&mut session, &unit);
    // Extracting the same unit again adds no duplicate sites.
    Extractor::extract_unit(&mut session, &unit);
    let mut processor = Processor::new();
    processor.process_all(&mut session, &unit);
    assert_eq!(session.references_to("Widget").len(), 1);
}
