//! Best-effort, flow-insensitive type inference.
//!
//! The [`Processor`] walks extracted syntax trees and wires abstract values
//! together: literals mint constant values, while assignments, method
//! bodies, and call sites add propagation edges between the values they
//! connect. Inference never fails a run; what cannot be inferred simply
//! stays untyped.

pub mod types;
pub mod value;

use crate::ast::{AstNode, NodeKey, NodeKind, SourceUnit};
use crate::infer::types::{
    FALSE_CLASS, INTEGER_CLASS, NIL_CLASS, STRING_CLASS, TRUE_CLASS, Type,
};
use crate::infer::value::ValueId;
use crate::session::Session;
use crate::session::references::Reference;
use crate::symbols::{Symbol, SymbolKind};
use rustc_hash::FxHashMap;
use tracing::warn;

#[derive(Debug, Copy, Clone)]
enum NodeState {
    InProgress,
    Done(ValueId),
}

/// Drives inference over nodes, memoizing one abstract value per node
/// identity. Re-entrant processing of a node (through a recursive method,
/// for instance) yields the node's value without descending again.
#[derive(Debug, Default)]
pub struct Processor {
    state: FxHashMap<NodeKey, NodeState>,
}

impl Processor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes every top-level node of a unit in order. Returns the value
    /// of the last one, or `None` for an empty unit.
    pub fn process_all(&mut self, session: &mut Session, unit: &SourceUnit) -> Option<ValueId> {
        let mut last = None;
        for node in &unit.nodes {
            last = Some(self.process(session, node));
        }
        last
    }

    /// The abstract value of one node, computing it on first visit.
    pub fn process(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        let key = node.key();
        match self.state.get(&key) {
            Some(NodeState::Done(id)) => return *id,
            Some(NodeState::InProgress) => return session.value_for_node(node, false),
            None => {}
        }
        self.state.insert(key.clone(), NodeState::InProgress);
        let id = self.dispatch(session, node);
        self.state.insert(key, NodeState::Done(id));
        id
    }

    fn dispatch(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        match node.kind {
            NodeKind::Int => session.new_constant_value(Type::instance(INTEGER_CLASS)),
            NodeKind::Str => session.new_constant_value(Type::instance(STRING_CLASS)),
            NodeKind::Keyword => self.process_keyword(session, node),
            NodeKind::VarRef => self.process_var_ref(session, node),
            NodeKind::Ident => self.process_ident(session, node),
            NodeKind::IVar | NodeKind::CVar => session.value_for_node(node, true),
            NodeKind::Const | NodeKind::TopConst => self.process_const(session, node),
            NodeKind::ConstPath => self.process_const_path(session, node),
            NodeKind::Assign => self.process_assign(session, node),
            NodeKind::Def | NodeKind::DefS => self.process_def(session, node),
            NodeKind::Module | NodeKind::Class => self.process_namespace(session, node),
            NodeKind::Call => self.process_call(session, node),
            NodeKind::FCall | NodeKind::VCall => self.process_local_call(session, node),
            NodeKind::Body => self.process_body(session, node),
            NodeKind::VoidStmt => session.nil_value(),
            NodeKind::Comment => session.value_for_node(node, false),
        }
    }

    fn process_keyword(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        match node.text() {
            Some("true") => session.new_constant_value(Type::instance(TRUE_CLASS)),
            Some("false") => session.new_constant_value(Type::instance(FALSE_CLASS)),
            Some("nil") => session.new_constant_value(Type::instance(NIL_CLASS)),
            Some("self") => session.value_for_node(node, true),
            other => {
                warn!(keyword = ?other, "unhandled keyword");
                session.value_for_node(node, false)
            }
        }
    }

    /// A variable read evaluates to whatever the wrapped variable holds; the
    /// wrapper gets its own value fed from the inner one.
    fn process_var_ref(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        let av = session.value_for_node(node, false);
        if let Some(inner) = node.child(0) {
            let inner_av = self.process(session, inner);
            session.propagate(inner_av, av);
        }
        av
    }

    /// An identifier shares the value of the declaration it refers to. When
    /// it names a method with a known definition, the definition is
    /// processed so the identifier carries the method's signature type.
    fn process_ident(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        let av = session.value_for_node(node, true);
        if let Some(Symbol::Resolved(decl)) = session.get_object_for_ast_node(node)
            && decl.kind == SymbolKind::Method
            && let Some(def_node) = decl.node.clone()
        {
            let method_av = self.process(session, &def_node);
            session.propagate(method_av, av);
        }
        av
    }

    /// A class or module mention is pinned: it holds the class value of the
    /// namespace it resolves to and accepts nothing else. Plain constants
    /// stay open so assigned values can flow into them.
    fn process_const(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        let av = session.value_for_node(node, true);
        if let Some(symbol) = session.get_object_for_ast_node(node)
            && symbol.kind().is_some_and(|k| k.is_namespace())
        {
            session.add_type(av, Type::class(symbol.path()));
            session.set_constant(av);
        }
        av
    }

    /// `A::B` evaluates to its rightmost segment; qualifiers are processed
    /// for their own sites first.
    fn process_const_path(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        let mut last = None;
        for child in &node.children {
            last = Some(self.process(session, child));
        }
        last.unwrap_or_else(|| session.value_for_node(node, false))
    }

    /// `target = value`: the value flows into the target's declaration value,
    /// and the assignment expression evaluates to the target.
    fn process_assign(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        let (Some(target), Some(value)) = (node.child(0), node.child(1)) else {
            warn!(node = node.kind.as_str(), "assignment with missing children");
            return session.value_for_node(node, false);
        };
        let value_av = self.process(session, value);
        let target_av = session.value_for_node(target, true);
        session.propagate(value_av, target_av);
        let av = session.value_for_node(node, false);
        session.propagate(target_av, av);
        av
    }

    /// A method definition evaluates to its own signature type; the body's
    /// value feeds the method's shared return-type value.
    fn process_def(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        let Some(Symbol::Resolved(decl)) = session.get_object_for_ast_node(node) else {
            warn!(node = node.kind.as_str(), "definition without a declaration");
            return session.value_for_node(node, false);
        };
        let method_type = session.method_type(&decl);
        let body_index = match node.kind {
            NodeKind::DefS => 2,
            _ => 1,
        };
        if let Some(body) = node.child(body_index) {
            let body_av = self.process(session, body);
            session.propagate(body_av, method_type.return_type);
        }
        let av = session.value_for_node(node, false);
        session.add_type(av, Type::Method(method_type));
        av
    }

    fn process_namespace(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        if let Some(body) = node.children.last()
            && body.kind == NodeKind::Body
        {
            self.process(session, body);
        }
        session.value_for_node(node, false)
    }

    /// `recv.name(...)`: forwards every known return type of the named method
    /// into the call's value. Unresolved methods get a second chance through
    /// the receiver's inferred types, and `new` on a class without an
    /// explicit constructor synthesizes one returning an instance.
    fn process_call(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        let av = session.value_for_node(node, false);
        let (Some(receiver), Some(ident)) = (node.child(0), node.child(1)) else {
            warn!("call with missing children");
            return av;
        };
        let receiver_av = self.process(session, receiver);
        if ident.kind != NodeKind::Ident {
            warn!(kind = ident.kind.as_str(), "call selector is not an identifier");
            return av;
        }
        let mut method_av = self.process(session, ident);

        match session.get_object_for_ast_node(ident) {
            Some(symbol) if is_constructor(&symbol) => {
                let namespace = symbol.namespace_path().unwrap_or("").to_string();
                let constructor = session.constructor_type(&namespace);
                session.add_type(method_av, Type::Method(constructor));
                if symbol.is_placeholder() {
                    self.retarget_to_initializer(session, ident, &namespace);
                }
            }
            Some(symbol) if symbol.is_placeholder() => {
                if let Some(name) = ident.text().map(str::to_string) {
                    method_av =
                        self.lookup_through_receiver(session, receiver_av, ident, &name, method_av);
                }
            }
            Some(_) => {}
            None => warn!("call selector resolved to nothing"),
        }

        self.forward_returns(session, method_av, av);
        av
    }

    /// `name(...)` or bare `name` with an implicit receiver.
    fn process_local_call(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        let av = session.value_for_node(node, false);
        let Some(ident) = node.child(0) else {
            warn!("call without a selector");
            return av;
        };
        let method_av = self.process(session, ident);
        self.forward_returns(session, method_av, av);
        av
    }

    /// Swaps a placeholder `new` reference for the class's inherited
    /// initializer when one is declared, so call sites land on real code.
    fn retarget_to_initializer(&mut self, session: &mut Session, ident: &AstNode, namespace: &str) {
        let Some(class) = session.at(namespace) else {
            return;
        };
        let initializer = session.resolve(
            Some(&class),
            "#initialize",
            true,
            false,
            Some(SymbolKind::Method),
        );
        if let Some(initializer @ Symbol::Resolved(_)) = initializer {
            if let Some(old) = session.reference_at(ident).cloned() {
                session.delete_reference(&old);
            }
            session.add_reference(Reference::new(initializer, ident.key()));
        }
    }

    /// Tries to resolve a method the lexical pass missed by scanning the
    /// receiver's inferred types. A hit re-points the call site's reference
    /// and processes the found definition.
    fn lookup_through_receiver(
        &mut self,
        session: &mut Session,
        receiver_av: ValueId,
        ident: &AstNode,
        name: &str,
        method_av: ValueId,
    ) -> ValueId {
        let Some(found) = session.lookup_method(receiver_av, name) else {
            warn!(method = name, "method not found on receiver types");
            return method_av;
        };
        if let Some(old) = session.reference_at(ident).cloned() {
            session.delete_reference(&old);
        }
        session.add_reference(Reference::new(found.clone(), ident.key()));
        if let Some(def_node) = found.declaration().and_then(|d| d.node.clone()) {
            self.process(session, &def_node)
        } else {
            session.value_for_symbol(&found)
        }
    }

    /// The call's value mirrors the return type of every method signature
    /// the selector is known to carry.
    fn forward_returns(&mut self, session: &mut Session, method_av: ValueId, av: ValueId) {
        let methods: Vec<_> = session
            .types(method_av)
            .iter()
            .filter_map(|ty| match ty {
                Type::Method(m) => Some(m.clone()),
                _ => None,
            })
            .collect();
        for method in methods {
            session.propagate(method.return_type, av);
            method.check(session.values());
        }
    }

    /// A statement sequence evaluates to its last statement; an empty one is
    /// nil.
    fn process_body(&mut self, session: &mut Session, node: &AstNode) -> ValueId {
        let mut last = None;
        for child in &node.children {
            last = Some(self.process(session, child));
        }
        last.unwrap_or_else(|| session.nil_value())
    }
}

fn is_constructor(symbol: &Symbol) -> bool {
    symbol.name() == "new" && symbol.namespace_path().is_some_and(|ns| !ns.is_empty())
}
