//! Extraction: one pass over a unit's syntax that registers declarations
//! and records references, before any inference runs.
//!
//! The walker keeps three stacks in step with the tree: the enclosing
//! namespace, the owner path for local variables (nearest method or
//! namespace), and the self binding that decides whether bare calls are
//! instance-level or class-level.

use crate::ast::{AstNode, NodeKind, SourceUnit};
use crate::session::Session;
use crate::session::references::Reference;
use crate::symbols::{
    Declaration, LSEP, MethodScope, NSEP, Symbol, SymbolKind, join_path, method_path,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Extractor {
    namespaces: Vec<Symbol>,
    /// Path owning local variables: innermost method, or the namespace when
    /// outside any method body.
    owners: Vec<Arc<str>>,
    self_bindings: Vec<MethodScope>,
    /// Lexical local-variable scopes, innermost last.
    locals: Vec<FxHashMap<Arc<str>, Symbol>>,
}

impl Extractor {
    pub fn new(session: &Session) -> Self {
        let root = session.root();
        let owner: Arc<str> = Arc::from(root.path());
        Self {
            namespaces: vec![root],
            owners: vec![owner],
            self_bindings: vec![MethodScope::Instance],
            locals: vec![FxHashMap::default()],
        }
    }

    pub fn extract_unit(session: &mut Session, unit: &SourceUnit) {
        let mut extractor = Self::new(session);
        for node in &unit.nodes {
            extractor.walk(session, node);
        }
    }

    fn namespace(&self) -> &Symbol {
        self.namespaces.last().unwrap()
    }

    fn namespace_path(&self) -> String {
        self.namespace().path().to_string()
    }

    fn walk(&mut self, session: &mut Session, node: &AstNode) {
        match node.kind {
            NodeKind::Module => self.walk_namespace(session, node, SymbolKind::Module),
            NodeKind::Class => self.walk_namespace(session, node, SymbolKind::Class),
            NodeKind::Def => self.walk_def(session, node),
            NodeKind::DefS => self.walk_defs(session, node),
            NodeKind::Assign => self.walk_assign(session, node),
            NodeKind::VarRef => self.walk_var_ref(session, node),
            NodeKind::TopConst => self.walk_top_const(session, node),
            NodeKind::ConstPath => self.walk_const_path(session, node),
            NodeKind::Call => self.walk_call(session, node),
            NodeKind::FCall | NodeKind::VCall => self.walk_local_call(session, node),
            NodeKind::Body => {
                for child in &node.children {
                    self.walk(session, child);
                }
            }
            NodeKind::Ident
            | NodeKind::Const
            | NodeKind::IVar
            | NodeKind::CVar
            | NodeKind::Keyword
            | NodeKind::Int
            | NodeKind::Str
            | NodeKind::VoidStmt
            | NodeKind::Comment => {}
        }
    }

    fn walk_namespace(&mut self, session: &mut Session, node: &AstNode, kind: SymbolKind) {
        let Some(name) = node.child(0).and_then(AstNode::path_text) else {
            warn!(node = node.kind.as_str(), "namespace without a name");
            return;
        };
        let namespace = self.namespace_path();
        let path = join_path(&namespace, NSEP, &name);
        let simple_name = name.rsplit(NSEP).next().unwrap_or(&name).to_string();

        let mut decl =
            Declaration::new(&path, &simple_name, kind, Some(&namespace)).with_node(node);
        if kind == SymbolKind::Class
            && let Some(superclass) = self.superclass_node(node)
        {
            decl = decl.with_superclass(&self.resolve_superclass(session, superclass));
        }
        let decl = session.register(decl);
        debug!(path = %decl.path, kind = kind.as_str(), "registered namespace");

        self.namespaces.push(Symbol::Resolved(decl.clone()));
        self.owners.push(decl.path.clone());
        self.self_bindings.push(MethodScope::Class);
        self.locals.push(FxHashMap::default());
        if let Some(body) = node.children.last().filter(|c| c.kind == NodeKind::Body) {
            self.walk(session, body);
        }
        self.locals.pop();
        self.self_bindings.pop();
        self.owners.pop();
        self.namespaces.pop();
    }

    /// A class node's optional second child names the superclass.
    fn superclass_node<'n>(&self, node: &'n AstNode) -> Option<&'n AstNode> {
        node.child(1).filter(|c| c.kind != NodeKind::Body)
    }

    /// Resolves the superclass expression in the enclosing scope and records
    /// the use site. An unresolved superclass still yields a usable path
    /// through the placeholder.
    fn resolve_superclass(&mut self, session: &mut Session, node: &AstNode) -> String {
        let Some(text) = node.path_text() else {
            warn!("superclass clause is not a constant path");
            return String::new();
        };
        let namespace = self.namespace().clone();
        let symbol = session
            .resolve(Some(&namespace), &text, false, true, None)
            .unwrap_or_else(|| Symbol::placeholder(namespace.path(), &text, None));
        let path = symbol.path().to_string();
        session.add_reference(Reference::new(symbol, self.reference_site(node).key()));
        path
    }

    /// References hang off the innermost constant node of a qualified name,
    /// matching where inference looks them up.
    fn reference_site<'n>(&self, node: &'n AstNode) -> &'n AstNode {
        match node.kind {
            NodeKind::VarRef => node.child(0).unwrap_or(node),
            NodeKind::ConstPath => node.child(1).unwrap_or(node),
            _ => node,
        }
    }

    fn walk_def(&mut self, session: &mut Session, node: &AstNode) {
        let Some(name) = node.child(0).and_then(AstNode::text) else {
            warn!("method definition without a name");
            return;
        };
        let namespace = self.namespace_path();
        let path = method_path(&namespace, MethodScope::Instance, name);
        let decl = session.register(
            Declaration::new(&path, name, SymbolKind::Method, Some(&namespace))
                .with_node(node)
                .with_method_scope(MethodScope::Instance),
        );
        debug!(path = %decl.path, "registered method");
        self.walk_method_body(session, node.child(1), decl.path.clone(), MethodScope::Instance);
    }

    fn walk_defs(&mut self, session: &mut Session, node: &AstNode) {
        let Some(name) = node.child(1).and_then(AstNode::text) else {
            warn!("method definition without a name");
            return;
        };
        // A constant receiver is itself a use site.
        if let Some(receiver) = node.child(0)
            && receiver.path_text().is_some()
        {
            self.reference_constant(session, receiver);
        }
        let namespace = self.namespace_path();
        let path = method_path(&namespace, MethodScope::Class, name);
        let decl = session.register(
            Declaration::new(&path, name, SymbolKind::Method, Some(&namespace))
                .with_node(node)
                .with_method_scope(MethodScope::Class),
        );
        debug!(path = %decl.path, "registered class-level method");
        self.walk_method_body(session, node.child(2), decl.path.clone(), MethodScope::Class);
    }

    fn walk_method_body(
        &mut self,
        session: &mut Session,
        body: Option<&AstNode>,
        owner: Arc<str>,
        binding: MethodScope,
    ) {
        let Some(body) = body else { return };
        self.owners.push(owner);
        self.self_bindings.push(binding);
        self.locals.push(FxHashMap::default());
        self.walk(session, body);
        self.locals.pop();
        self.self_bindings.pop();
        self.owners.pop();
    }

    fn walk_assign(&mut self, session: &mut Session, node: &AstNode) {
        if let Some(target) = node.child(0) {
            self.register_assignment_target(session, target);
        }
        if let Some(value) = node.child(1) {
            self.walk(session, value);
        }
    }

    fn register_assignment_target(&mut self, session: &mut Session, target: &AstNode) {
        match target.kind {
            NodeKind::Ident => {
                let Some(name) = target.text() else { return };
                let owner = self.owners.last().unwrap().clone();
                let path = format!("{owner}{LSEP}{name}");
                let decl = session.register(
                    Declaration::new(&path, name, SymbolKind::LocalVariable, Some(&owner))
                        .with_node(target),
                );
                let symbol = Symbol::Resolved(decl);
                self.locals
                    .last_mut()
                    .unwrap()
                    .insert(Arc::from(name), symbol.clone());
                session.add_reference(Reference::new(symbol, target.key()));
            }
            NodeKind::IVar | NodeKind::CVar => {
                let Some(name) = target.text() else { return };
                let namespace = self.namespace_path();
                let path = join_path(&namespace, NSEP, name);
                let kind = if target.kind == NodeKind::IVar {
                    SymbolKind::InstanceVariable
                } else {
                    SymbolKind::ClassVariable
                };
                let decl = session.register(
                    Declaration::new(&path, name, kind, Some(&namespace)).with_node(target),
                );
                session.add_reference(Reference::new(Symbol::Resolved(decl), target.key()));
            }
            NodeKind::Const | NodeKind::ConstPath | NodeKind::TopConst | NodeKind::VarRef => {
                let Some(text) = target.path_text() else { return };
                let name = text.rsplit(NSEP).next().unwrap_or(&text).to_string();
                let namespace = self.namespace_path();
                let path = join_path(&namespace, NSEP, text.trim_start_matches(NSEP));
                let decl = session.register(
                    Declaration::new(&path, &name, SymbolKind::Constant, Some(&namespace))
                        .with_node(target),
                );
                let site = self.reference_site(target);
                session.add_reference(Reference::new(Symbol::Resolved(decl), site.key()));
            }
            other => {
                warn!(kind = other.as_str(), "unsupported assignment target");
            }
        }
    }

    fn walk_var_ref(&mut self, session: &mut Session, node: &AstNode) {
        let Some(inner) = node.child(0) else { return };
        match inner.kind {
            NodeKind::Keyword if inner.text() == Some("self") => {
                let namespace = self.namespace().clone();
                session.add_reference(Reference::new(namespace, inner.key()));
            }
            NodeKind::Ident => {
                let Some(name) = inner.text() else { return };
                if let Some(symbol) = self.lookup_local(name) {
                    session.add_reference(Reference::new(symbol, inner.key()));
                } else if let Some(symbol) = {
                    let namespace = self.namespace().clone();
                    session.resolve(Some(&namespace), name, false, false, None)
                } {
                    session.add_reference(Reference::new(symbol, inner.key()));
                } else {
                    debug!(name, "unresolved bare identifier");
                }
            }
            NodeKind::Const => {
                self.reference_constant(session, node);
            }
            NodeKind::IVar | NodeKind::CVar => {
                let Some(name) = inner.text() else { return };
                let namespace = self.namespace().clone();
                let symbol = session
                    .resolve(Some(&namespace), name, false, true, None)
                    .unwrap_or_else(|| Symbol::placeholder(namespace.path(), name, None));
                session.add_reference(Reference::new(symbol, inner.key()));
            }
            _ => {}
        }
    }

    fn lookup_local(&self, name: &str) -> Option<Symbol> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }

    /// Resolves a constant expression (`Widget`, `A::B`, `::Top`) in the
    /// current scope and records the use site, falling back to a
    /// placeholder.
    fn reference_constant(&mut self, session: &mut Session, node: &AstNode) -> Option<Symbol> {
        let text = node.path_text()?;
        let namespace = self.namespace().clone();
        let symbol = session
            .resolve(Some(&namespace), &text, false, true, None)
            .unwrap_or_else(|| Symbol::placeholder(namespace.path(), &text, None));
        session.add_reference(Reference::new(
            symbol.clone(),
            self.reference_site(node).key(),
        ));
        Some(symbol)
    }

    fn walk_top_const(&mut self, session: &mut Session, node: &AstNode) {
        let Some(text) = node.path_text() else { return };
        let namespace = self.namespace().clone();
        let symbol = session
            .resolve(Some(&namespace), &text, false, true, None)
            .unwrap_or_else(|| Symbol::placeholder("", &text, None));
        // Inference reads the anchored form off the outer node.
        session.add_reference(Reference::new(symbol, node.key()));
    }

    fn walk_const_path(&mut self, session: &mut Session, node: &AstNode) {
        if let Some(qualifier) = node.child(0) {
            match qualifier.kind {
                NodeKind::ConstPath | NodeKind::TopConst => self.walk(session, qualifier),
                NodeKind::Const | NodeKind::VarRef => {
                    self.reference_constant(session, qualifier);
                }
                _ => {}
            }
        }
        self.reference_constant(session, node);
    }

    fn walk_call(&mut self, session: &mut Session, node: &AstNode) {
        let receiver = node.child(0);
        if let Some(receiver) = receiver {
            self.walk(session, receiver);
        }
        let Some(ident) = node.child(1).filter(|c| c.kind == NodeKind::Ident) else {
            return;
        };
        let Some(name) = ident.text() else { return };

        let (receiver_object, scope) = self.receiver_object(session, receiver);
        match receiver_object {
            Some(object) if object.kind().is_some_and(|k| k.is_namespace()) => {
                let prefixed = format!("{}{name}", scope.separator());
                let symbol = session
                    .resolve(Some(&object), &prefixed, true, true, None)
                    .unwrap_or_else(|| Symbol::placeholder(object.path(), &prefixed, None));
                session.add_reference(Reference::new(symbol, ident.key()));
            }
            _ => {
                // Receiver type unknown lexically; leave a placeholder so
                // inference can retry through the receiver's inferred types.
                let placeholder =
                    Symbol::placeholder(&self.namespace_path(), &format!("#{name}"), None);
                session.add_reference(Reference::new(placeholder, ident.key()));
            }
        }
    }

    /// The lexically-known receiver of a call: the current namespace for
    /// `self`, a resolved namespace for constant receivers, nothing
    /// otherwise.
    fn receiver_object(
        &mut self,
        session: &mut Session,
        receiver: Option<&AstNode>,
    ) -> (Option<Symbol>, MethodScope) {
        let Some(receiver) = receiver else {
            return (None, MethodScope::Instance);
        };
        if let NodeKind::VarRef = receiver.kind
            && let Some(inner) = receiver.child(0)
            && inner.kind == NodeKind::Keyword
            && inner.text() == Some("self")
        {
            let scope = *self.self_bindings.last().unwrap();
            return (Some(self.namespace().clone()), scope);
        }
        if receiver.path_text().is_some() {
            let symbol = session.get_object_for_ast_node(self.reference_site(receiver));
            return (symbol, MethodScope::Class);
        }
        (None, MethodScope::Instance)
    }

    fn walk_local_call(&mut self, session: &mut Session, node: &AstNode) {
        let Some(ident) = node.child(0).filter(|c| c.kind == NodeKind::Ident) else {
            return;
        };
        let Some(name) = ident.text() else { return };
        let binding = *self.self_bindings.last().unwrap();
        let prefixed = format!("{}{name}", binding.separator());
        let namespace = self.namespace().clone();
        let symbol = session
            .resolve(Some(&namespace), &prefixed, true, true, Some(SymbolKind::Method))
            .unwrap_or_else(|| Symbol::placeholder(namespace.path(), &prefixed, None));
        session.add_reference(Reference::new(symbol, ident.key()));
    }
}
