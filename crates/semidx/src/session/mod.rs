//! The session: all state of one analysis run.
//!
//! A [`Session`] owns the path-keyed declaration store, the reference table,
//! and the abstract-value arena with its caches. There is no global
//! registry; a session is an explicit value and must only be driven from
//! one logical thread of control. Nothing here locks.

pub mod references;
pub mod resolver;

use crate::ast::{AstNode, NodeKey, SiteKey};
use crate::infer::types::{NIL_CLASS, Type};
use crate::infer::value::{ValueArena, ValueId};
use crate::session::references::Reference;
use crate::symbols::{Declaration, MethodScope, Symbol, SymbolKind};
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub struct Session {
    /// Authoritative declaration store, keyed by path. Last registration of
    /// a path wins.
    symbols: FxHashMap<Arc<str>, Arc<Declaration>>,
    root: Arc<Declaration>,

    /// Per-target reference lists, in registration order.
    references: FxHashMap<Arc<str>, Vec<Reference>>,
    /// Target paths in first-registration order, for stable iteration.
    reference_targets: Vec<Arc<str>>,
    /// Dedup index: at most one reference per `(file, kind, range)`.
    ref_by_node: FxHashMap<NodeKey, Reference>,
    /// Reverse lookup from a site to the reference recorded there.
    ref_by_site: FxHashMap<SiteKey, Reference>,

    values: ValueArena,
    value_by_path: FxHashMap<Arc<str>, ValueId>,
    value_by_node: FxHashMap<NodeKey, ValueId>,
    /// Shared return-type value per method declaration path.
    method_returns: FxHashMap<Arc<str>, ValueId>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session with the root namespace and the universal superclass
    /// chain (`Object` < `BasicObject`) pre-registered.
    pub fn new() -> Self {
        let root = Arc::new(Declaration::new("", "", SymbolKind::Root, None));
        let mut session = Self {
            symbols: FxHashMap::default(),
            root: root.clone(),
            references: FxHashMap::default(),
            reference_targets: Vec::new(),
            ref_by_node: FxHashMap::default(),
            ref_by_site: FxHashMap::default(),
            values: ValueArena::default(),
            value_by_path: FxHashMap::default(),
            value_by_node: FxHashMap::default(),
            method_returns: FxHashMap::default(),
        };
        session.symbols.insert(root.path.clone(), root);
        session.register(Declaration::new(
            "BasicObject",
            "BasicObject",
            SymbolKind::Class,
            Some(""),
        ));
        session.register(
            Declaration::new("Object", "Object", SymbolKind::Class, Some(""))
                .with_superclass("BasicObject"),
        );
        session
    }

    /// Drops everything and reseeds. Equivalent to replacing the session.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Inserts or overwrites the declaration at its path.
    pub fn register(&mut self, decl: Declaration) -> Arc<Declaration> {
        let decl = Arc::new(decl);
        self.symbols.insert(decl.path.clone(), decl.clone());
        decl
    }

    pub fn root(&self) -> Symbol {
        Symbol::Resolved(self.root.clone())
    }

    pub fn root_declaration(&self) -> Arc<Declaration> {
        self.root.clone()
    }

    /// The declaration at an exact path, if registered.
    pub fn at(&self, path: &str) -> Option<Symbol> {
        self.symbols.get(path).cloned().map(Symbol::Resolved)
    }

    pub(crate) fn at_declaration(&self, path: &str) -> Option<&Arc<Declaration>> {
        self.symbols.get(path)
    }

    /// All registered declarations matching one of `kinds` (all of them when
    /// `kinds` is empty). The root is never included.
    pub fn all(&self, kinds: &[SymbolKind]) -> Vec<Arc<Declaration>> {
        self.symbols
            .values()
            .filter(|d| !d.is_root())
            .filter(|d| kinds.is_empty() || kinds.contains(&d.kind))
            .cloned()
            .collect()
    }

    // -- abstract value store ------------------------------------------------

    pub fn values(&self) -> &ValueArena {
        &self.values
    }

    pub fn new_value(&mut self) -> ValueId {
        self.values.alloc()
    }

    pub fn new_constant_value(&mut self, ty: Type) -> ValueId {
        self.values.alloc_constant(ty)
    }

    /// A fresh constant value of the built-in nil instance type.
    pub fn nil_value(&mut self) -> ValueId {
        self.values.alloc_constant(Type::instance(NIL_CLASS))
    }

    pub fn add_type(&mut self, id: ValueId, ty: Type) {
        self.values.add_type(id, ty);
    }

    pub fn propagate(&mut self, source: ValueId, target: ValueId) {
        self.values.propagate(source, target);
    }

    pub fn set_constant(&mut self, id: ValueId) {
        self.values.set_constant(id);
    }

    pub fn types(&self, id: ValueId) -> &[Type] {
        self.values.types(id)
    }

    pub fn type_string(&self, id: ValueId) -> String {
        self.values.type_string(id)
    }

    /// The cached abstract value for a declaration or placeholder, keyed by
    /// path; created lazily.
    pub fn value_for_symbol(&mut self, symbol: &Symbol) -> ValueId {
        let path: Arc<str> = Arc::from(symbol.path());
        if let Some(&id) = self.value_by_path.get(&path) {
            return id;
        }
        let id = self.values.alloc();
        self.value_by_path.insert(path, id);
        id
    }

    /// The abstract value for an AST node. With `resolve`, a node known to
    /// denote a declaration shares that declaration's value; otherwise the
    /// value is keyed by the node's own `(file, kind, range)` identity.
    pub fn value_for_node(&mut self, node: &AstNode, resolve: bool) -> ValueId {
        if resolve
            && let Some(symbol) = self.get_object_for_ast_node(node)
        {
            return self.value_for_symbol(&symbol);
        }
        let key = node.key();
        if let Some(&id) = self.value_by_node.get(&key) {
            return id;
        }
        let id = self.values.alloc();
        self.value_by_node.insert(key, id);
        id
    }

    /// The cached abstract value of a declaration path, if one was ever
    /// created. Read-only peek for serialization.
    pub fn value_for_path(&self, path: &str) -> Option<ValueId> {
        self.value_by_path.get(path).copied()
    }

    /// The shared return-type value of the method declared at `path`.
    pub fn method_return_value(&mut self, path: &Arc<str>) -> ValueId {
        if let Some(&id) = self.method_returns.get(path) {
            return id;
        }
        let id = self.values.alloc();
        self.method_returns.insert(path.clone(), id);
        id
    }

    /// Scans a receiver value's class and instance types for a method named
    /// `name`, honoring inheritance. First hit wins, in type order.
    pub fn lookup_method(&self, receiver: ValueId, name: &str) -> Option<Symbol> {
        for ty in self.values.types(receiver) {
            let class_path = match ty {
                Type::Class(path) | Type::Instance(path) => path,
                Type::Method(_) => continue,
            };
            let Some(class) = self.at(class_path) else {
                continue;
            };
            if !class.kind().is_some_and(|k| k.is_namespace()) {
                continue;
            }
            for prefixed in [format!("#{name}"), format!(".{name}")] {
                if let Some(found @ Symbol::Resolved(_)) = self.resolve(
                    Some(&class),
                    &prefixed,
                    true,
                    false,
                    Some(SymbolKind::Method),
                ) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Builds the shared-return-type method signature for a method
    /// declaration.
    ///
    /// # Panics
    /// If `decl` is not a method. Passing anything else is a caller bug.
    pub fn method_type(&mut self, decl: &Arc<Declaration>) -> crate::infer::types::MethodType {
        assert!(
            decl.kind == SymbolKind::Method,
            "method_type requires a method declaration, got {} ({})",
            decl.path,
            decl.kind.as_str()
        );
        crate::infer::types::MethodType {
            namespace: decl.namespace.clone().unwrap_or_else(|| Arc::from("")),
            scope: decl.method_scope,
            name: decl.name.clone(),
            return_type: self.method_return_value(&decl.path),
        }
    }

    /// Synthesizes the constructor signature for a `new` call on `namespace`
    /// when no explicit constructor is declared: its return type is an
    /// instance of the namespace.
    pub fn constructor_type(&mut self, namespace: &str) -> crate::infer::types::MethodType {
        let return_type = self.values.alloc();
        self.values
            .add_type(return_type, Type::instance(namespace));
        crate::infer::types::MethodType {
            namespace: Arc::from(namespace),
            scope: MethodScope::Class,
            name: Arc::from("new"),
            return_type,
        }
    }
}
