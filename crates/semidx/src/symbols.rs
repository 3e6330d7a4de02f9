//! Declarations, placeholders and the path conventions that address them.
//!
//! Every declared entity is identified by a hierarchical path string:
//! `A::B` for namespace nesting, `A#meth` for instance members, `A.meth`
//! for class-level members and `A#meth>local` for variables local to a
//! method body. Paths are the registry's unique key space.

use crate::ast::AstNode;
use std::sync::Arc;

/// Namespace separator.
pub const NSEP: &str = "::";
/// Instance member separator.
pub const ISEP: &str = "#";
/// Class-level member separator.
pub const CSEP: &str = ".";
/// Local scope separator.
pub const LSEP: &str = ">";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Root,
    Module,
    Class,
    Method,
    Constant,
    LocalVariable,
    InstanceVariable,
    ClassVariable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Root => "root",
            SymbolKind::Module => "module",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Constant => "constant",
            SymbolKind::LocalVariable => "local_variable",
            SymbolKind::InstanceVariable => "instance_variable",
            SymbolKind::ClassVariable => "class_variable",
        }
    }

    /// Whether declarations of this kind can enclose other declarations.
    pub fn is_namespace(&self) -> bool {
        matches!(self, SymbolKind::Root | SymbolKind::Module | SymbolKind::Class)
    }
}

/// Whether a method lives on instances or on the class itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MethodScope {
    Instance,
    Class,
}

impl MethodScope {
    /// The separator that joins a method of this scope to its namespace.
    pub fn separator(&self) -> &'static str {
        match self {
            MethodScope::Instance => ISEP,
            MethodScope::Class => CSEP,
        }
    }
}

/// A declared entity registered in the session. Created once by the front
/// end's extraction pass; the registry treats the path as the unique key.
#[derive(Debug)]
pub struct Declaration {
    pub path: Arc<str>,
    pub name: Arc<str>,
    pub kind: SymbolKind,
    /// Path of the owning declaration (`""` is the root); `None` only for
    /// the root itself.
    pub namespace: Option<Arc<str>>,
    /// The defining AST node, when the declaration came from source.
    pub node: Option<Arc<AstNode>>,
    /// Meaningful for methods only.
    pub method_scope: MethodScope,
    /// Resolved path of the superclass, for classes that declare one.
    pub superclass: Option<Arc<str>>,
    /// Resolved paths of transitively included mixins, in inclusion order.
    pub mixins: Vec<Arc<str>>,
}

impl Declaration {
    pub fn new(path: &str, name: &str, kind: SymbolKind, namespace: Option<&str>) -> Self {
        Self {
            path: Arc::from(path),
            name: Arc::from(name),
            kind,
            namespace: namespace.map(Arc::from),
            node: None,
            method_scope: MethodScope::Instance,
            superclass: None,
            mixins: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: &AstNode) -> Self {
        self.node = Some(Arc::new(node.clone()));
        self
    }

    pub fn with_method_scope(mut self, scope: MethodScope) -> Self {
        self.method_scope = scope;
        self
    }

    pub fn with_superclass(mut self, superclass: &str) -> Self {
        self.superclass = Some(Arc::from(superclass));
        self
    }

    pub fn with_mixins(mut self, mixins: Vec<Arc<str>>) -> Self {
        self.mixins = mixins;
        self
    }

    pub fn is_root(&self) -> bool {
        self.kind == SymbolKind::Root
    }
}

/// Stand-in for a name that could not be resolved: remembers where the
/// lookup started, what was asked for and which kind would have matched.
#[derive(Debug)]
pub struct Placeholder {
    /// Path of the namespace the failed lookup started from.
    pub namespace: Arc<str>,
    /// Bare name, with any separator prefix stripped.
    pub name: Arc<str>,
    pub kind: Option<SymbolKind>,
    /// Combined path the placeholder stands for.
    pub path: Arc<str>,
}

impl Placeholder {
    pub fn new(namespace: &str, name: &str, kind: Option<SymbolKind>) -> Self {
        let path = placeholder_path(namespace, name);
        let bare = name
            .strip_prefix(NSEP)
            .or_else(|| name.strip_prefix(ISEP))
            .or_else(|| name.strip_prefix(CSEP))
            .unwrap_or(name);
        Self {
            namespace: Arc::from(namespace),
            name: Arc::from(bare),
            kind,
            path: Arc::from(path.as_str()),
        }
    }
}

fn placeholder_path(namespace: &str, name: &str) -> String {
    if let Some(anchored) = name.strip_prefix(NSEP) {
        anchored.to_string()
    } else if name.starts_with(ISEP) || name.starts_with(CSEP) {
        format!("{namespace}{name}")
    } else {
        join_path(namespace, NSEP, name)
    }
}

/// Either a registered declaration or a placeholder for an unresolved name.
/// Resolver entry points check the variant explicitly instead of relying on
/// downcasts.
#[derive(Debug, Clone)]
pub enum Symbol {
    Resolved(Arc<Declaration>),
    Placeholder(Arc<Placeholder>),
}

impl Symbol {
    pub fn placeholder(namespace: &str, name: &str, kind: Option<SymbolKind>) -> Self {
        Symbol::Placeholder(Arc::new(Placeholder::new(namespace, name, kind)))
    }

    pub fn path(&self) -> &str {
        match self {
            Symbol::Resolved(decl) => &decl.path,
            Symbol::Placeholder(p) => &p.path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Resolved(decl) => &decl.name,
            Symbol::Placeholder(p) => &p.name,
        }
    }

    /// `None` for placeholders whose kind was unconstrained.
    pub fn kind(&self) -> Option<SymbolKind> {
        match self {
            Symbol::Resolved(decl) => Some(decl.kind),
            Symbol::Placeholder(p) => p.kind,
        }
    }

    /// Path of the owning namespace, when one is known.
    pub fn namespace_path(&self) -> Option<&str> {
        match self {
            Symbol::Resolved(decl) => decl.namespace.as_deref(),
            Symbol::Placeholder(p) => Some(&p.namespace),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Symbol::Placeholder(_))
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Symbol::Resolved(decl) if decl.is_root())
    }

    pub fn declaration(&self) -> Option<&Arc<Declaration>> {
        match self {
            Symbol::Resolved(decl) => Some(decl),
            Symbol::Placeholder(_) => None,
        }
    }
}

/// Joins a name onto a namespace path, collapsing the empty root prefix.
pub fn join_path(namespace: &str, separator: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}{separator}{name}")
    }
}

/// Path of a method declared in `namespace` under the given scope. Unlike
/// [`join_path`], top-level methods keep their separator prefix (`#main`).
pub fn method_path(namespace: &str, scope: MethodScope, name: &str) -> String {
    format!("{namespace}{}{name}", scope.separator())
}
