//! Name resolution: lexical namespace walk with optional inheritance.
//!
//! Lookup starts in a namespace and widens outward through the enclosing
//! namespaces to the root. With inheritance enabled, every namespace on that
//! lexical chain also contributes its ancestors (mixins first, then the
//! superclass chain). The first match wins; a miss can fall back to a
//! placeholder that records where the lookup started.

use crate::session::Session;
use crate::symbols::{Declaration, Symbol, SymbolKind, NSEP};
use std::collections::VecDeque;
use std::sync::Arc;

impl Session {
    /// Resolves `name` starting from `namespace` (the root when `None`).
    ///
    /// `name` may be a bare constant (`Widget`), a nested path
    /// (`Store::Widget`), a root-anchored path (`::Widget`) or a
    /// separator-prefixed member (`#initialize`, `.build`). With
    /// `placeholder_fallback`, a miss yields a placeholder symbol instead of
    /// `None`. A `kind` constraint discards matches of other kinds.
    pub fn resolve(
        &self,
        namespace: Option<&Symbol>,
        name: &str,
        inheritance: bool,
        placeholder_fallback: bool,
        kind: Option<SymbolKind>,
    ) -> Option<Symbol> {
        let root = self.root();
        let namespace = namespace.unwrap_or(&root);

        // A lookup rooted in an unresolved namespace cannot succeed; keep the
        // placeholder chain growing instead.
        let Some(start) = namespace.declaration() else {
            return placeholder_fallback
                .then(|| Symbol::placeholder(namespace.path(), name, kind));
        };
        let start = self.enclosing_namespace(start);

        if let Some(anchored) = name.strip_prefix(NSEP) {
            let found = self
                .at_declaration(name)
                .or_else(|| self.at_declaration(anchored))
                .filter(|d| kind_matches(d, kind))
                .cloned()
                .map(Symbol::Resolved);
            return found.or_else(|| {
                placeholder_fallback.then(|| Symbol::placeholder("", name, kind))
            });
        }

        let mut lexical = Some(start.clone());
        while let Some(scope) = lexical {
            let candidates = if inheritance {
                self.inheritance_tree(&scope)
            } else {
                vec![scope.clone()]
            };
            for candidate in candidates {
                if let Some(found) = self.partial_resolve(&candidate, name, kind) {
                    return Some(found);
                }
            }
            lexical = scope
                .namespace
                .as_deref()
                .and_then(|ns| self.at_declaration(ns))
                .cloned();
        }

        placeholder_fallback.then(|| Symbol::placeholder(&start.path, name, kind))
    }

    /// One-level lookup inside a single namespace, trying each separator in
    /// turn: nested namespace (`::`), instance member (`#`), then the name
    /// verbatim when it already carries its own separator.
    fn partial_resolve(
        &self,
        namespace: &Arc<Declaration>,
        name: &str,
        kind: Option<SymbolKind>,
    ) -> Option<Symbol> {
        let mut candidates: Vec<String> = Vec::new();
        if namespace.is_root() {
            candidates.push(name.to_string());
            if starts_like_identifier(name) {
                candidates.push(format!("#{name}"));
            }
        } else {
            for sep in [NSEP, "#", ""] {
                if sep.is_empty() && starts_like_identifier(name) {
                    continue;
                }
                candidates.push(format!("{}{sep}{name}", namespace.path));
            }
        }
        candidates.into_iter().find_map(|path| {
            self.at_declaration(&path)
                .filter(|d| kind_matches(d, kind))
                .cloned()
                .map(Symbol::Resolved)
        })
    }

    /// The nearest enclosing declaration that can hold members. Methods and
    /// variables delegate lookups to their owner.
    fn enclosing_namespace(&self, decl: &Arc<Declaration>) -> Arc<Declaration> {
        let mut current = decl.clone();
        while !current.kind.is_namespace() {
            let Some(owner) = current
                .namespace
                .as_deref()
                .and_then(|ns| self.at_declaration(ns))
            else {
                return self.root_declaration();
            };
            current = owner.clone();
        }
        current
    }

    /// The namespace itself followed by its ancestors in lookup order:
    /// mixins before the superclass at every level, breadth first. Classes
    /// always end on the universal `Object` / `BasicObject` chain, whether
    /// or not their declared superclass resolved.
    fn inheritance_tree(&self, decl: &Arc<Declaration>) -> Vec<Arc<Declaration>> {
        let mut out = vec![decl.clone()];
        let mut seen: Vec<Arc<str>> = vec![decl.path.clone()];
        let mut queue: VecDeque<Arc<str>> = VecDeque::new();
        Self::enqueue_ancestors(decl, &mut queue);
        self.drain_ancestors(&mut queue, &mut seen, &mut out);
        if decl.kind == SymbolKind::Class {
            queue.push_back(Arc::from("Object"));
            queue.push_back(Arc::from("BasicObject"));
            self.drain_ancestors(&mut queue, &mut seen, &mut out);
        }
        out
    }

    fn drain_ancestors(
        &self,
        queue: &mut VecDeque<Arc<str>>,
        seen: &mut Vec<Arc<str>>,
        out: &mut Vec<Arc<Declaration>>,
    ) {
        while let Some(path) = queue.pop_front() {
            if seen.contains(&path) {
                continue;
            }
            seen.push(path.clone());
            let Some(ancestor) = self.at_declaration(&path) else {
                continue;
            };
            if !ancestor.kind.is_namespace() {
                continue;
            }
            let ancestor = ancestor.clone();
            Self::enqueue_ancestors(&ancestor, queue);
            out.push(ancestor);
        }
    }

    fn enqueue_ancestors(decl: &Arc<Declaration>, queue: &mut VecDeque<Arc<str>>) {
        for mixin in &decl.mixins {
            queue.push_back(mixin.clone());
        }
        if let Some(superclass) = &decl.superclass {
            queue.push_back(superclass.clone());
        }
    }
}

fn kind_matches(decl: &Arc<Declaration>, kind: Option<SymbolKind>) -> bool {
    kind.is_none_or(|k| decl.kind == k)
}

fn starts_like_identifier(name: &str) -> bool {
    name.starts_with(|c: char| c.is_alphanumeric() || c == '_')
}
