//! The reference table: every recorded use site of a symbol.
//!
//! A reference pairs a target symbol (resolved or placeholder) with the node
//! that mentioned it. The table enforces one reference per node identity
//! `(file, kind, range)` and keeps per-target lists in registration order.

use crate::ast::{AstNode, NodeKey};
use crate::session::Session;
use crate::symbols::Symbol;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Reference {
    pub target: Symbol,
    pub site: NodeKey,
}

impl Reference {
    pub fn new(target: Symbol, site: NodeKey) -> Self {
        Self { target, site }
    }

    pub fn target_path(&self) -> &str {
        self.target.path()
    }
}

// Same target path at the same node: same reference.
impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.target.path() == other.target.path() && self.site == other.site
    }
}

impl Session {
    /// Records a use site. Returns `false` without side effects when a
    /// reference already exists at the same node identity.
    pub fn add_reference(&mut self, reference: Reference) -> bool {
        if self.ref_by_node.contains_key(&reference.site) {
            return false;
        }
        let target: Arc<str> = Arc::from(reference.target.path());
        self.ref_by_node
            .insert(reference.site.clone(), reference.clone());
        self.ref_by_site
            .insert(reference.site.site(), reference.clone());
        match self.references.entry(target.clone()) {
            std::collections::hash_map::Entry::Occupied(mut e) => {
                e.get_mut().push(reference);
            }
            std::collections::hash_map::Entry::Vacant(e) => {
                self.reference_targets.push(target);
                e.insert(vec![reference]);
            }
        }
        true
    }

    /// Removes one recorded reference, if present. The per-target list keeps
    /// its order; site indexes are cleared so the node can be re-referenced.
    pub fn delete_reference(&mut self, reference: &Reference) {
        let Some(existing) = self.ref_by_node.get(&reference.site) else {
            return;
        };
        if existing != reference {
            return;
        }
        self.ref_by_node.remove(&reference.site);
        self.ref_by_site.remove(&reference.site.site());
        if let Some(list) = self.references.get_mut(reference.target.path()) {
            list.retain(|r| r != reference);
        }
    }

    /// References recorded against the exact target path, oldest first.
    pub fn references_to(&self, path: &str) -> &[Reference] {
        self.references.get(path).map_or(&[], Vec::as_slice)
    }

    /// Every recorded reference, grouped by target in first-registration
    /// order.
    pub fn all_references(&self) -> impl Iterator<Item = &Reference> {
        self.reference_targets
            .iter()
            .filter_map(|target| self.references.get(target))
            .flatten()
    }

    /// The reference recorded at this exact node identity, if any.
    pub fn reference_at(&self, node: &AstNode) -> Option<&Reference> {
        self.ref_by_node.get(&node.key())
    }

    /// The object a node denotes: the target of a reference recorded at the
    /// node's site, or a declaration whose defining node occupies the same
    /// file and range.
    pub fn get_object_for_ast_node(&self, node: &AstNode) -> Option<Symbol> {
        if let Some(reference) = self.ref_by_site.get(&node.site()) {
            return Some(reference.target.clone());
        }
        let site = node.site();
        self.symbols
            .values()
            .find(|decl| {
                decl.node
                    .as_ref()
                    .is_some_and(|n| n.file == site.file && n.range == site.range)
            })
            .cloned()
            .map(Symbol::Resolved)
    }
}
