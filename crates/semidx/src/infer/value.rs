//! Abstract values: the mutable forward-propagation graph of inferred types.
//!
//! Each value is one program point's set of possible types plus directed
//! edges to the values that must mirror every type it receives. Values live
//! in a session-owned arena and are addressed by [`ValueId`] handles, so the
//! graph may freely contain cycles.

use crate::infer::types::Type;
use smallvec::SmallVec;
use tracing::warn;

/// Forward edges actually traversed per `add_type` call.
pub const MAX_FORWARD: usize = 10;
/// Propagation recursion bound; beyond it the propagation is dropped.
pub const MAX_DEPTH: usize = 75;

/// Stable handle of one abstract value within its session's arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ValueId(u32);

#[derive(Debug, Default)]
struct Slot {
    /// Insertion-ordered, duplicate-free.
    types: Vec<Type>,
    forward: SmallVec<[ValueId; 4]>,
    constant: bool,
}

#[derive(Debug, Default)]
pub struct ValueArena {
    slots: Vec<Slot>,
}

impl ValueArena {
    pub fn alloc(&mut self) -> ValueId {
        let id = ValueId(self.slots.len() as u32);
        self.slots.push(Slot::default());
        id
    }

    /// A fresh value pinned to exactly one type. Used for literals.
    pub fn alloc_constant(&mut self, ty: Type) -> ValueId {
        let id = self.alloc();
        self.add_type(id, ty);
        self.slots[id.0 as usize].constant = true;
        id
    }

    pub fn types(&self, id: ValueId) -> &[Type] {
        &self.slots[id.0 as usize].types
    }

    pub fn is_constant(&self, id: ValueId) -> bool {
        self.slots[id.0 as usize].constant
    }

    /// Pins the value: it accepts no further types through propagation.
    pub fn set_constant(&mut self, id: ValueId) {
        self.slots[id.0 as usize].constant = true;
    }

    /// Records `ty` for `id` (first-seen order, no duplicates) and mirrors it
    /// into the value's forward edges.
    pub fn add_type(&mut self, id: ValueId, ty: Type) {
        self.add_type_at(id, ty, 0);
    }

    fn add_type_at(&mut self, id: ValueId, ty: Type, depth: usize) {
        let slot = &mut self.slots[id.0 as usize];
        if !slot.types.contains(&ty) {
            slot.types.push(ty.clone());
        }
        let forward: SmallVec<[ValueId; 4]> =
            slot.forward.iter().take(MAX_FORWARD).copied().collect();
        for target in forward {
            self.add_type_into(ty.clone(), target, depth);
        }
    }

    fn add_type_into(&mut self, ty: Type, target: ValueId, depth: usize) {
        if self.slots[target.0 as usize].constant {
            panic!(
                "propagation into constant abstract value (type = {})",
                ty.path()
            );
        }
        if depth > MAX_DEPTH {
            warn!(
                depth,
                r#type = %ty.path(),
                "propagation depth bound exceeded, dropping"
            );
            return;
        }
        self.add_type_at(target, ty, depth + 1);
    }

    /// Wires `source → target` (once) and replays the source's current types
    /// into the target. Self-propagation is a no-op.
    ///
    /// # Panics
    /// If `target` is constant.
    pub fn propagate(&mut self, source: ValueId, target: ValueId) {
        if source == target {
            return;
        }
        if self.slots[target.0 as usize].constant {
            panic!("propagation target is constant");
        }
        if !self.slots[source.0 as usize].forward.contains(&target) {
            self.slots[source.0 as usize].forward.push(target);
        }
        let types = self.slots[source.0 as usize].types.clone();
        for ty in types {
            self.add_type_into(ty, target, 0);
        }
    }

    /// Comma-joined rendering of the accumulated types, in first-seen order.
    pub fn type_string(&self, id: ValueId) -> String {
        self.types(id)
            .iter()
            .map(Type::path)
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[cfg(test)]
    fn forward_len(&self, id: ValueId) -> usize {
        self.slots[id.0 as usize].forward.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::types::{INTEGER_CLASS, STRING_CLASS};

    #[test]
    fn test_add_type_dedups_in_first_seen_order() {
        let mut values = ValueArena::default();
        let v = values.alloc();
        values.add_type(v, Type::instance(INTEGER_CLASS));
        values.add_type(v, Type::instance(STRING_CLASS));
        values.add_type(v, Type::instance(INTEGER_CLASS));
        values.add_type(v, Type::class(STRING_CLASS));
        assert_eq!(values.type_string(v), "Integer#, String#, String");
    }

    #[test]
    fn test_self_propagation_is_a_noop() {
        let mut values = ValueArena::default();
        let v = values.alloc();
        values.add_type(v, Type::instance(INTEGER_CLASS));
        values.propagate(v, v);
        assert_eq!(values.forward_len(v), 0);
        assert_eq!(values.types(v).len(), 1);
    }

    #[test]
    fn test_repeated_propagation_adds_edge_once() {
        let mut values = ValueArena::default();
        let a = values.alloc();
        let b = values.alloc();
        values.propagate(a, b);
        values.propagate(a, b);
        assert_eq!(values.forward_len(a), 1);
    }

    #[test]
    fn test_propagation_replays_and_mirrors_types() {
        let mut values = ValueArena::default();
        let a = values.alloc();
        let b = values.alloc();
        values.add_type(a, Type::instance(INTEGER_CLASS));
        values.propagate(a, b);
        assert_eq!(values.type_string(b), "Integer#");
        // Later additions flow along the existing edge.
        values.add_type(a, Type::instance(STRING_CLASS));
        assert_eq!(values.type_string(b), "Integer#, String#");
    }

    #[test]
    #[should_panic(expected = "constant")]
    fn test_propagating_into_constant_value_panics() {
        let mut values = ValueArena::default();
        let a = values.alloc();
        let constant = values.alloc_constant(Type::instance(INTEGER_CLASS));
        values.propagate(a, constant);
    }

    #[test]
    fn test_cyclic_propagation_terminates_with_types_retained() {
        let mut values = ValueArena::default();
        let a = values.alloc();
        let b = values.alloc();
        values.propagate(a, b);
        values.propagate(b, a);
        values.add_type(a, Type::instance(INTEGER_CLASS));
        assert_eq!(values.type_string(a), "Integer#");
        assert_eq!(values.type_string(b), "Integer#");
    }
}
