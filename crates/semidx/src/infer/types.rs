//! Nominal type values used by inference. Identity is canonical-path
//! equality: `A` (the class value), `A#` (an instance of `A`) and `A#meth`
//! (a method signature) are three distinct types.

use crate::infer::value::{ValueArena, ValueId};
use crate::symbols::MethodScope;
use std::sync::Arc;

pub const INTEGER_CLASS: &str = "Integer";
pub const STRING_CLASS: &str = "String";
pub const TRUE_CLASS: &str = "TrueClass";
pub const FALSE_CLASS: &str = "FalseClass";
pub const NIL_CLASS: &str = "NilClass";

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// The class value itself, by declaration path.
    Class(Arc<str>),
    /// An instance of the class at the given path; renders as `Path#`.
    Instance(Arc<str>),
    /// The signature of a method, with a mutable return-type value.
    Method(MethodType),
}

impl Type {
    pub fn class(path: &str) -> Self {
        Type::Class(Arc::from(path))
    }

    pub fn instance(path: &str) -> Self {
        Type::Instance(Arc::from(path))
    }

    /// Canonical rendering of this type.
    pub fn path(&self) -> String {
        match self {
            Type::Class(path) => path.to_string(),
            Type::Instance(path) => format!("{path}#"),
            Type::Method(m) => m.path(),
        }
    }
}

/// The signature of one method declaration. All `MethodType`s minted for the
/// same declaration share one return-type value (see
/// `Session::method_return_value`), so return information accumulated at any
/// site is visible at every other.
#[derive(Debug, Clone)]
pub struct MethodType {
    /// Path of the declaring namespace.
    pub namespace: Arc<str>,
    pub scope: MethodScope,
    pub name: Arc<str>,
    /// Accumulates the method's possible return types.
    pub return_type: ValueId,
}

impl MethodType {
    pub fn path(&self) -> String {
        format!("{}{}{}", self.namespace, self.scope.separator(), self.name)
    }

    /// Return values are always instance or class values; a method type
    /// inside a return-type value means a caller wired the graph wrong.
    ///
    /// # Panics
    /// On a nested method type. This is a contract violation, not a
    /// recoverable inference outcome.
    pub fn check(&self, values: &ValueArena) {
        for ty in values.types(self.return_type) {
            if matches!(ty, Type::Method(_)) {
                panic!(
                    "return type of {} contains a method type: {}",
                    self.path(),
                    ty.path()
                );
            }
        }
    }
}

// Two method types are the same type when they name the same method;
// the return-type handle is derived state, not identity.
impl PartialEq for MethodType {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.scope == other.scope && self.name == other.name
    }
}
