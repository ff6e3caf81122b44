//! Capability keys.
//!
//! A [`ServiceKey`] identifies the interface a service is registered under.
//! Keys are built from the interface type itself (`ServiceKey::of::<dyn MyApi>()`),
//! so two keys are equal exactly when they name the same Rust type.

use std::{
    any::TypeId,
    fmt,
    hash::{Hash, Hasher},
};

/// Identity of a capability interface.
///
/// Equality and hashing use the `TypeId` only; the type name is carried for
/// diagnostics (`Display`, error messages, log fields).
#[derive(Clone, Copy)]
pub struct ServiceKey {
    id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    /// Key for the interface type `T`. `T` is usually a trait object such as
    /// `dyn my_module::contract::MyApi`.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully-qualified name of the interface type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
