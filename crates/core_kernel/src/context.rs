//! Request-scoped context
//!
//! A [`Context`] carries request-scoped values (the authenticated user, the active
//! database transaction, ...) down a call chain without threading each of them
//! through every function signature.
//!
//! Contexts are immutable. [`Context::with_value`] returns a *derived* context and
//! leaves the receiver untouched, so a value bound for a nested call is invisible
//! to code that keeps using the parent context after the call returns.
//!
//! Values are keyed by their type: each crate that stores something in a context
//! defines a private wrapper type for it, which makes the key impossible to
//! collide with or to overwrite from outside that crate.
//!
//! # Example
//!
//! ```rust
//! use core_kernel::Context;
//!
//! #[derive(Debug, PartialEq)]
//! struct RequestId(u64);
//!
//! let root = Context::background();
//! let child = root.with_value(RequestId(7));
//!
//! assert_eq!(child.value::<RequestId>(), Some(&RequestId(7)));
//! assert!(root.value::<RequestId>().is_none());
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Value = Arc<dyn Any + Send + Sync>;

/// Immutable, cheaply clonable bag of request-scoped values
#[derive(Clone, Default)]
pub struct Context {
    values: Arc<HashMap<TypeId, Value>>,
}

impl Context {
    /// Returns an empty root context
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a new context holding `value`
    ///
    /// A value of the same type already present in `self` is shadowed in the
    /// derived context only.
    pub fn with_value<V>(&self, value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        let mut values = (*self.values).clone();
        values.insert(TypeId::of::<V>(), Arc::new(value));
        Self {
            values: Arc::new(values),
        }
    }

    /// Returns the nearest value of type `V`, if any
    pub fn value<V>(&self) -> Option<&V>
    where
        V: Any + Send + Sync,
    {
        self.values
            .get(&TypeId::of::<V>())
            .and_then(|value| (**value).downcast_ref::<V>())
    }

    /// Returns true if a value of type `V` is bound
    pub fn contains<V>(&self) -> bool
    where
        V: Any + Send + Sync,
    {
        self.values.contains_key(&TypeId::of::<V>())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values.len())
            .finish()
    }
}
