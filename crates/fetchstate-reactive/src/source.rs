#![forbid(unsafe_code)]

//! Parameter sources: a literal, an observable, or a supplier.

use std::fmt;
use std::rc::Rc;

use crate::observable::Observable;

/// A value that is dereferenced to its current state on demand.
pub enum Source<T> {
    /// A fixed value, cloned on every read.
    Literal(T),
    /// A shared observable; reads see the latest value.
    Observable(Observable<T>),
    /// A zero-argument supplier, called on every read.
    Supplier(Rc<dyn Fn() -> T>),
}

impl<T: Clone + 'static> Source<T> {
    /// Wrap a fixed value.
    pub fn literal(value: T) -> Self {
        Self::Literal(value)
    }

    /// Wrap a supplier closure.
    pub fn supplier(f: impl Fn() -> T + 'static) -> Self {
        Self::Supplier(Rc::new(f))
    }

    /// Current value of the source.
    #[must_use]
    pub fn to_value(&self) -> T {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Observable(obs) => obs.get(),
            Self::Supplier(f) => f(),
        }
    }

    /// The underlying observable, if this source is one.
    #[must_use]
    pub fn as_observable(&self) -> Option<&Observable<T>> {
        match self {
            Self::Observable(obs) => Some(obs),
            _ => None,
        }
    }
}

impl<T: Clone> Clone for Source<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Observable(obs) => Self::Observable(obs.clone()),
            Self::Supplier(f) => Self::Supplier(Rc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Observable(obs) => f.debug_tuple("Observable").field(obs).finish(),
            Self::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

impl<T> From<Observable<T>> for Source<T> {
    fn from(obs: Observable<T>) -> Self {
        Self::Observable(obs)
    }
}
