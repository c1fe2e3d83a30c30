#![forbid(unsafe_code)]

//! Shared observable values with watch subscriptions.
//!
//! # Design
//!
//! [`Observable<T>`] wraps a value in shared, reference-counted storage.
//! Mutations bump a version counter and notify every live watcher. Each
//! watcher carries its own [`WatchOptions`]: a shallow watcher (`deep:
//! false`) only hears about top-level replacement, a deep watcher also hears
//! about in-place nested mutation made through [`Observable::update`].
//!
//! # Failure Modes
//!
//! - **Re-entrant update**: the closure passed to `update` runs while the
//!   value is mutably borrowed; touching the same observable from inside it
//!   panics. Subscriber callbacks do not have this restriction.
//! - **Dropped guard**: dropping the [`Subscription`] silently stops
//!   delivery; the dead entry is pruned on the next notification.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Kind of mutation that produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The whole value was replaced.
    Replaced,
    /// The value was mutated in place.
    Nested,
}

/// Per-subscription delivery options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Deliver [`Change::Nested`] notifications, not just replacements.
    pub deep: bool,
    /// Run the callback once with the current value during registration.
    pub immediate: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            deep: true,
            immediate: false,
        }
    }
}

impl WatchOptions {
    /// Set whether nested mutations are delivered.
    #[must_use]
    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    /// Set whether the callback runs once at registration.
    #[must_use]
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }
}

struct Watcher<T> {
    deep: bool,
    callback: Box<dyn Fn(&T)>,
}

struct ObservableInner<T> {
    value: T,
    version: u64,
    watchers: Vec<Weak<Watcher<T>>>,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** value.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("watchers", &inner.watchers.len())
            .finish()
    }
}

impl<T: Default + Clone + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Create an observable holding `value` at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                watchers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&self.inner.borrow().value)
    }

    /// Number of notifying mutations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of live watchers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .watchers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Whether two handles point at the same value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Replace the value and notify unconditionally.
    pub fn replace(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.value = value;
            inner.version += 1;
        }
        self.notify(Change::Replaced);
    }

    /// Deep, non-immediate watch.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.watch(WatchOptions::default(), callback)
    }

    /// Register a watcher with explicit options.
    ///
    /// With `immediate`, the callback runs once before this returns.
    pub fn watch(&self, options: WatchOptions, callback: impl Fn(&T) + 'static) -> Subscription {
        let watcher = Rc::new(Watcher {
            deep: options.deep,
            callback: Box::new(callback),
        });
        self.inner
            .borrow_mut()
            .watchers
            .push(Rc::downgrade(&watcher));

        if options.immediate {
            let current = self.get();
            (watcher.callback)(&current);
        }

        Subscription {
            _entry: watcher as Rc<dyn Any>,
        }
    }

    fn notify(&self, change: Change) {
        // Snapshot under the borrow, deliver after releasing it so callbacks
        // may freely read or write this observable.
        let (value, version, live) = {
            let mut inner = self.inner.borrow_mut();
            inner.watchers.retain(|w| w.strong_count() > 0);
            let live: Vec<Rc<Watcher<T>>> =
                inner.watchers.iter().filter_map(Weak::upgrade).collect();
            (inner.value.clone(), inner.version, live)
        };

        tracing::trace!(
            message = "observable.notify",
            version,
            nested = change == Change::Nested,
            watchers = live.len()
        );

        for watcher in live {
            if change == Change::Nested && !watcher.deep {
                continue;
            }
            (watcher.callback)(&value);
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Replace the value; no-op when equal to the current value.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify(Change::Replaced);
    }

    /// Mutate the value in place.
    ///
    /// Notifies deep watchers only if the value differs afterwards.
    ///
    /// # Panics
    ///
    /// Panics if `f` accesses this observable (re-entrant borrow).
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let before = inner.value.clone();
            f(&mut inner.value);
            let changed = inner.value != before;
            if changed {
                inner.version += 1;
            }
            changed
        };
        if changed {
            self.notify(Change::Nested);
        }
    }
}

/// RAII guard for a watcher. Dropping it unregisters the callback.
#[must_use = "dropping a Subscription unregisters the callback"]
pub struct Subscription {
    _entry: Rc<dyn Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Page {
        index: u32,
        filter: Filter,
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Filter {
        keyword: String,
    }

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let c = Rc::new(Cell::new(0));
        (Rc::clone(&c), c)
    }

    #[test]
    fn set_bumps_version_and_notifies() {
        let obs = Observable::new(1);
        let (hits, h) = counter();
        let _sub = obs.subscribe(move |_| h.set(h.get() + 1));

        obs.set(2);
        assert_eq!(obs.get(), 2);
        assert_eq!(obs.version(), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn set_same_value_is_noop() {
        let obs = Observable::new(7);
        let (hits, h) = counter();
        let _sub = obs.subscribe(move |_| h.set(h.get() + 1));

        obs.set(7);
        assert_eq!(obs.version(), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn replace_always_notifies() {
        let obs = Observable::new(7);
        let (hits, h) = counter();
        let _sub = obs.subscribe(move |_| h.set(h.get() + 1));

        obs.replace(7);
        obs.replace(7);
        assert_eq!(obs.version(), 2);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn callback_sees_new_value() {
        let obs = Observable::new(String::from("a"));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v: &String| s.borrow_mut().push(v.clone()));

        obs.set("b".into());
        obs.set("c".into());
        assert_eq!(*seen.borrow(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn deep_watcher_sees_nested_mutation() {
        let obs = Observable::new(Page::default());
        let (hits, h) = counter();
        let _sub = obs.watch(WatchOptions::default(), move |_| h.set(h.get() + 1));

        obs.update(|p| p.filter.keyword = "rust".into());
        assert_eq!(hits.get(), 1);
        assert_eq!(obs.with(|p| p.filter.keyword.clone()), "rust");
    }

    #[test]
    fn shallow_watcher_ignores_nested_mutation() {
        let obs = Observable::new(Page::default());
        let (hits, h) = counter();
        let _sub = obs.watch(WatchOptions::default().deep(false), move |_| {
            h.set(h.get() + 1)
        });

        obs.update(|p| p.index = 3);
        assert_eq!(hits.get(), 0);
        assert_eq!(obs.version(), 1);

        obs.set(Page {
            index: 4,
            ..Page::default()
        });
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn update_without_change_is_silent() {
        let obs = Observable::new(Page::default());
        let (hits, h) = counter();
        let _sub = obs.subscribe(move |_| h.set(h.get() + 1));

        obs.update(|p| p.index = 0);
        assert_eq!(hits.get(), 0);
        assert_eq!(obs.version(), 0);
    }

    #[test]
    fn immediate_runs_once_at_registration() {
        let obs = Observable::new(5);
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let _sub = obs.watch(WatchOptions::default().immediate(true), move |v| s.set(*v));
        assert_eq!(seen.get(), 5);

        obs.set(9);
        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn drop_subscription_stops_delivery() {
        let obs = Observable::new(0);
        let (hits, h) = counter();
        let sub = obs.subscribe(move |_| h.set(h.get() + 1));
        assert_eq!(obs.subscriber_count(), 1);

        obs.set(1);
        drop(sub);
        assert_eq!(obs.subscriber_count(), 0);
        obs.set(2);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn registration_order_is_preserved() {
        let obs = Observable::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = Rc::clone(&order);
        let o2 = Rc::clone(&order);
        let _a = obs.subscribe(move |_| o1.borrow_mut().push('a'));
        let _b = obs.subscribe(move |_| o2.borrow_mut().push('b'));

        obs.set(1);
        assert_eq!(*order.borrow(), vec!['a', 'b']);
    }

    #[test]
    fn callback_may_write_same_observable() {
        let obs = Observable::new(0);
        let inner = obs.clone();
        let _sub = obs.subscribe(move |v| {
            if *v < 3 {
                inner.set(v + 1);
            }
        });

        obs.set(1);
        assert_eq!(obs.get(), 3);
    }

    #[test]
    fn clones_share_value() {
        let a = Observable::new(1);
        let b = a.clone();
        b.set(2);
        assert_eq!(a.get(), 2);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Observable::new(2)));
    }

    #[test]
    fn debug_format() {
        let obs = Observable::new(42);
        let dbg = format!("{obs:?}");
        assert!(dbg.contains("Observable"));
        assert!(dbg.contains("42"));
    }
}
