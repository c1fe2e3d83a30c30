#![forbid(unsafe_code)]

//! Reactive primitives consumed by `fetchstate`.
//!
//! - [`Observable`]: a shared, version-tracked value with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`WatchOptions`]: per-subscription comparison depth and run-now flags.
//! - [`Source`]: a literal, an observable, or a zero-argument supplier,
//!   dereferenced to its current value on demand.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership. Subscribers are stored as `Weak` callbacks and cleaned up
//! lazily during notification.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that notifies.
//! 2. Subscribers are notified in registration order.
//! 3. `set` with a value equal to the current value is a no-op.
//! 4. Shallow watchers (`deep: false`) never observe [`Change::Nested`].
//! 5. No interior borrow is held while a subscriber callback runs.

pub mod observable;
pub mod source;

pub use observable::{Change, Observable, Subscription, WatchOptions};
pub use source::Source;
