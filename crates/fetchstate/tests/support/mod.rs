#![allow(dead_code)]

//! Shared fixtures: a request function whose settlements the test controls.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;

type Reply<R> = oneshot::Sender<Result<R, String>>;

/// A fake request function. Every call records its parameters and parks
/// until the test resolves or rejects it.
pub struct Deferred<P, R> {
    calls: Rc<RefCell<Vec<P>>>,
    pending: Rc<RefCell<VecDeque<Reply<R>>>>,
}

impl<P: Clone + 'static, R: 'static> Deferred<P, R> {
    pub fn new() -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            pending: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn request(&self) -> impl Fn(P) -> LocalBoxFuture<'static, Result<R, String>> + 'static {
        let calls = Rc::clone(&self.calls);
        let pending = Rc::clone(&self.pending);
        move |params| {
            calls.borrow_mut().push(params);
            let (tx, rx) = oneshot::channel();
            pending.borrow_mut().push_back(tx);
            async move {
                match rx.await {
                    Ok(outcome) => outcome,
                    Err(_) => Err("reply dropped".to_string()),
                }
            }
            .boxed_local()
        }
    }

    /// Settle the oldest pending call. Returns false if nothing was waiting
    /// or the call was abandoned.
    pub fn resolve_next(&self, value: R) -> bool {
        self.settle_front(Ok(value))
    }

    pub fn reject_next(&self, reason: &str) -> bool {
        self.settle_front(Err(reason.to_string()))
    }

    /// Settle the newest pending call.
    pub fn resolve_last(&self, value: R) -> bool {
        match self.pending.borrow_mut().pop_back() {
            Some(tx) => tx.send(Ok(value)).is_ok(),
            None => false,
        }
    }

    fn settle_front(&self, outcome: Result<R, String>) -> bool {
        match self.pending.borrow_mut().pop_front() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<P> {
        self.calls.borrow().clone()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

/// Shared call counter for callbacks.
#[derive(Clone)]
pub struct Recorder<T> {
    seen: Rc<RefCell<Vec<T>>>,
}

impl<T: Clone + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn callback(&self) -> impl Fn(&T) + 'static {
        let seen = Rc::clone(&self.seen);
        move |value: &T| seen.borrow_mut().push(value.clone())
    }

    pub fn seen(&self) -> Vec<T> {
        self.seen.borrow().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.borrow().len()
    }
}
