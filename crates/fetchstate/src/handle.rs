#![forbid(unsafe_code)]

//! Result handles: a future and a live view of controller state in one type.
//!
//! Every `execute` returns a [`ResultHandle`]. Awaiting it yields the
//! outcome of that execution; the [`RequestState`] accessors read the
//! controller's state cells at the moment of the call. Continuations
//! (`then`, `and_then`, `catch`, `finally`) return a new handle over the
//! continued future that still points at the **same** controller, so
//! `handle.then(f).is_loading()` and `handle.is_loading()` read one cell.
//!
//! Continuation closures run when the handle is polled. State commits do not
//! depend on that: they run in the settlement spawned by `execute`.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::controller::{RequestController, RequestSnapshot};
use crate::error::{RequestError, Result};

/// Read access to controller state plus the controller operations.
///
/// Implemented by [`RequestController`], [`ResultHandle`], and
/// [`UseRequest`](crate::UseRequest).
pub trait RequestState {
    type Params: Clone + 'static;
    type Response: Clone + 'static;
    type Data: Clone + 'static;

    fn controller(&self) -> &RequestController<Self::Params, Self::Response, Self::Data>;

    fn is_loading(&self) -> bool {
        self.controller().is_loading()
    }

    fn is_finished(&self) -> bool {
        self.controller().is_finished()
    }

    fn is_aborted(&self) -> bool {
        self.controller().is_aborted()
    }

    fn response(&self) -> Option<Self::Response> {
        self.controller().response()
    }

    fn data(&self) -> Option<Self::Data> {
        self.controller().data()
    }

    fn error(&self) -> Option<RequestError> {
        self.controller().error()
    }

    fn snapshot(&self) -> RequestSnapshot<Self::Response, Self::Data> {
        self.controller().snapshot()
    }

    fn execute(
        &self,
    ) -> ResultHandle<Self::Response, Self::Params, Self::Response, Self::Data> {
        self.controller().execute()
    }

    fn execute_with(
        &self,
        params: Self::Params,
    ) -> ResultHandle<Self::Response, Self::Params, Self::Response, Self::Data> {
        self.controller().execute_with(params)
    }

    fn abort(&self) {
        self.controller().abort();
    }

    fn reset(&self) {
        self.controller().reset();
    }
}

impl<CP, R, D> RequestState for RequestController<CP, R, D>
where
    CP: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
{
    type Params = CP;
    type Response = R;
    type Data = D;

    fn controller(&self) -> &RequestController<CP, R, D> {
        self
    }
}

/// The outcome of one execution (`T`) merged with its controller's state.
#[must_use = "a ResultHandle does nothing to the outcome unless awaited; state still updates"]
pub struct ResultHandle<T, CP, R, D> {
    future: LocalBoxFuture<'static, Result<T>>,
    controller: RequestController<CP, R, D>,
}

impl<T, CP, R, D> ResultHandle<T, CP, R, D>
where
    T: 'static,
    CP: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
{
    pub(crate) fn new(
        future: LocalBoxFuture<'static, Result<T>>,
        controller: RequestController<CP, R, D>,
    ) -> Self {
        Self { future, controller }
    }

    fn chain<U: 'static>(
        self,
        next: impl FnOnce(Result<T>) -> Result<U> + 'static,
    ) -> ResultHandle<U, CP, R, D> {
        ResultHandle {
            future: self.future.map(next).boxed_local(),
            controller: self.controller,
        }
    }

    /// Map a successful outcome.
    pub fn then<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> ResultHandle<U, CP, R, D> {
        self.chain(move |outcome| outcome.map(f))
    }

    /// Map a successful outcome with a step that may itself fail.
    pub fn and_then<U: 'static>(
        self,
        f: impl FnOnce(T) -> Result<U> + 'static,
    ) -> ResultHandle<U, CP, R, D> {
        self.chain(move |outcome| outcome.and_then(f))
    }

    /// Recover from a failure.
    pub fn catch(
        self,
        f: impl FnOnce(RequestError) -> T + 'static,
    ) -> ResultHandle<T, CP, R, D> {
        self.chain(move |outcome| Ok(outcome.unwrap_or_else(f)))
    }

    /// Run `f` on settlement, passing the outcome through.
    pub fn finally(self, f: impl FnOnce() + 'static) -> ResultHandle<T, CP, R, D> {
        self.chain(move |outcome| {
            f();
            outcome
        })
    }
}

impl<T, CP, R, D> Future for ResultHandle<T, CP, R, D> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.poll_unpin(cx)
    }
}

impl<T, CP, R, D> RequestState for ResultHandle<T, CP, R, D>
where
    CP: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
{
    type Params = CP;
    type Response = R;
    type Data = D;

    fn controller(&self) -> &RequestController<CP, R, D> {
        &self.controller
    }
}

impl<T, CP, R, D> fmt::Debug for ResultHandle<T, CP, R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle").finish_non_exhaustive()
    }
}
