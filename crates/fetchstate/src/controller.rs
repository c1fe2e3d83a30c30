#![forbid(unsafe_code)]

//! Per-invocation execution controller.
//!
//! A [`RequestController`] owns the lifecycle state of one invocation
//! (`is_loading`, `is_finished`, `is_aborted`, `response`, `data`, `error`)
//! and the `execute` operation that drives it.
//!
//! # State machine
//!
//! ```text
//! Idle ──execute──▶ Loading ──fulfil──▶ Settled-Success ──▶ Idle
//!                      │
//!                      └─────reject──▶ Settled-Error ──────▶ Idle
//! ```
//!
//! # Invariants
//!
//! 1. `error` is cleared and `is_aborted` reset at the start of every execute.
//! 2. `is_loading` is set before the request starts and cleared on every
//!    settlement, success or failure.
//! 3. A failed execution never touches `response` or `data`.
//! 4. The call-layer `on_finish` fires at most once per controller, even
//!    across [`reset`](RequestController::reset).
//! 5. State commits happen only inside the settlement of a tracked
//!    execution. Executions abandoned by `abort`/`reset` commit nothing.
//!
//! # Concurrency
//!
//! Everything runs on one thread. Settlements are spawned onto the
//! factory's [`LocalSpawn`] so state commits happen whether or not the
//! returned handle is awaited. Overlapping executions settle independently:
//! without `abort_previous`, the last one to settle wins.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use fetchstate_reactive::{Observable, Source, Subscription};
use futures::future::{AbortHandle, Aborted, LocalBoxFuture, abortable};
use futures::task::{LocalSpawn, LocalSpawnExt};
use futures::FutureExt;
use tracing::Instrument;

use crate::error::{RequestError, Result};
use crate::handle::ResultHandle;

pub(crate) type RequestFn<P, R> = Rc<dyn Fn(P) -> LocalBoxFuture<'static, Result<R>>>;

/// Turns a raw response into final data and fires the layer callbacks.
/// The flag says whether the call-layer `on_finish` may fire.
pub(crate) type SettleFn<R, D> = Rc<dyn Fn(R, bool) -> D>;

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

fn next_controller_id() -> u64 {
    NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Everything the chain hands over when it finalizes an invocation.
pub(crate) struct ControllerParts<CP, R, D> {
    pub spawner: Rc<dyn LocalSpawn>,
    pub request: RequestFn<CP, R>,
    pub settle: SettleFn<R, D>,
    pub source: Source<CP>,
    pub initial_data: Option<D>,
    pub abort_previous: bool,
}

struct StateCells<R, D> {
    is_loading: Observable<bool>,
    is_finished: Observable<bool>,
    is_aborted: Observable<bool>,
    response: Observable<Option<R>>,
    data: Observable<Option<D>>,
    error: Observable<Option<RequestError>>,
}

struct InFlight {
    execution: u64,
    handle: AbortHandle,
}

struct ControllerInner<CP, R, D> {
    id: u64,
    spawner: Rc<dyn LocalSpawn>,
    request: RequestFn<CP, R>,
    settle: SettleFn<R, D>,
    source: Source<CP>,
    initial_data: Option<D>,
    abort_previous: bool,
    state: StateCells<R, D>,
    finish_fired: Cell<bool>,
    in_flight: RefCell<Vec<InFlight>>,
    next_execution: Cell<u64>,
    trigger: RefCell<Option<Subscription>>,
}

/// Lifecycle state and `execute` for one invocation.
///
/// Cloning creates another handle to the **same** state cells.
pub struct RequestController<CP, R, D> {
    inner: Rc<ControllerInner<CP, R, D>>,
}

impl<CP, R, D> Clone for RequestController<CP, R, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<CP, R, D> fmt::Debug for RequestController<CP, R, D>
where
    CP: Clone + 'static,
    R: Clone + fmt::Debug + 'static,
    D: Clone + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = &self.inner.state;
        f.debug_struct("RequestController")
            .field("id", &self.inner.id)
            .field("is_loading", &state.is_loading.get())
            .field("is_finished", &state.is_finished.get())
            .field("is_aborted", &state.is_aborted.get())
            .field("response", &state.response.get())
            .field("data", &state.data.get())
            .field("error", &state.error.get())
            .finish()
    }
}

/// Point-in-time copy of a controller's state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RequestSnapshot<R, D> {
    pub is_loading: bool,
    pub is_finished: bool,
    pub is_aborted: bool,
    pub response: Option<R>,
    pub data: Option<D>,
    pub error: Option<String>,
}

impl<CP, R, D> RequestController<CP, R, D>
where
    CP: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
{
    pub(crate) fn new(parts: ControllerParts<CP, R, D>) -> Self {
        let state = StateCells {
            is_loading: Observable::new(false),
            is_finished: Observable::new(false),
            is_aborted: Observable::new(false),
            response: Observable::new(None),
            data: Observable::new(parts.initial_data.clone()),
            error: Observable::new(None),
        };
        Self {
            inner: Rc::new(ControllerInner {
                id: next_controller_id(),
                spawner: parts.spawner,
                request: parts.request,
                settle: parts.settle,
                source: parts.source,
                initial_data: parts.initial_data,
                abort_previous: parts.abort_previous,
                state,
                finish_fired: Cell::new(false),
                in_flight: RefCell::new(Vec::new()),
                next_execution: Cell::new(0),
                trigger: RefCell::new(None),
            }),
        }
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Execute with the current value of the captured parameter source.
    pub fn execute(&self) -> ResultHandle<R, CP, R, D> {
        let params = self.inner.source.to_value();
        self.execute_with(params)
    }

    /// Execute with explicit parameters.
    ///
    /// Never fails synchronously: a rejected request surfaces through
    /// `error` and through the returned handle.
    pub fn execute_with(&self, params: CP) -> ResultHandle<R, CP, R, D> {
        let inner = &self.inner;

        if inner.abort_previous {
            let aborted = self.abort_in_flight();
            if aborted > 0 {
                tracing::debug!(
                    message = "request.abort_previous",
                    controller_id = inner.id,
                    aborted
                );
            }
        }

        inner.state.is_aborted.set(false);
        if inner.state.error.with(Option::is_some) {
            inner.state.error.replace(None);
        }

        let execution = inner.next_execution.get() + 1;
        inner.next_execution.set(execution);

        inner.state.is_loading.set(true);
        let (request, abort_handle) = abortable((inner.request)(params));
        let in_flight = {
            let mut list = inner.in_flight.borrow_mut();
            list.push(InFlight {
                execution,
                handle: abort_handle,
            });
            list.len()
        };

        tracing::debug!(
            message = "request.execute",
            controller_id = inner.id,
            execution_id = execution,
            in_flight
        );

        let span = tracing::debug_span!(
            "request.execution",
            controller_id = inner.id,
            execution_id = execution
        );
        let owner = Rc::clone(inner);
        let settlement = async move {
            let outcome = match request.await {
                Ok(outcome) => outcome,
                Err(Aborted) => Err(RequestError::Aborted),
            };
            owner.commit(execution, &outcome);
            outcome
        }
        .instrument(span)
        .boxed_local()
        .shared();

        if let Err(err) = inner.spawner.spawn_local(settlement.clone().map(|_| ())) {
            // The handle still drives the settlement when awaited.
            tracing::warn!(
                message = "request.spawn_failed",
                controller_id = inner.id,
                execution_id = execution,
                error = %err
            );
        }

        ResultHandle::new(settlement.boxed_local(), self.clone())
    }

    /// Abandon every in-flight execution and record the abort.
    ///
    /// The pending request futures are dropped; their handles resolve to
    /// [`RequestError::Aborted`] and they commit nothing.
    pub fn abort(&self) {
        let aborted = self.abort_in_flight();
        self.inner.state.is_aborted.set(true);
        self.inner.state.is_loading.set(false);
        tracing::debug!(
            message = "request.abort",
            controller_id = self.inner.id,
            aborted
        );
    }

    /// Abandon in-flight executions and restore the initial state.
    ///
    /// The base-layer finished flag and the call-layer `on_finish` gate are
    /// sticky and survive a reset.
    pub fn reset(&self) {
        let aborted = self.abort_in_flight();
        let state = &self.inner.state;
        state.is_loading.set(false);
        state.is_finished.set(false);
        state.is_aborted.set(false);
        if state.response.with(Option::is_some) {
            state.response.replace(None);
        }
        state.data.replace(self.inner.initial_data.clone());
        if state.error.with(Option::is_some) {
            state.error.replace(None);
        }
        tracing::debug!(
            message = "request.reset",
            controller_id = self.inner.id,
            aborted
        );
    }

    fn abort_in_flight(&self) -> usize {
        let pending = std::mem::take(&mut *self.inner.in_flight.borrow_mut());
        for entry in &pending {
            entry.handle.abort();
        }
        pending.len()
    }

    // ── State ────────────────────────────────────────────────────────

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.is_loading.get()
    }

    /// Sticky: true after the first success until [`reset`](Self::reset).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.state.is_finished.get()
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.inner.state.is_aborted.get()
    }

    /// Raw response of the last successful execution.
    #[must_use]
    pub fn response(&self) -> Option<R> {
        self.inner.state.response.get()
    }

    /// Converted data of the last successful execution, or the initial data.
    #[must_use]
    pub fn data(&self) -> Option<D> {
        self.inner.state.data.get()
    }

    #[must_use]
    pub fn error(&self) -> Option<RequestError> {
        self.inner.state.error.get()
    }

    pub fn is_loading_cell(&self) -> &Observable<bool> {
        &self.inner.state.is_loading
    }

    pub fn is_finished_cell(&self) -> &Observable<bool> {
        &self.inner.state.is_finished
    }

    pub fn is_aborted_cell(&self) -> &Observable<bool> {
        &self.inner.state.is_aborted
    }

    pub fn response_cell(&self) -> &Observable<Option<R>> {
        &self.inner.state.response
    }

    pub fn data_cell(&self) -> &Observable<Option<D>> {
        &self.inner.state.data
    }

    pub fn error_cell(&self) -> &Observable<Option<RequestError>> {
        &self.inner.state.error
    }

    #[must_use]
    pub fn snapshot(&self) -> RequestSnapshot<R, D> {
        RequestSnapshot {
            is_loading: self.is_loading(),
            is_finished: self.is_finished(),
            is_aborted: self.is_aborted(),
            response: self.response(),
            data: self.data(),
            error: self.error().map(|err| err.message()),
        }
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// Unique identifier (for tracing/logging).
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Number of executions that have not settled or been abandoned.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.borrow().len()
    }

    pub fn source(&self) -> &Source<CP> {
        &self.inner.source
    }

    /// Whether an observable parameter source re-triggers this controller.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.inner.trigger.borrow().is_some()
    }

    /// Whether both handles share the same state cells.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_trigger(&self, subscription: Subscription) {
        *self.inner.trigger.borrow_mut() = Some(subscription);
    }

    pub(crate) fn downgrade(&self) -> WeakController<CP, R, D> {
        WeakController {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<CP, R, D> ControllerInner<CP, R, D>
where
    CP: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
{
    fn commit(&self, execution: u64, outcome: &Result<R>) {
        let tracked = {
            let mut list = self.in_flight.borrow_mut();
            match list.iter().position(|entry| entry.execution == execution) {
                Some(index) => {
                    list.remove(index);
                    true
                }
                None => false,
            }
        };
        if !tracked {
            tracing::debug!(
                message = "request.discarded",
                controller_id = self.id,
                execution_id = execution
            );
            return;
        }

        match outcome {
            Ok(raw) => {
                let fire_finish = !self.finish_fired.replace(true);
                let data = (self.settle)(raw.clone(), fire_finish);
                self.state.response.replace(Some(raw.clone()));
                self.state.data.replace(Some(data));
                self.state.is_finished.set(true);
                tracing::debug!(
                    message = "request.settle",
                    controller_id = self.id,
                    execution_id = execution,
                    outcome = "success"
                );
            }
            Err(err) => {
                tracing::warn!(
                    message = "request.reject",
                    controller_id = self.id,
                    execution_id = execution,
                    error = %err
                );
                self.state.error.replace(Some(err.clone()));
            }
        }
        self.state.is_loading.set(false);
    }
}

/// Non-owning controller reference held by the reactive trigger.
pub(crate) struct WeakController<CP, R, D> {
    inner: Weak<ControllerInner<CP, R, D>>,
}

impl<CP, R, D> WeakController<CP, R, D> {
    pub(crate) fn upgrade(&self) -> Option<RequestController<CP, R, D>> {
        self.inner.upgrade().map(|inner| RequestController { inner })
    }
}
