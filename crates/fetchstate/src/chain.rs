#![forbid(unsafe_code)]

//! The configuration chain: factory → binder → base options → invocation.
//!
//! Each stage is an immutable record that produces the next stage:
//!
//! ```text
//! create_use_request(spawner, FactoryOptions)   -> RequestFactory
//!   .bind(request_fn)                           -> Binder
//!   .with_options(BaseOptions)                  -> ApiStage
//!   .params(..) / .observe(..) / .supply(..)    -> OptionsStage
//!   .with_options(CallOptions)                  -> UseRequest
//! ```
//!
//! An [`ApiStage`] owns the base-layer sticky finished flag. Every
//! controller it spawns references that one cell, so the base `on_finish`
//! fires once across all of them.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use fetchstate_reactive::{Observable, Source};
use futures::FutureExt;
use futures::task::LocalSpawn;

use crate::controller::{ControllerParts, RequestController, RequestFn, SettleFn};
use crate::error::IntoRequestError;
use crate::handle::{RequestState, ResultHandle};
use crate::options::{BaseOptions, CallOptions, Callback, Convert, FactoryOptions, Scalars};
use crate::trigger;

/// Entry point: fix the executor and the response family.
pub fn create_use_request<R, B>(
    spawner: impl LocalSpawn + 'static,
    options: FactoryOptions<R, B>,
) -> RequestFactory<R, B> {
    RequestFactory {
        spawner: Rc::new(spawner),
        options,
    }
}

// ── Factory ─────────────────────────────────────────────────────────────────

/// Builds binders for request functions whose responses are `R`.
pub struct RequestFactory<R, B> {
    spawner: Rc<dyn LocalSpawn>,
    options: FactoryOptions<R, B>,
}

impl<R, B> Clone for RequestFactory<R, B> {
    fn clone(&self) -> Self {
        Self {
            spawner: Rc::clone(&self.spawner),
            options: self.options.clone(),
        }
    }
}

impl<R, B> fmt::Debug for RequestFactory<R, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFactory").finish_non_exhaustive()
    }
}

impl<R: Clone + 'static, B: 'static> RequestFactory<R, B> {
    /// Bind one request function.
    ///
    /// The function's rejection reason is normalized through
    /// [`IntoRequestError`].
    pub fn bind<P, F, Fut, E>(&self, request: F) -> Binder<P, R, B>
    where
        P: 'static,
        F: Fn(P) -> Fut + 'static,
        Fut: Future<Output = Result<R, E>> + 'static,
        E: IntoRequestError + 'static,
    {
        let request: RequestFn<P, R> = Rc::new(move |params| {
            request(params)
                .map(|outcome| outcome.map_err(IntoRequestError::into_request_error))
                .boxed_local()
        });
        Binder {
            spawner: Rc::clone(&self.spawner),
            extract: Rc::clone(&self.options.data_extract),
            request,
        }
    }
}

// ── Binder ──────────────────────────────────────────────────────────────────

/// A request function bound to a factory, awaiting base options.
pub struct Binder<P, R, B> {
    spawner: Rc<dyn LocalSpawn>,
    extract: Convert<R, B>,
    request: RequestFn<P, R>,
}

impl<P, R, B> Clone for Binder<P, R, B> {
    fn clone(&self) -> Self {
        Self {
            spawner: Rc::clone(&self.spawner),
            extract: Rc::clone(&self.extract),
            request: Rc::clone(&self.request),
        }
    }
}

impl<P, R, B> fmt::Debug for Binder<P, R, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder").finish_non_exhaustive()
    }
}

impl<P: 'static, R: Clone + 'static, B: 'static> Binder<P, R, B> {
    /// Fix the options shared by every invocation built from this stage.
    pub fn with_options<AP, D>(&self, options: BaseOptions<AP, P, B, D>) -> ApiStage<AP, R, D>
    where
        AP: 'static,
        D: Clone + 'static,
    {
        let request = Rc::clone(&self.request);
        let convert_params = options.convert_params;
        let base_request: RequestFn<AP, R> = Rc::new(move |params| request(convert_params(params)));

        let extract = Rc::clone(&self.extract);
        let convert_data = options.convert_data;
        let to_base_data: Convert<R, D> = Rc::new(move |raw| convert_data(extract(raw)));

        ApiStage {
            spawner: Rc::clone(&self.spawner),
            request: base_request,
            to_base_data,
            on_finish: options.on_finish,
            on_success: options.on_success,
            initial_data: options.initial_data,
            scalars: options.scalars,
            finished: Rc::new(Cell::new(false)),
        }
    }

    /// Base stage with identity converters and no callbacks.
    pub fn with_defaults(&self) -> ApiStage<P, R, B>
    where
        B: Clone,
    {
        self.with_options(BaseOptions::new())
    }
}

// ── Base-options stage ──────────────────────────────────────────────────────

/// Base options fixed; awaiting a parameter source per invocation.
///
/// `AP` is the parameter type invocations hand down, `D` the base-layer data.
pub struct ApiStage<AP, R, D> {
    spawner: Rc<dyn LocalSpawn>,
    request: RequestFn<AP, R>,
    to_base_data: Convert<R, D>,
    on_finish: Option<Callback<D>>,
    on_success: Option<Callback<D>>,
    initial_data: Option<D>,
    scalars: Scalars,
    finished: Rc<Cell<bool>>,
}

impl<AP, R, D: Clone> Clone for ApiStage<AP, R, D> {
    fn clone(&self) -> Self {
        Self {
            spawner: Rc::clone(&self.spawner),
            request: Rc::clone(&self.request),
            to_base_data: Rc::clone(&self.to_base_data),
            on_finish: self.on_finish.clone(),
            on_success: self.on_success.clone(),
            initial_data: self.initial_data.clone(),
            scalars: self.scalars,
            finished: Rc::clone(&self.finished),
        }
    }
}

impl<AP, R, D> fmt::Debug for ApiStage<AP, R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiStage")
            .field("scalars", &self.scalars)
            .field("finished", &self.finished.get())
            .finish_non_exhaustive()
    }
}

impl<AP: 'static, R: Clone + 'static, D: Clone + 'static> ApiStage<AP, R, D> {
    /// A fixed parameter value.
    pub fn params<CP: Clone + 'static>(&self, value: CP) -> OptionsStage<CP, AP, R, D> {
        self.source(Source::literal(value))
    }

    /// An observable parameter value; changes re-execute the request.
    pub fn observe<CP: Clone + 'static>(
        &self,
        observable: Observable<CP>,
    ) -> OptionsStage<CP, AP, R, D> {
        self.source(Source::Observable(observable))
    }

    /// A supplier called before every execute.
    pub fn supply<CP: Clone + 'static>(
        &self,
        supplier: impl Fn() -> CP + 'static,
    ) -> OptionsStage<CP, AP, R, D> {
        self.source(Source::supplier(supplier))
    }

    pub fn source<CP: Clone + 'static>(&self, source: Source<CP>) -> OptionsStage<CP, AP, R, D> {
        OptionsStage {
            api: self.clone(),
            source,
        }
    }

    /// For request functions whose parameters have a natural default, e.g. `()`.
    pub fn no_params(&self) -> OptionsStage<AP, AP, R, D>
    where
        AP: Clone + Default,
    {
        self.params(AP::default())
    }

    /// Sticky base-layer flag: true once any controller from this stage
    /// succeeded.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }
}

// ── Invocation stage ────────────────────────────────────────────────────────

/// Parameter source fixed; awaiting call options.
pub struct OptionsStage<CP, AP, R, D> {
    api: ApiStage<AP, R, D>,
    source: Source<CP>,
}

impl<CP, AP, R, D> fmt::Debug for OptionsStage<CP, AP, R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsStage")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl<CP, AP, R, D> OptionsStage<CP, AP, R, D>
where
    CP: Clone + 'static,
    AP: 'static,
    R: Clone + 'static,
    D: Clone + 'static,
{
    /// Finalize the invocation: create the controller, wire the reactive
    /// trigger, and run the immediate execute if requested.
    pub fn with_options<DD>(self, options: CallOptions<CP, AP, D, DD>) -> UseRequest<CP, R, DD>
    where
        DD: Clone + 'static,
    {
        let OptionsStage { api, source } = self;
        let scalars = api.scalars.overlay(options.scalars).resolve();

        let initial_data = match options.initial_data {
            Some(data) => Some(data),
            None => api.initial_data.clone().map(|data| (options.convert_data)(data)),
        };

        let base_request = Rc::clone(&api.request);
        let call_params = options.convert_params;
        let request: RequestFn<CP, R> =
            Rc::new(move |params| base_request(call_params(params)));

        let settle = settle_fn(&api, options.convert_data, options.on_finish, options.on_success);

        let controller = RequestController::new(ControllerParts {
            spawner: Rc::clone(&api.spawner),
            request,
            settle,
            source,
            initial_data,
            abort_previous: scalars.abort_previous,
        });

        if let Some(subscription) = trigger::watch_source(&controller, scalars.deep) {
            controller.set_trigger(subscription);
        }

        tracing::debug!(
            message = "request.setup",
            controller_id = controller.id(),
            immediate = scalars.immediate,
            deep = scalars.deep,
            watching = controller.is_watching()
        );

        if scalars.immediate {
            UseRequest::Running(controller.execute())
        } else {
            UseRequest::Idle(controller)
        }
    }
}

impl<P, R, D> OptionsStage<P, P, R, D>
where
    P: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
{
    /// Finalize with no call-layer options.
    pub fn with_defaults(self) -> UseRequest<P, R, D> {
        self.with_options(CallOptions::new())
    }
}

fn settle_fn<AP, R, D, DD>(
    api: &ApiStage<AP, R, D>,
    call_convert: Convert<D, DD>,
    call_on_finish: Option<Callback<DD>>,
    call_on_success: Option<Callback<DD>>,
) -> SettleFn<R, DD>
where
    R: 'static,
    D: Clone + 'static,
    DD: 'static,
{
    let to_base_data = Rc::clone(&api.to_base_data);
    let base_on_finish = api.on_finish.clone();
    let base_on_success = api.on_success.clone();
    let finished = Rc::clone(&api.finished);

    Rc::new(move |raw, fire_call_finish| {
        let base_data = to_base_data(raw);
        let data = call_convert(base_data.clone());
        let fire_base_finish = !finished.replace(true);

        if fire_call_finish && let Some(on_finish) = &call_on_finish {
            on_finish(&data);
        }
        if fire_base_finish && let Some(on_finish) = &base_on_finish {
            on_finish(&base_data);
        }
        if let Some(on_success) = &base_on_success {
            on_success(&base_data);
        }
        if let Some(on_success) = &call_on_success {
            on_success(&data);
        }
        data
    })
}

// ── Outcome ─────────────────────────────────────────────────────────────────

/// What an invocation stage returns.
///
/// Without `immediate`, the idle controller. With `immediate`, the handle of
/// the execute that already started.
pub enum UseRequest<CP, R, D> {
    Idle(RequestController<CP, R, D>),
    Running(ResultHandle<R, CP, R, D>),
}

impl<CP, R, D> UseRequest<CP, R, D>
where
    CP: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
{
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }

    /// The in-flight handle, if setup executed immediately.
    pub fn into_handle(self) -> Option<ResultHandle<R, CP, R, D>> {
        match self {
            Self::Running(handle) => Some(handle),
            Self::Idle(_) => None,
        }
    }

    pub fn into_controller(self) -> RequestController<CP, R, D> {
        match self {
            Self::Idle(controller) => controller,
            Self::Running(handle) => handle.controller().clone(),
        }
    }
}

impl<CP, R, D> RequestState for UseRequest<CP, R, D>
where
    CP: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
{
    type Params = CP;
    type Response = R;
    type Data = D;

    fn controller(&self) -> &RequestController<CP, R, D> {
        match self {
            Self::Idle(controller) => controller,
            Self::Running(handle) => handle.controller(),
        }
    }
}

impl<CP, R, D> fmt::Debug for UseRequest<CP, R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle(_) => f.write_str("UseRequest::Idle(..)"),
            Self::Running(_) => f.write_str("UseRequest::Running(..)"),
        }
    }
}
