#![forbid(unsafe_code)]

//! Managed lifecycle state around asynchronous fetch functions.
//!
//! `fetchstate` wraps an arbitrary `Fn(P) -> impl Future<Output = Result<R, E>>`
//! with loading/finished/error state, business-data extraction, layered
//! parameter and data conversion, and optional re-execution driven by an
//! observable parameter source.
//!
//! # Example
//!
//! ```
//! use fetchstate::{BaseOptions, CallOptions, FactoryOptions, RequestState, create_use_request};
//! use futures::executor::LocalPool;
//!
//! #[derive(Clone)]
//! struct Envelope {
//!     code: i32,
//!     data: String,
//! }
//!
//! let mut pool = LocalPool::new();
//! let factory = create_use_request(
//!     pool.spawner(),
//!     FactoryOptions::data_extract(|r: Envelope| r.data),
//! );
//! let greet = factory.bind(|name: String| async move {
//!     Ok::<_, String>(Envelope { code: 0, data: format!("hello {name}") })
//! });
//! let api = greet.with_options(BaseOptions::new().convert_params(|id: u32| format!("user-{id}")));
//!
//! let req = api.params(7u32).with_options(CallOptions::convert_data(|s: String| s.len()));
//! let outcome = pool.run_until(req.execute());
//! assert_eq!(outcome.map(|r| r.code).ok(), Some(0));
//! assert_eq!(req.data(), Some("hello user-7".len()));
//! assert!(!req.is_loading());
//! ```
//!
//! # Modules
//!
//! - [`options`]: immutable configuration records for each stage.
//! - [`chain`]: the factory → binder → base-options → invocation builder.
//! - [`controller`]: per-invocation state machine and `execute`.
//! - [`handle`]: the future-plus-state result handle.
//! - [`error`]: request failure type and rejection normalization.

pub mod chain;
pub mod controller;
pub mod error;
pub mod handle;
pub mod options;
mod trigger;

pub use chain::{ApiStage, Binder, OptionsStage, RequestFactory, UseRequest, create_use_request};
pub use controller::{RequestController, RequestSnapshot};
pub use error::{IntoRequestError, RequestError, Result};
pub use handle::{RequestState, ResultHandle};
pub use options::{BaseOptions, CallOptions, FactoryOptions, LayerOptions, ResolvedScalars, Scalars};

pub use fetchstate_reactive::{Observable, Source, Subscription, WatchOptions};
