#![forbid(unsafe_code)]

//! Structured tracing emitted by the request lifecycle.

mod support;

use std::sync::{Arc, Mutex};

use fetchstate::{BaseOptions, FactoryOptions, Observable, RequestState, create_use_request};
use futures::executor::LocalPool;
use support::Deferred;
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

#[derive(Default)]
struct TraceState {
    events: Vec<String>,
    spans: Vec<String>,
}

struct TraceCapture {
    state: Arc<Mutex<TraceState>>,
}

impl<S> Layer<S> for TraceCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::Id,
        _ctx: Context<'_, S>,
    ) {
        self.state
            .lock()
            .expect("trace lock")
            .spans
            .push(attrs.metadata().name().to_string());
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg {
            message: Option<String>,
        }
        impl tracing::field::Visit for Msg {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.message = Some(value.to_string());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        let mut msg = Msg { message: None };
        event.record(&mut msg);
        if let Some(message) = msg.message {
            self.state.lock().expect("trace lock").events.push(message);
        }
    }
}

fn capture() -> (Arc<Mutex<TraceState>>, tracing::subscriber::DefaultGuard) {
    let state = Arc::new(Mutex::new(TraceState::default()));
    let subscriber = tracing_subscriber::registry().with(TraceCapture {
        state: Arc::clone(&state),
    });
    let guard = tracing::subscriber::set_default(subscriber);
    (state, guard)
}

#[test]
fn execute_and_reject_events_emitted() {
    let (state, _guard) = capture();

    let mut pool = LocalPool::new();
    let factory = create_use_request(pool.spawner(), FactoryOptions::new());
    let fake = Deferred::<u8, u8>::new();
    let req = factory.bind(fake.request()).with_defaults().params(0).with_defaults();

    let ok = req.execute();
    fake.resolve_next(1);
    let _ = pool.run_until(ok);
    let failed = req.execute();
    fake.reject_next("down");
    let _ = pool.run_until(failed);

    let snapshot = state.lock().expect("trace lock");
    let count = |name: &str| snapshot.events.iter().filter(|m| m.as_str() == name).count();
    assert_eq!(count("request.setup"), 1);
    assert_eq!(count("request.execute"), 2);
    assert_eq!(count("request.settle"), 1);
    assert_eq!(count("request.reject"), 1);
    assert!(
        snapshot.spans.iter().any(|s| s == "request.execution"),
        "expected request.execution span"
    );
}

#[test]
fn abort_and_discard_events_emitted() {
    let (state, _guard) = capture();

    let mut pool = LocalPool::new();
    let factory = create_use_request(pool.spawner(), FactoryOptions::new());
    let fake = Deferred::<u8, u8>::new();
    let req = factory
        .bind(fake.request())
        .with_options(BaseOptions::new().abort_previous(true))
        .params(0)
        .with_defaults();

    let _first = req.execute();
    let _second = req.execute();
    req.abort();
    pool.run_until_stalled();

    let snapshot = state.lock().expect("trace lock");
    assert!(snapshot.events.iter().any(|m| m == "request.abort_previous"));
    assert!(snapshot.events.iter().any(|m| m == "request.abort"));
    assert!(snapshot.events.iter().any(|m| m == "request.discarded"));
}

#[test]
fn trigger_event_emitted_on_observed_change() {
    let (state, _guard) = capture();

    let mut pool = LocalPool::new();
    let factory = create_use_request(pool.spawner(), FactoryOptions::new());
    let fake = Deferred::<u8, u8>::new();
    let page = Observable::new(0u8);
    let req = factory.bind(fake.request()).with_defaults().observe(page.clone()).with_defaults();

    page.set(1);
    assert!(req.is_loading());
    pool.run_until_stalled();

    let snapshot = state.lock().expect("trace lock");
    assert!(snapshot.events.iter().any(|m| m == "request.trigger"));
    assert!(snapshot.events.iter().any(|m| m == "observable.notify"));
}
