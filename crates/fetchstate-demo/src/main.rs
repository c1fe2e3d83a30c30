#![forbid(unsafe_code)]

//! Walks a simulated paginated catalog with an observable page cursor.
//!
//! The cursor is an [`Observable<u32>`]; moving it re-executes the page
//! request through the reactive trigger. Each step prints a JSON snapshot of
//! the controller state.

mod catalog;
mod cli;

use std::process;
use std::rc::Rc;

use fetchstate::{
    BaseOptions, CallOptions, FactoryOptions, Observable, RequestController, RequestSnapshot,
    create_use_request,
};
use futures::executor::LocalPool;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::catalog::{Catalog, Envelope, PageRequest};
use crate::cli::Opts;

/// Page data as the UI would consume it.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct Listing {
    count: usize,
    first: Option<String>,
    items: Vec<String>,
}

impl Listing {
    fn from_items(items: Vec<String>) -> Self {
        Self {
            count: items.len(),
            first: items.first().cloned(),
            items,
        }
    }
}

/// One printed step of the walk.
#[derive(Debug, Serialize)]
struct Frame {
    step: String,
    cursor: u32,
    in_flight: usize,
    #[serde(flatten)]
    snapshot: RequestSnapshot<Envelope, Listing>,
}

fn main() {
    let opts = Opts::parse();
    init_tracing(&opts.log);

    for frame in walk(&opts) {
        let rendered = if opts.pretty {
            serde_json::to_string_pretty(&frame)
        } else {
            serde_json::to_string(&frame)
        };
        match rendered {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("failed to render snapshot: {err}");
                process::exit(1);
            }
        }
    }
}

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|err| {
        eprintln!("Invalid log filter {directive:?}: {err}; falling back to info");
        EnvFilter::new("info")
    });
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Run the walk and collect a frame per step.
///
/// Steps: the immediate first page, one page per cursor move, then a burst
/// that moves the cursor twice before the executor runs.
fn walk(opts: &Opts) -> Vec<Frame> {
    let mut pool = LocalPool::new();
    let catalog = Rc::new(Catalog::new(
        opts.items,
        opts.fail_page.map(|page| page.saturating_mul(opts.page_size)),
    ));

    let factory = create_use_request(
        pool.spawner(),
        FactoryOptions::data_extract(|envelope: Envelope| envelope.data),
    );
    let list_page = factory.bind(move |request: PageRequest| {
        let catalog = Rc::clone(&catalog);
        async move { catalog.page(request) }
    });

    let page_size = opts.page_size;
    let api = list_page.with_options(
        BaseOptions::new()
            .convert_params(move |page: u32| PageRequest {
                offset: page.saturating_mul(page_size),
                limit: page_size,
            })
            .abort_previous(opts.abort_previous)
            .on_finish(|items: &Vec<String>| {
                tracing::info!(message = "catalog.first_load", items = items.len());
            }),
    );

    let cursor = Observable::new(0u32);
    let listing = api
        .observe(cursor.clone())
        .with_options(
            CallOptions::convert_data(Listing::from_items)
                .immediate(true)
                .on_success(|listing: &Listing| {
                    tracing::info!(
                        message = "catalog.page",
                        count = listing.count,
                        first = listing.first.as_deref().unwrap_or("-")
                    );
                }),
        )
        .into_controller();

    let mut frames = Vec::new();
    let in_flight = listing.in_flight();
    pool.run_until_stalled();
    frames.push(frame("initial", &cursor, in_flight, &listing));

    for page in 1..opts.pages {
        cursor.set(page);
        let in_flight = listing.in_flight();
        pool.run_until_stalled();
        frames.push(frame("advance", &cursor, in_flight, &listing));
    }

    if opts.pages > 1 {
        cursor.set(0);
        cursor.set(1);
        let in_flight = listing.in_flight();
        tracing::debug!(message = "catalog.burst", in_flight);
        pool.run_until_stalled();
        frames.push(frame("burst", &cursor, in_flight, &listing));
    }

    tracing::info!(
        message = "catalog.done",
        finished = listing.is_finished(),
        failed = listing.error().is_some()
    );
    frames
}

fn frame(
    step: &str,
    cursor: &Observable<u32>,
    in_flight: usize,
    listing: &RequestController<u32, Envelope, Listing>,
) -> Frame {
    Frame {
        step: step.to_string(),
        cursor: cursor.get(),
        in_flight,
        snapshot: listing.snapshot(),
    }
}
