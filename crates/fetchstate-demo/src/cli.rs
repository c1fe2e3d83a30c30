#![forbid(unsafe_code)]

//! Command-line argument parsing for the catalog demo.
//!
//! Parses args manually to keep the binary lean.
//! Supports environment variable overrides via `FETCHSTATE_DEMO_*` prefix.

use std::env;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
fetchstate demo: walk a simulated paginated catalog

USAGE:
    fetchstate-demo [OPTIONS]

OPTIONS:
    --items=N            Catalog size (default: 23)
    --page-size=N        Items per page (default: 5)
    --pages=N            Pages to walk, starting at page 0 (default: 3)
    --fail-page=N        Make the backend reject page N
    --abort-previous     Abort an in-flight page when the cursor moves
    --compact            Print snapshots as single-line JSON
    --log=FILTER         tracing filter directive (default: info)
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    FETCHSTATE_DEMO_ITEMS           Override --items
    FETCHSTATE_DEMO_PAGE_SIZE       Override --page-size
    FETCHSTATE_DEMO_PAGES           Override --pages
    FETCHSTATE_DEMO_FAIL_PAGE       Override --fail-page
    FETCHSTATE_DEMO_ABORT_PREVIOUS  Override --abort-previous (1/true to enable)
    FETCHSTATE_DEMO_LOG             Override --log";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    /// Number of items in the simulated catalog.
    pub items: u32,
    /// Items per page.
    pub page_size: u32,
    /// Number of pages to walk.
    pub pages: u32,
    /// Page the backend rejects, if any.
    pub fail_page: Option<u32>,
    pub abort_previous: bool,
    /// Pretty-print snapshots.
    pub pretty: bool,
    /// `EnvFilter` directive.
    pub log: String,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            items: 23,
            page_size: 5,
            pages: 3,
            fail_page: None,
            abort_previous: false,
            pretty: true,
            log: "info".into(),
        }
    }
}

/// What the command line asked for.
#[derive(Debug, PartialEq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

impl Opts {
    /// Parse command-line arguments and environment variables.
    ///
    /// Environment variables take precedence over defaults but are overridden
    /// by explicit command-line flags.
    pub fn parse() -> Self {
        match Self::parse_from(|key| env::var(key).ok(), env::args().skip(1)) {
            Ok(Command::Run(opts)) => opts,
            Ok(Command::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Command::Version) => {
                println!("fetchstate-demo {VERSION}");
                process::exit(0);
            }
            Err(message) => {
                eprintln!("{message}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// Parse from an explicit environment lookup and argument list.
    pub fn parse_from(
        var: impl Fn(&str) -> Option<String>,
        args: impl IntoIterator<Item = String>,
    ) -> Result<Command, String> {
        let mut opts = Self::default();

        // Apply environment variable defaults first
        if let Some(val) = var("FETCHSTATE_DEMO_ITEMS")
            && let Ok(n) = val.parse()
        {
            opts.items = n;
        }
        if let Some(val) = var("FETCHSTATE_DEMO_PAGE_SIZE")
            && let Ok(n) = val.parse()
        {
            opts.page_size = n;
        }
        if let Some(val) = var("FETCHSTATE_DEMO_PAGES")
            && let Ok(n) = val.parse()
        {
            opts.pages = n;
        }
        if let Some(val) = var("FETCHSTATE_DEMO_FAIL_PAGE")
            && let Ok(n) = val.parse()
        {
            opts.fail_page = Some(n);
        }
        if let Some(val) = var("FETCHSTATE_DEMO_ABORT_PREVIOUS") {
            opts.abort_previous = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Some(val) = var("FETCHSTATE_DEMO_LOG") {
            opts.log = val;
        }

        // Parse command-line args (override env vars)
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Command::Help),
                "--version" | "-V" => return Ok(Command::Version),
                "--abort-previous" => opts.abort_previous = true,
                "--compact" => opts.pretty = false,
                other => {
                    if let Some(val) = other.strip_prefix("--items=") {
                        opts.items = parse_number("--items", val)?;
                    } else if let Some(val) = other.strip_prefix("--page-size=") {
                        opts.page_size = parse_number("--page-size", val)?;
                    } else if let Some(val) = other.strip_prefix("--pages=") {
                        opts.pages = parse_number("--pages", val)?;
                    } else if let Some(val) = other.strip_prefix("--fail-page=") {
                        opts.fail_page = Some(parse_number("--fail-page", val)?);
                    } else if let Some(val) = other.strip_prefix("--log=") {
                        opts.log = val.to_string();
                    } else {
                        return Err(format!("Unknown argument: {other}"));
                    }
                }
            }
        }

        if opts.page_size == 0 {
            return Err("--page-size must be at least 1".to_string());
        }
        Ok(Command::Run(opts))
    }
}

fn parse_number(flag: &str, val: &str) -> Result<u32, String> {
    val.parse()
        .map_err(|_| format!("Invalid {flag} value: {val}"))
}
