//! Counter application served over the line protocol on stdin/stdout.
//!
//! Launch it through the driver:
//!
//! ```bash
//! snapdriver run --app ./target/debug/demo_app --script demos/counter.json \
//!     --fixtures-dir demos/fixtures
//! ```
//!
//! Logs go to stderr; stdout carries protocol messages only.

use snapdriver::app::protocol::serve_stdio;
use snapdriver::demo::counter_app;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if serve_stdio(counter_app()).is_err() {
        std::process::exit(1);
    }
}
