//! Diagnostic output for the `rezip` binary.
//!
//! Library code only emits `tracing` events; this installs the subscriber.

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install a human-readable stderr subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `rezip` events at
/// `default_level` and above are shown.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rezip={default_level}")));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_ansi(std::io::stderr().is_terminal());

    // A subscriber may already be installed, e.g. by a test harness.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
