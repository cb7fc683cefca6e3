//! Diagnostic logging for the CLI.
//!
//! Everything goes to stderr so stdout carries only the formatted result.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when set; otherwise the `--log-level` value applies to
/// the valuation crates.
fn build_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(format!(
        "warn,equity_valuation={log_level},equity_valuation_core={log_level},eqv={log_level}"
    ))
}

pub fn init_logging(log_level: &str, json: bool) {
    let subscriber = tracing_subscriber::registry().with(build_filter(log_level));

    if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::debug!(log_level = %log_level, json, "Logging initialized");
}
