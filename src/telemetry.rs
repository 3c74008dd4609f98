//! Tracing initialization.
//!
//! The embedding UI owns log sinks; this module only wires a console
//! subscriber with an env-overridable filter.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

pub fn is_test_env() -> bool {
    std::env::var_os("SKEIN_TESTING").is_some() || std::env::var_os("RUST_TEST_THREADS").is_some()
}

/// Install the global subscriber. Repeated calls are no-ops.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(verbosity).into())
        .with_env_var("SKEIN_LOG")
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
