//! Logging setup for the CLI.
//!
//! Logs go to stderr so stdout stays parseable. `RUST_LOG` picks the filter
//! (default `info`); `TRAILBLAZER_DEBUG_LOG=1` forces `debug`.

use std::env;

use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "TRAILBLAZER_DEBUG_LOG";

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

pub fn init() {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
