//! Logging setup for the command line client.
//!
//! Logs go to stderr so raw correction output on stdout stays clean.
//! `RUST_LOG` overrides the level picked on the command line.

use std::io;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Maps the number of `-v` flags to a default filter.
pub fn level_for_verbosity(verbose: u8) -> &'static str {
  match verbose {
    0 => "info",
    1 => "debug",
    _ => "trace",
  }
}

pub fn init_logging(default_level: &str) {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_writer(io::stderr)
    .with_target(false);

  tracing_subscriber::registry()
    .with(env_filter)
    .with(stderr_layer)
    .init();
}
