//! Log subscriber setup for the command-line tool

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,carousel_dl=debug";

/// Filter used with `--verbose` when `RUST_LOG` is unset
pub const VERBOSE_FILTER: &str = "info,carousel_dl=trace";

/// Install a fmt subscriber writing to stderr
///
/// `RUST_LOG` always wins; otherwise `verbose` picks between
/// [`DEFAULT_FILTER`] and [`VERBOSE_FILTER`]. Stdout stays free for the run
/// summary. Calling this twice is harmless: the second call is ignored.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if installed.is_ok() {
        tracing::debug!(verbose, "Logging initialized");
    }
}
