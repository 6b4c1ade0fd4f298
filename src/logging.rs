use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. Logs go to stderr; stdout carries the summary.
///
/// `RUST_LOG` wins when set, otherwise `survey_merge=info` (or `debug` when verbose).
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("survey_merge={}", default_level)));

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    // A second init (e.g. from tests) is harmless
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
