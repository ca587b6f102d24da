use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence; otherwise `verbose` picks debug over info.
pub fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
