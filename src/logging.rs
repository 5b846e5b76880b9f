//! Tracing setup so binaries share one env-driven logging profile.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize logging for a binary.
///
/// Defaults to `warn` unless overridden by `VOXINPUT_LOG`. Safe to call more
/// than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::builder()
        .with_env_var("VOXINPUT_LOG")
        .with_default_directive(tracing::level_filters::LevelFilter::WARN.into())
        .from_env_lossy();

    // Events go to stderr; stdout is reserved for the IPC event stream.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
