use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the global subscriber once per process.
///
/// `filter` uses `RUST_LOG` syntax and wins over the environment. Records
/// emitted through `log` by the capture crates are bridged.
pub fn init(filter: Option<&str>) {
    INIT.call_once(|| {
        let filter = match filter {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };

        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init();

        if installed.is_err() {
            tracing::debug!("a global subscriber is already installed");
        }
    });
}
