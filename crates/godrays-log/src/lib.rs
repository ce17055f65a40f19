//! Structured logging for the god rays workspace.
//!
//! Library crates log through the `log` facade; this crate installs a
//! `tracing-subscriber` registry that collects both `log` records and
//! `tracing` events. Console output carries uptime timestamps and module
//! paths, and a JSON file layer can be enabled for post-mortem analysis.

use std::path::Path;

use godrays_config::DebugConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config specify a level.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

/// Name of the JSON log file written inside the configured log directory.
pub const LOG_FILE_NAME: &str = "godrays.log";

/// Build the filter directive string from the debug config.
///
/// A bare level such as `"debug"` keeps the wgpu/naga noise suppression;
/// anything containing a directive separator is used verbatim.
pub fn filter_directives(config: Option<&DebugConfig>) -> String {
    match config {
        Some(debug) if !debug.log_level.is_empty() => {
            if debug.log_level.contains(',') || debug.log_level.contains('=') {
                debug.log_level.clone()
            } else {
                format!("{},wgpu=warn,naga=warn", debug.log_level)
            }
        }
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Initialize the global tracing subscriber.
///
/// * `config` - optional debug config providing the level and log directory
/// * `debug_build` - enables the JSON file layer when a log directory is set
///
/// `RUST_LOG` always takes precedence over the configured level.
///
/// ```no_run
/// use godrays_config::DebugConfig;
/// use godrays_log::init_logging;
///
/// init_logging(Some(&DebugConfig::default()), cfg!(debug_assertions));
/// ```
pub fn init_logging(config: Option<&DebugConfig>, debug_build: bool) {
    let filter_str = filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let log_dir = config.and_then(|c| c.log_dir.as_deref());
    if debug_build
        && let Some(log_dir) = log_dir
        && let Some(log_file) = create_log_file(log_dir)
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Create the log directory and open a fresh log file inside it.
fn create_log_file(log_dir: &Path) -> Option<std::fs::File> {
    std::fs::create_dir_all(log_dir).ok()?;
    std::fs::File::create(log_dir.join(LOG_FILE_NAME)).ok()
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
