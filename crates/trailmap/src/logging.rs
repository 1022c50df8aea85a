//! Logging and profiling setup
//!
//! Logs go to stderr through a `fmt` layer filtered by `RUST_LOG`, so command
//! output on stdout stays machine-readable. With the `profiling` feature and
//! `ENABLE_PROFILING` set, a chrome trace is recorded as well.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Keeps the trace file open; flushes it when dropped
#[must_use = "dropping the guard stops trace recording"]
pub struct LoggingGuard {
    #[cfg(feature = "profiling")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

/// Default filter when `RUST_LOG` is not set
fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug,reqwest=info,hyper_util=info,rustls=info"
    } else {
        "info"
    }
}

/// Initialize the global subscriber.
///
/// - If RUST_LOG is not set, set a helpful default.
/// - With the `profiling` feature, `ENABLE_PROFILING` starts a chrome trace.
pub fn setup_logging() -> LoggingGuard {
    let defaulted = std::env::var("RUST_LOG").is_err();
    if defaulted {
        // Safety: single-threaded at startup
        unsafe {
            std::env::set_var("RUST_LOG", default_filter());
        }
    }

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());

    #[cfg(feature = "profiling")]
    let (chrome_layer, chrome_guard) = if std::env::var("ENABLE_PROFILING").is_ok() {
        let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new().build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let registry = tracing_subscriber::registry().with(fmt_layer);
    #[cfg(feature = "profiling")]
    let registry = registry.with(chrome_layer);
    registry.init();

    if defaulted {
        tracing::debug!("RUST_LOG set to default: {}", default_filter());
    }
    #[cfg(feature = "profiling")]
    if chrome_guard.is_some() {
        tracing::info!("ENABLE_PROFILING set - recording chrome trace");
    }

    LoggingGuard {
        #[cfg(feature = "profiling")]
        _chrome: chrome_guard,
    }
}
