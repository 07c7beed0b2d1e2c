//! Tracing setup.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: OnceLock<()> = OnceLock::new();

/// Install the global tracing subscriber. Safe to call more than once;
/// only the first call takes effect.
///
/// `RUST_LOG` controls the filter (default `info`); `CURATOR_LOG_FORMAT=json`
/// switches to JSON lines for log shippers.
pub fn init_tracing() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let json = std::env::var("CURATOR_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if json {
            fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(false)
                .init();
        } else {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    });
}
