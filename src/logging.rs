//! Opt-in tracing subscriber setup.
//!
//! Library embedders install their own subscriber; binaries call
//! [`init`] once at startup. The filter honors `DRA_LOG` in env-filter
//! syntax and defaults to `info`.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a fmt subscriber honoring the `DRA_LOG` env filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env("DRA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
