//! Process-wide tracing setup shared by the hotelstock binaries.

/// Initialize tracing with the format from `HOTELSTOCK_LOG_FORMAT` and the
/// filter from `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    let format = std::env::var("HOTELSTOCK_LOG_FORMAT")
        .ok()
        .and_then(|raw| tracing::LogFormat::parse(&raw))
        .unwrap_or_default();
    tracing::init(format);
}

/// Subscriber construction (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;
