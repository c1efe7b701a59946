//! Chrome trace capture of the `tracing` spans.

use tracing_subscriber::prelude::*;

/// Environment variable that turns tracing on when set to `1`.
pub const TRACE_ENV: &str = "SHADOWMAPS_TRACE";

/// Write spans to `trace.json` when [`TRACE_ENV`] is `1`.
///
/// Keep the guard alive for the whole run; dropping it flushes the file.
pub fn init_tracing() -> Option<tracing_chrome::FlushGuard> {
    if std::env::var(TRACE_ENV).ok().as_deref() != Some("1") {
        return None;
    }

    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file("trace.json")
        .build();

    let subscriber = tracing_subscriber::registry().with(chrome_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }

    log::info!("Tracing to trace.json");
    Some(guard)
}
