use lobio::LobConfig;
use tracing_subscriber::EnvFilter;

/// Routes library logs to the test output. `RUST_LOG=lobio=trace` shows every round trip.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

pub fn chunked(chunk_size: usize) -> LobConfig {
    LobConfig::with_chunk_size(chunk_size).expect("valid chunk size")
}
