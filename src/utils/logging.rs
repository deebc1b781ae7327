/// Install the process-wide tracing subscriber for the `appbridge` binary.
///
/// `level` is the value of the `--log` flag; anything unrecognised falls
/// back to `info`. Library code only emits `tracing` events and never calls
/// this itself.
pub fn init(level: &str) {
    let max = match level.trim().to_ascii_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    // a second call, as from several tests, leaves the first subscriber in place
    let _ = tracing_subscriber::fmt()
        .with_max_level(max)
        .with_target(false)
        .try_init();
}
