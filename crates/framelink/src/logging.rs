use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Install a process-wide subscriber filtered by `RUST_LOG`.
///
/// Protocol drops (foreign traffic, origin mismatches, schema failures) log
/// at trace/debug; handshake milestones at info. Calling this twice is a
/// no-op.
pub fn init_logging(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
