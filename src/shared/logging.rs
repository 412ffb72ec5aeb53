use std::path::Path;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the process-wide subscriber: a plain-text daily file under
/// `log_dir` plus colored console output.
pub fn init_logging(log_dir: &str, service_name: &str) -> Result<(), anyhow::Error> {
    // Keep the previous run's log around under a timestamped name
    let _ = rotate_logs_on_startup(log_dir, service_name);
    std::fs::create_dir_all(log_dir)?;

    // File sink, rolled over once a day
    let file_appender = rolling::daily(log_dir, format!("{service_name}.log"));
    let (non_blocking_file, file_guard) = non_blocking(file_appender);

    // Console sink
    let (non_blocking_stdout, stdout_guard) = non_blocking(std::io::stdout());

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false) // escape codes would end up in the file
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(non_blocking_stdout)
        .with_ansi(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false);

    // RUST_LOG wins over the default level
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Fails if a subscriber is already installed, e.g. a second call in one process
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    // The writers must outlive every log call in the process
    std::mem::forget(file_guard);
    std::mem::forget(stdout_guard);

    info!("Logging initialized - logs will be written to {log_dir}/{service_name}.log");

    Ok(())
}

/// Move `<log_dir>/<service_name>.log` aside as
/// `<service_name>.<YYYYmmdd_HHMMSS>.log`. Missing files are fine.
pub fn rotate_logs_on_startup(log_dir: &str, service_name: &str) -> Result<(), anyhow::Error> {
    let log_file = format!("{log_dir}/{service_name}.log");
    let log_path = Path::new(&log_file);

    if log_path.exists() {
        // Second resolution; two restarts within a second overwrite the older backup
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let backup_file = format!("{log_dir}/{service_name}.{timestamp}.log");

        std::fs::rename(&log_file, &backup_file)?;
        info!("Previous log file backed up to: {backup_file}");
    }

    Ok(())
}
