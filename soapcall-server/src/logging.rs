use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    prelude::*,
    EnvFilter,
};

const DEFAULT_FILTER: &str =
    "soapcall_core=debug,soapcall_client=debug,soapcall_transport=debug,soapcall_server=debug,warn";

/// Initialize logging with a daily rolling file under `log_dir` and stderr output
pub fn init_logging(log_dir: impl AsRef<Path>, log_prefix: &str) -> anyhow::Result<()> {
    let log_dir_path = log_dir.as_ref();
    std::fs::create_dir_all(log_dir_path)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(log_prefix)
        .build(log_dir_path)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    // the writer flushes on drop; it has to outlive every span
    std::mem::forget(guard);

    tracing::info!(dir = %log_dir_path.display(), "logging initialized");
    Ok(())
}

/// Console-only logging for tests; safe to call more than once
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("soapcall_client=trace,soapcall_transport=trace,debug")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_names_workspace_crates() {
        let crates = ["soapcall_core", "soapcall_transport", "soapcall_client", "soapcall_server"];
        for directive in DEFAULT_FILTER.split(',') {
            if let Some((target, _)) = directive.split_once('=') {
                assert!(crates.contains(&target), "unknown target {}", target);
            }
        }
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
