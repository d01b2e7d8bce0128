//! File logging. The terminal belongs to the TUI, so log output goes to
//! `<cache dir>/txdash/txdash.log`.

use crate::cache::CacheManager;
use color_eyre::Result;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Filter directive: RUST_LOG wins, then `--debug`, then the configured level.
pub fn filter_directive(rust_log: Option<&str>, debug_flag: bool, config_level: &str) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ if debug_flag => "debug".to_string(),
        _ => config_level.to_lowercase(),
    }
}

/// Install the global subscriber, appending to the cache log file. Calling it a
/// second time is a no-op.
pub fn init(cache: &CacheManager, debug_flag: bool, config_level: &str) -> Result<()> {
    cache.ensure_cache_dir()?;
    let log_path = cache.log_file();
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(rust_log.as_deref(), debug_flag, config_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();
    tracing::info!(path = %log_path.display(), "logging started");
    Ok(())
}
