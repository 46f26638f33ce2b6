//! Tracing setup.
//!
//! Quiet by default. The configured level and per-module overrides apply
//! unless `RUST_LOG` is set, in which case that spec wins wholesale.
//!
//! ```bash
//! RUST_LOG=debug codeatlas index .
//! RUST_LOG=codeatlas::watcher=trace codeatlas watch .
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::uptime;

use crate::config::LoggingConfig;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber. Later calls are no-ops, so library users
/// who bring their own subscriber are never clobbered.
pub fn init_with_config(config: &LoggingConfig) {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let env_spec = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(resolve_filter(config, env_spec))
        .with_writer(std::io::stderr)
        .with_timer(uptime())
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Install with defaults (warn level).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

fn resolve_filter(config: &LoggingConfig, env_spec: Option<String>) -> EnvFilter {
    if let Some(spec) = env_spec {
        return EnvFilter::new(spec);
    }
    let mut filter = EnvFilter::new(&config.default);
    for (module, level) in &config.modules {
        match format!("{module}={level}").parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(err) => eprintln!("ignoring log override {module}={level}: {err}"),
        }
    }
    filter
}
