// Logging module, powered by tracing-subscriber.
//
// RUST_LOG takes precedence; otherwise the level follows the debug toggle.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Third-party targets that are too chatty at the base level.
const NOISY: &[(&str, &str)] = &[
    ("sqlx", "warn"),
    ("hyper", "warn"),
    ("tower_http", "info"),
];

fn build_env_filter(debug_mode: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = if debug_mode { "debug" } else { "info" };
    let mut directives = vec![level.to_string()];
    for (target, lvl) in NOISY {
        directives.push(format!("{}={}", target, lvl));
    }
    // debug mode also shows every statement sqlx runs
    if debug_mode {
        directives.push("sqlx::query=debug".to_string());
    }
    EnvFilter::new(directives.join(","))
}

/// Install the global console subscriber. Safe to call more than once.
pub fn init_logging(debug_mode: bool) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(debug_mode))
        .with_target(true)
        .with_span_events(if debug_mode { FmtSpan::CLOSE } else { FmtSpan::NONE })
        .try_init();
    if result.is_ok() {
        tracing::trace!(debug_mode, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_follows_debug_toggle() {
        // only meaningful when RUST_LOG is not set by the test runner
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let quiet = build_env_filter(false).to_string();
        let verbose = build_env_filter(true).to_string();
        assert!(quiet.contains("info"));
        assert!(quiet.contains("sqlx=warn"));
        assert!(verbose.contains("debug"));
        assert!(verbose.contains("sqlx::query=debug"));
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(false);
        init_logging(true);
    }
}
