//! Logging setup.
//!
//! Installs a `tracing-subscriber` formatter on stderr so log lines never
//! mix with answers printed to stdout. The filter comes from `RIVAL_LOG`,
//! then `RUST_LOG`, then the `default_level` passed by the command.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "RIVAL_LOG";

/// Initialize the global subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init_logging(default_level: &str) {
    let env_filter = build_filter(
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
        default_level,
    );

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .ok();
}

fn build_filter(
    rival_log: Option<String>,
    rust_log: Option<String>,
    default_level: &str,
) -> EnvFilter {
    [rival_log, rust_log]
        .into_iter()
        .flatten()
        .filter(|directive| !directive.trim().is_empty())
        .find_map(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default_filter(default_level)))
}

fn default_filter(level: &str) -> String {
    format!("{level},rival_radar={level},rival_radar_core={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rival_log_wins_over_rust_log() {
        let f = build_filter(Some("debug".into()), Some("error".into()), "warn");
        let shown = f.to_string();
        assert!(shown.contains("debug") && !shown.contains("error"));
    }

    #[test]
    fn invalid_directive_falls_through() {
        let f = build_filter(Some("rival=notalevel".into()), Some("error".into()), "warn");
        assert!(f.to_string().contains("error"));
    }

    #[test]
    fn default_level_applies_without_env() {
        let f = build_filter(None, Some("  ".into()), "info");
        assert!(f.to_string().contains("rival_radar=info"));
    }
}
