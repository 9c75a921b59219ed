//! Tracing setup for the sbomwatch daemon.
//!
//! The `[general]` section of `sbomwatch.toml` drives everything here:
//! `log_level` seeds the default filter and `log_format` picks the
//! output layer (`json` for ingestion, `pretty` for a terminal). A
//! `RUST_LOG` environment variable wins over the configured level, so
//! a single crate can be turned up without editing the config file,
//! e.g. `RUST_LOG=sbomwatch_scan_pipeline=debug`.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sbomwatch_core::config::GeneralConfig;

/// Install the global tracing subscriber.
///
/// Call once at startup, before the orchestrator spawns anything.
/// Rejects unknown `log_format` values instead of silently falling
/// back, so a typo in the config surfaces immediately.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.log_format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        "pretty" => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
        other => {
            return Err(anyhow::anyhow!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            ));
        }
    };

    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        // The error path returns before try_init, so this never touches
        // the process-global subscriber.
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..GeneralConfig::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format"), "{err}");
    }
}
