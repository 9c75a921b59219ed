//! CLI argument definitions for sbomwatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Sbomwatch vulnerability scan daemon.
///
/// Schedules SBOM scans, drives the scan and result pipelines,
/// reaps timed-out scans, and delivers webhook notifications when
/// scan results change.
#[derive(Parser, Debug)]
#[command(name = "sbomwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to sbomwatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/sbomwatch/sbomwatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["sbomwatch-daemon"]);
        assert_eq!(
            cli.config,
            PathBuf::from("/etc/sbomwatch/sbomwatch.toml")
        );
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides() {
        let cli = DaemonCli::parse_from([
            "sbomwatch-daemon",
            "--config",
            "/tmp/test.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ]);
        assert_eq!(cli.config, PathBuf::from("/tmp/test.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
    }
}
