//! Subscriber setup for the `taskboard` binary. The library only emits
//! `tracing` events and never installs a subscriber itself.

use std::str::FromStr;

use anyhow::{Result, anyhow};
use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid log format: {} (expected text or json)", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LogConfig {
    pub fn new(verbose: bool, format: LogFormat) -> Self {
        let level = if verbose { "taskboard=debug,info" } else { "warn" };
        Self {
            level: level.to_string(),
            format,
        }
    }

    /// `RUST_LOG` wins over the configured level.
    fn filter(&self) -> Result<EnvFilter> {
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
                .map_err(|e| anyhow!("Invalid RUST_LOG '{}': {}", directives, e)),
            _ => EnvFilter::try_new(&self.level)
                .map_err(|e| anyhow!("Invalid log level '{}': {}", self.level, e)),
        }
    }
}

/// Install the global subscriber, writing to stderr.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = config.filter()?;
    match config.format {
        LogFormat::Text => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false);
            init_with(tracing_subscriber::registry().with(filter).with(layer))
        }
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(std::io::stderr);
            init_with(tracing_subscriber::registry().with(filter).with(layer))
        }
    }
}

fn init_with<S>(subscriber: S) -> Result<()>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_verbose_enables_debug_for_crate() {
        let quiet = LogConfig::new(false, LogFormat::Text);
        assert_eq!(quiet.level, "warn");
        let verbose = LogConfig::new(true, LogFormat::Json);
        assert_eq!(verbose.level, "taskboard=debug,info");
        assert_eq!(verbose.format, LogFormat::Json);
    }

    #[test]
    fn test_configured_levels_are_valid_directives() {
        for verbose in [false, true] {
            let config = LogConfig::new(verbose, LogFormat::Text);
            assert!(EnvFilter::try_new(&config.level).is_ok());
        }
    }
}
