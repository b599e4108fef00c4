//! Tracing subscriber setup for run drivers and tests.
//!
//! The core only emits `tracing` events. A driver calls [`init`] once at
//! startup; `RUST_LOG` overrides the default `marshal=info` filter.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "marshal=info";

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable single line events
    #[default]
    Compact,
    /// One JSON object per event, for containers and log shippers
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format '{}'. Valid values: compact, json", s),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init(format: LogFormat) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());

    match format {
        LogFormat::Json => builder
            .json()
            .with_target(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e)),
        LogFormat::Compact => builder
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e)),
    }
}

/// Subscriber writing through the test harness so output is captured per test.
/// Safe to call from every test; only the first call installs it.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}
