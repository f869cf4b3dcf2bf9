use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};

#[derive(Parser, Debug, Clone)]
#[command(name = "daily-metrics-poller")]
#[command(
    about = "Poll a daily health-metrics API and upsert each day into InfluxDB",
    version
)]
pub struct Config {
    /// Base URL of the daily trend endpoint
    #[arg(long, env = "API_URL", default_value_t = default_api_url())]
    pub api_url: String,

    /// Token sent verbatim in the Authorization header
    #[arg(long, env = "API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Print a preview of every fetched day before it is stored
    #[arg(long, env = "DEBUG_MODE")]
    pub debug_mode: bool,

    /// InfluxDB base URL, e.g. http://localhost:8086
    #[arg(long, env = "INFLUX_URL")]
    pub influx_url: Option<String>,

    /// InfluxDB API token
    #[arg(long, env = "INFLUX_TOKEN", hide_env_values = true)]
    pub influx_token: Option<String>,

    /// InfluxDB organization
    #[arg(long, env = "INFLUX_ORG")]
    pub influx_org: Option<String>,

    /// InfluxDB bucket receiving the daily points
    #[arg(long, env = "INFLUX_BUCKET")]
    pub influx_bucket: Option<String>,

    /// Seconds to wait between polls
    #[arg(
        long,
        env = "POLLING_INTERVAL",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub polling_interval: u64,

    /// Per-request timeout in seconds
    #[arg(
        long,
        env = "HTTP_TIMEOUT",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub http_timeout: u64,
}

/// Connection settings for the InfluxDB backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxSettings {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

impl Config {
    pub fn api_token(&self) -> Result<&str> {
        match self.api_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(Error::Config(
                "API_TOKEN environment variable is required".to_string(),
            )),
        }
    }

    /// Backend settings, present only when all four INFLUX_* values are set.
    pub fn influx(&self) -> Option<InfluxSettings> {
        Some(InfluxSettings {
            url: non_empty(&self.influx_url)?,
            token: non_empty(&self.influx_token)?,
            org: non_empty(&self.influx_org)?,
            bucket: non_empty(&self.influx_bucket)?,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

pub fn default_api_url() -> String {
    "https://ops.ultrahuman.com/api/web_dashboard/daily_trend".to_string()
}
