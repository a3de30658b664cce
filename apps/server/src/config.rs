use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use marketdesk_market_data::{MarketDataConfig, DEFAULT_BASE_URL};

/// Output format of the tracing subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("unknown log format {other:?}, expected text or json")),
        }
    }
}

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    /// Outer HTTP timeout; should exceed the client's own request deadline.
    pub request_timeout: Duration,
    pub log_format: LogFormat,
    pub market_data: MarketDataConfig,
}

impl Config {
    /// Read `MD_*` variables, after loading a `.env` file if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = parse_or(&lookup, "MD_LISTEN_ADDR", "0.0.0.0:8080".parse()?)?;
        let cors_allow = lookup("MD_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = parse_or(&lookup, "MD_REQUEST_TIMEOUT_MS", 35_000)?;
        let log_format = parse_or(&lookup, "MD_LOG_FORMAT", LogFormat::Text)?;

        let mut market_data = MarketDataConfig::default();
        market_data.provider.base_url =
            lookup("MD_PROVIDER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        market_data.provider.api_key = lookup("MD_PROVIDER_API_KEY").unwrap_or_default();
        market_data.provider.http_timeout = Duration::from_millis(parse_or(
            &lookup,
            "MD_PROVIDER_HTTP_TIMEOUT_MS",
            market_data.provider.http_timeout.as_millis() as u64,
        )?);
        market_data.rate_limit.quota =
            parse_or(&lookup, "MD_RATE_LIMIT_QUOTA", market_data.rate_limit.quota)?;
        market_data.rate_limit.window = Duration::from_secs(parse_or(
            &lookup,
            "MD_RATE_LIMIT_WINDOW_SECS",
            market_data.rate_limit.window.as_secs(),
        )?);
        market_data.max_rate_limit_wait = Duration::from_millis(parse_or(
            &lookup,
            "MD_MAX_RATE_LIMIT_WAIT_MS",
            market_data.max_rate_limit_wait.as_millis() as u64,
        )?);
        market_data.request_timeout = Duration::from_millis(parse_or(
            &lookup,
            "MD_CLIENT_TIMEOUT_MS",
            market_data.request_timeout.as_millis() as u64,
        )?);
        market_data.retry.max_retries =
            parse_or(&lookup, "MD_MAX_RETRIES", market_data.retry.max_retries)?;
        market_data.cache.capacity =
            parse_or(&lookup, "MD_CACHE_CAPACITY", market_data.cache.capacity)?;

        market_data
            .validate()
            .context("invalid market data configuration")?;

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            log_format,
            market_data,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {key}={raw:?}: {e}")),
        _ => Ok(default),
    }
}
