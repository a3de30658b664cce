use std::sync::Arc;

use marketdesk_market_data::MarketDataClient;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogFormat};

pub struct AppState {
    pub market_data: MarketDataClient,
}

impl AppState {
    pub fn new(market_data: MarketDataClient) -> Arc<Self> {
        Arc::new(Self { market_data })
    }
}

/// Install the global subscriber. `log` records from the market data crate
/// are forwarded into it.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = match format {
        LogFormat::Json => fmt::layer().json().with_current_span(false).boxed(),
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    if config.market_data.provider.api_key.is_empty() {
        tracing::warn!("MD_PROVIDER_API_KEY is not set; provider calls will be rejected");
    }
    let market_data = MarketDataClient::from_config(config.market_data.clone())?;
    tracing::info!(
        "Market data provider at {}",
        config.market_data.provider.base_url
    );
    Ok(AppState::new(market_data))
}
