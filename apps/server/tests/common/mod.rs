#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use marketdesk_market_data::{
    CalendarKind, CalendarQuery, MarketDataClient, MarketDataConfig, MarketDataError,
    ProviderGateway, QuoteQuery, RawPayload, TokioClock,
};
use marketdesk_server::{api::app_router, config::Config, AppState};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

/// Gateway serving fixed bodies and counting calls.
#[derive(Default)]
pub struct StubGateway {
    pub calls: AtomicUsize,
    pub fail_with: Option<MarketDataError>,
}

#[async_trait]
impl ProviderGateway for StubGateway {
    async fn fetch_series(&self, query: &QuoteQuery) -> Result<RawPayload, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        let values: Vec<Value> = (0..query.output_size())
            .rev()
            .map(|i| {
                json!({
                    "datetime": format!("2024-05-01 {:02}:{:02}:00", 9 + i / 12, (i % 12) * 5),
                    "open": "10.0", "high": "11.0", "low": "9.5", "close": "10.5", "volume": "100"
                })
            })
            .collect();
        Ok(RawPayload::new(json!({
            "meta": {"symbol": query.symbol(), "interval": query.interval().as_str()},
            "values": values,
            "status": "ok"
        })))
    }

    async fn fetch_calendar(&self, query: &CalendarQuery) -> Result<RawPayload, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        let day = query.date.to_string();
        let body = match query.kind {
            CalendarKind::Dividend => json!([
                {"symbol": "MSFT", "ex_date": day, "amount": "0.75", "exchange": "NASDAQ"}
            ]),
            CalendarKind::Ipo => {
                let mut by_date = Map::new();
                by_date.insert(day, json!([{"symbol": "ZETA", "name": "Zeta Inc"}]));
                Value::Object(by_date)
            }
        };
        Ok(RawPayload::new(body))
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|_| None).unwrap()
}

pub fn app_with(gateway: Arc<StubGateway>, market_data: MarketDataConfig) -> Router {
    let client = MarketDataClient::new(market_data, gateway, Arc::new(TokioClock)).unwrap();
    app_router(AppState::new(client), &test_config())
}

pub fn app(gateway: Arc<StubGateway>) -> Router {
    app_with(gateway, MarketDataConfig::default())
}

pub async fn get(app: &Router, uri: &str) -> (u16, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status().as_u16();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
