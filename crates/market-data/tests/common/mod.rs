#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use marketdesk_market_data::{
    CalendarKind, CalendarQuery, MarketDataClient, MarketDataConfig, MarketDataError,
    ProviderGateway, QuoteQuery, RawPayload, TokioClock,
};
use serde_json::{json, Value};

/// In-memory gateway that replays scripted responses.
///
/// Once the script is empty it answers with a well-formed body sized to the
/// query (`output_size` bars, or an empty calendar).
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<Value, MarketDataError>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn then(self, step: Result<Value, MarketDataError>) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, default: Value) -> Result<RawPayload, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Ok(body)) => Ok(RawPayload::new(body)),
            Some(Err(error)) => Err(error),
            None => Ok(RawPayload::new(default)),
        }
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    fn id(&self) -> &'static str {
        "SCRIPTED"
    }

    async fn fetch_series(&self, query: &QuoteQuery) -> Result<RawPayload, MarketDataError> {
        self.respond(series_body(query.output_size() as usize)).await
    }

    async fn fetch_calendar(&self, query: &CalendarQuery) -> Result<RawPayload, MarketDataError> {
        let body = match query.kind {
            CalendarKind::Dividend => json!([]),
            CalendarKind::Ipo => json!({}),
        };
        self.respond(body).await
    }
}

/// Newest-first 5-minute bars, as the provider sends them.
pub fn series_body(count: usize) -> Value {
    let values: Vec<Value> = (0..count)
        .rev()
        .map(|i| {
            let minutes = 9 * 60 + 30 + 5 * i;
            json!({
                "datetime": format!("2024-05-01 {:02}:{:02}:00", minutes / 60, minutes % 60),
                "open": "100.10",
                "high": "100.90",
                "low": "99.80",
                "close": format!("{}.25", 100 + i),
                "volume": "1500"
            })
        })
        .collect();
    json!({"meta": {"symbol": "AAPL", "interval": "5min"}, "values": values, "status": "ok"})
}

pub fn network_error() -> Result<Value, MarketDataError> {
    Err(MarketDataError::network("connection reset by peer"))
}

pub fn client_with(gateway: Arc<ScriptedGateway>, config: MarketDataConfig) -> MarketDataClient {
    MarketDataClient::new(config, gateway, Arc::new(TokioClock)).unwrap()
}

pub fn client(gateway: Arc<ScriptedGateway>) -> MarketDataClient {
    client_with(gateway, MarketDataConfig::default())
}
