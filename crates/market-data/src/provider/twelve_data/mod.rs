//! Twelve Data gateway.
//!
//! Endpoints used:
//! - `time_series` for OHLCV bars
//! - `dividends_calendar` and `ipo_calendar` for corporate events
//!
//! The provider reports many failures with HTTP 200 and a JSON error document
//! (`{"status":"error","code":...,"message":...}`), so a successful status line
//! is not enough to accept a body.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Url};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::errors::MarketDataError;
use crate::models::{CalendarKind, CalendarQuery, QuoteQuery};
use crate::provider::{ProviderGateway, RawPayload};

const PROVIDER_ID: &str = "TWELVE_DATA";

/// HTTP gateway to the Twelve Data REST API.
pub struct TwelveDataGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TwelveDataGateway {
    pub fn new(config: &ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client ({}), using defaults", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// Build the request URL for `path` with the API key appended.
    fn build_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> =
            params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all_params.push(("apikey", &self.api_key));

        let endpoint = format!("{}/{}", self.base_url, path);
        Url::parse_with_params(&endpoint, &all_params).map_err(|e| MarketDataError::Provider {
            status: None,
            code: None,
            message: format!("Failed to build URL: {}", e),
        })
    }

    /// The URL with the `apikey` value masked, for logging.
    fn redact(url: &Url) -> String {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                let value = if key == "apikey" {
                    "***".to_string()
                } else {
                    value.into_owned()
                };
                (key.into_owned(), value)
            })
            .collect();

        let mut redacted = url.clone();
        redacted.query_pairs_mut().clear().extend_pairs(&pairs);
        redacted.to_string()
    }

    /// Perform one GET and return the validated JSON body.
    async fn fetch(&self, path: &str, params: &[(&str, String)]) -> Result<RawPayload, MarketDataError> {
        let url = self.build_url(path, params)?;
        debug!("Twelve Data request: {}", Self::redact(&url));

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::network(format!("request timed out: {}", e.without_url()))
            } else {
                MarketDataError::network(e.without_url().to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MarketDataError::network(format!("failed to read body: {}", e.without_url())))?;

        if !status.is_success() {
            let body: Option<Value> = serde_json::from_str(&text).ok();
            let message = body
                .as_ref()
                .and_then(|b| b.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(MarketDataError::Provider {
                status: Some(status.as_u16()),
                code: body.as_ref().and_then(|b| b.get("code")).and_then(Value::as_i64),
                message,
            });
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| MarketDataError::Provider {
            status: Some(status.as_u16()),
            code: None,
            message: format!("Malformed response body: {}", e),
        })?;

        if let Some(error) = Self::check_api_error(&body) {
            return Err(error);
        }

        Ok(RawPayload::new(body))
    }

    /// Detect the provider's in-band error document.
    fn check_api_error(body: &Value) -> Option<MarketDataError> {
        let is_error = body.get("status").and_then(Value::as_str) == Some("error");
        if !is_error {
            return None;
        }

        let code = body.get("code").and_then(Value::as_i64);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unspecified provider error")
            .to_string();
        warn!("Twelve Data error (code {:?}): {}", code, message);

        Some(MarketDataError::Provider {
            status: None,
            code,
            message,
        })
    }

    fn series_params(query: &QuoteQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", query.symbol().to_string()),
            ("interval", query.interval().as_str().to_string()),
            ("outputsize", query.output_size().to_string()),
        ];
        if let Some(start) = query.start_date() {
            params.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = query.end_date() {
            params.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        params
    }

    fn calendar_path(kind: CalendarKind) -> &'static str {
        match kind {
            CalendarKind::Dividend => "dividends_calendar",
            CalendarKind::Ipo => "ipo_calendar",
        }
    }
}

#[async_trait]
impl ProviderGateway for TwelveDataGateway {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch_series(&self, query: &QuoteQuery) -> Result<RawPayload, MarketDataError> {
        debug!(
            "Fetching {} {} bars for {} from Twelve Data",
            query.output_size(),
            query.interval(),
            query.symbol()
        );
        self.fetch("time_series", &Self::series_params(query)).await
    }

    async fn fetch_calendar(&self, query: &CalendarQuery) -> Result<RawPayload, MarketDataError> {
        debug!("Fetching {} calendar for {} from Twelve Data", query.kind, query.date);
        let day = query.date.format("%Y-%m-%d").to_string();
        let params = [("start_date", day.clone()), ("end_date", day)];
        self.fetch(Self::calendar_path(query.kind), &params).await
    }
}
