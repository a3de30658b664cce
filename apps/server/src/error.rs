use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use marketdesk_market_data::MarketDataError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    MarketData(#[from] MarketDataError),
    #[error("Not Found")]
    NotFound,
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MarketData(e) => match e {
                MarketDataError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
                MarketDataError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                MarketDataError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                MarketDataError::Network { .. }
                | MarketDataError::Provider { .. }
                | MarketDataError::DataShape { .. } => StatusCode::BAD_GATEWAY,
            },
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed with {}: {}", status, self);
        }

        let retry_after = match &self {
            ApiError::MarketData(MarketDataError::RateLimitExceeded { wait }) => {
                Some(wait.as_secs() + u64::from(wait.subsec_nanos() > 0))
            }
            _ => None,
        };

        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
