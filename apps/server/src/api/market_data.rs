use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use marketdesk_market_data::{
    CacheStats, CalendarKind, DividendEvent, Interval, IpoEvent, QuoteQuery, RateBudget,
    TimeSeriesBar,
};
use serde::{Deserialize, Serialize};

/// Bars per request when `outputsize` is omitted.
const DEFAULT_OUTPUT_SIZE: u32 = 30;

#[derive(Deserialize)]
struct TimeSeriesParams {
    symbol: String,
    interval: String,
    outputsize: Option<u32>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct TimeSeriesResponse {
    symbol: String,
    interval: Interval,
    bars: Arc<[TimeSeriesBar]>,
}

async fn get_time_series(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TimeSeriesParams>,
) -> ApiResult<Json<TimeSeriesResponse>> {
    let interval: Interval = q.interval.parse()?;
    let query = QuoteQuery::new(
        &q.symbol,
        interval,
        q.outputsize.unwrap_or(DEFAULT_OUTPUT_SIZE),
        q.start_date,
        q.end_date,
    )?;
    let bars = state.market_data.get_series(&query).await?;
    Ok(Json(TimeSeriesResponse {
        symbol: query.symbol().to_string(),
        interval,
        bars,
    }))
}

#[derive(Deserialize)]
struct CalendarParams {
    date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct CalendarResponse<T> {
    kind: CalendarKind,
    date: NaiveDate,
    events: Arc<[T]>,
}

async fn get_dividend_calendar(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CalendarParams>,
) -> ApiResult<Json<CalendarResponse<DividendEvent>>> {
    let date = q.date.unwrap_or_else(|| Utc::now().date_naive());
    let events = state.market_data.get_dividend_calendar(date).await?;
    Ok(Json(CalendarResponse {
        kind: CalendarKind::Dividend,
        date,
        events,
    }))
}

async fn get_ipo_calendar(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CalendarParams>,
) -> ApiResult<Json<CalendarResponse<IpoEvent>>> {
    let date = q.date.unwrap_or_else(|| Utc::now().date_naive());
    let events = state.market_data.get_ipo_calendar(date).await?;
    Ok(Json(CalendarResponse {
        kind: CalendarKind::Ipo,
        date,
        events,
    }))
}

#[derive(Serialize)]
struct StatsResponse {
    cache: CacheStats,
    rate_budget: RateBudget,
    in_flight: usize,
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let client = &state.market_data;
    Json(StatsResponse {
        cache: client.cache_stats(),
        rate_budget: client.rate_budget(),
        in_flight: client.in_flight(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/market-data/time-series", get(get_time_series))
        .route("/market-data/calendar/dividends", get(get_dividend_calendar))
        .route("/market-data/calendar/ipos", get(get_ipo_calendar))
        .route("/market-data/stats", get(get_stats))
}
