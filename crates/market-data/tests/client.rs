mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use common::{client, client_with, network_error, series_body, ScriptedGateway};
use marketdesk_market_data::{
    Interval, MarketDataConfig, MarketDataError, QuoteQuery, RetryPolicy,
};
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::time::Instant;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_aapl_five_minute_series() {
    let gateway = Arc::new(ScriptedGateway::new());
    let client = client(gateway.clone());

    let bars = client
        .get_time_series("AAPL", Interval::FiveMinutes, 78, None, None)
        .await
        .unwrap();

    assert_eq!(bars.len(), 78);
    assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

    let signature = QuoteQuery::new("AAPL", Interval::FiveMinutes, 78, None, None)
        .unwrap()
        .signature();
    assert_eq!(client.cache_ttl(&signature), Some(Duration::from_secs(300)));
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_leaves_budget_untouched() {
    let gateway = Arc::new(ScriptedGateway::new());
    let client = client(gateway.clone());

    let first = client
        .get_time_series("MSFT", Interval::OneDay, 10, None, None)
        .await
        .unwrap();
    let budget = client.rate_budget();

    let second = client
        .get_time_series("msft", Interval::OneDay, 10, None, None)
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(client.rate_budget(), budget);
    assert_eq!(budget.calls_in_window, 1);
    assert_eq!(gateway.calls(), 1);
    assert_eq!(client.cache_stats().hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_identical_queries_share_one_fetch() {
    let gateway = Arc::new(ScriptedGateway::with_delay(Duration::from_millis(200)));
    let client = client(gateway.clone());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .get_time_series("AAPL", Interval::FiveMinutes, 78, None, None)
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(gateway.calls(), 1);
    assert_eq!(client.rate_budget().calls_in_window, 1);
    assert!(results.iter().all(|bars| Arc::ptr_eq(bars, &results[0])));
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_coalesced_callers_share_the_error() {
    let gateway = Arc::new(
        ScriptedGateway::with_delay(Duration::from_millis(200)).then(Err(
            MarketDataError::Provider {
                status: Some(401),
                code: None,
                message: "invalid api key".to_string(),
            },
        )),
    );
    let client = client(gateway.clone());
    let day = date(2024, 5, 1);

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get_dividend_calendar(day).await })
        })
        .collect();

    for handle in handles {
        match handle.await.unwrap() {
            Err(MarketDataError::Provider { status, .. }) => assert_eq!(status, Some(401)),
            other => panic!("expected provider error, got {:?}", other),
        }
    }
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_data_shape_failure_is_not_cached() {
    let malformed = json!({"values": [{"datetime": "2024-05-01 09:30:00", "open": "1.0"}]});
    let gateway = Arc::new(ScriptedGateway::new().then(Ok(malformed)));
    let client = client(gateway.clone());

    let result = client
        .get_time_series("AAPL", Interval::FiveMinutes, 1, None, None)
        .await;
    assert!(matches!(result, Err(MarketDataError::DataShape { .. })));
    assert_eq!(client.cache_stats().entries, 0);
    assert_eq!(gateway.calls(), 1, "data shape errors are not retried");

    // Next call goes back to the provider, which now answers correctly.
    let bars = client
        .get_time_series("AAPL", Interval::FiveMinutes, 1, None, None)
        .await
        .unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(gateway.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_budget_fails_fast_with_rate_limit() {
    let gateway = Arc::new(ScriptedGateway::new());
    let client = client(gateway.clone());

    let symbols = ["AAPL", "MSFT", "GOOG", "AMZN", "META", "NVDA", "TSLA", "NFLX"];
    for symbol in symbols {
        client
            .get_time_series(symbol, Interval::OneDay, 5, None, None)
            .await
            .unwrap();
    }

    let started = Instant::now();
    let result = client
        .get_time_series("ORCL", Interval::OneDay, 5, None, None)
        .await;

    match result {
        Err(MarketDataError::RateLimitExceeded { wait }) => {
            assert!(wait <= Duration::from_secs(60));
            assert!(wait > Duration::from_secs(10));
        }
        other => panic!("expected RateLimitExceeded, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(gateway.calls(), 8);
    assert_eq!(client.rate_budget().calls_in_window, 8);
}

#[tokio::test(start_paused = true)]
async fn test_short_rate_wait_is_absorbed() {
    let gateway = Arc::new(ScriptedGateway::new());
    let mut config = MarketDataConfig::default();
    config.rate_limit.quota = 1;
    config.rate_limit.window = Duration::from_secs(2);
    let client = client_with(gateway.clone(), config);

    let started = Instant::now();
    client.get_ipo_calendar(date(2024, 5, 1)).await.unwrap();
    client.get_ipo_calendar(date(2024, 5, 2)).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(gateway.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_waiters_are_served_one_slot_at_a_time() {
    let gateway = Arc::new(ScriptedGateway::new());
    let mut config = MarketDataConfig::default();
    config.rate_limit.quota = 1;
    config.rate_limit.window = Duration::from_secs(1);
    config.max_rate_limit_wait = Duration::from_secs(5);
    let client = client_with(gateway.clone(), config);

    let started = Instant::now();
    let handles: Vec<_> = (1..=3)
        .map(|day| {
            let client = client.clone();
            tokio::spawn(async move { client.get_dividend_calendar(date(2024, 5, day)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(gateway.calls(), 3);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(client.rate_budget().calls_in_window <= 1);
}

#[tokio::test(start_paused = true)]
async fn test_ninth_concurrent_query_waits_for_a_slot() {
    let gateway = Arc::new(ScriptedGateway::new());
    let mut config = MarketDataConfig::default();
    config.rate_limit.window = Duration::from_secs(2);
    config.max_rate_limit_wait = Duration::from_secs(5);
    let client = client_with(gateway.clone(), config);

    let started = Instant::now();
    let handles: Vec<_> = (1..=9)
        .map(|day| {
            let client = client.clone();
            tokio::spawn(async move { client.get_ipo_calendar(date(2024, 5, day)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(gateway.calls(), 9);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_queued_rate_waiters_respect_max_wait() {
    let gateway = Arc::new(ScriptedGateway::new());
    let mut config = MarketDataConfig::default();
    config.rate_limit.quota = 1;
    config.rate_limit.window = Duration::from_secs(10);
    config.max_rate_limit_wait = Duration::from_secs(15);
    config.request_timeout = Duration::from_secs(30);
    let client = client_with(gateway.clone(), config);

    client.get_ipo_calendar(date(2024, 5, 1)).await.unwrap();

    let handles: Vec<_> = (2..=5)
        .map(|day| {
            let client = client.clone();
            tokio::spawn(async move {
                let started = Instant::now();
                let result = client.get_ipo_calendar(date(2024, 5, day)).await;
                (result, started.elapsed())
            })
        })
        .collect();

    let mut granted = 0;
    let mut refused = 0;
    for handle in handles {
        let (result, waited) = handle.await.unwrap();
        assert!(waited <= Duration::from_secs(15), "waited {:?}", waited);
        match result {
            Ok(_) => granted += 1,
            Err(MarketDataError::RateLimitExceeded { .. }) => refused += 1,
            Err(other) => panic!("expected RateLimitExceeded, got {:?}", other),
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(refused, 3);
    assert_eq!(gateway.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_series_keeps_newest_bars() {
    let gateway = Arc::new(ScriptedGateway::new().then(Ok(series_body(50))));
    let client = client(gateway.clone());

    let bars = client
        .get_time_series("AAPL", Interval::FiveMinutes, 10, None, None)
        .await
        .unwrap();

    assert_eq!(bars.len(), 10);
    assert_eq!(bars[0].close, dec!(140.25));
    assert_eq!(bars[9].close, dec!(149.25));

    let cached = client
        .get_time_series("AAPL", Interval::FiveMinutes, 10, None, None)
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&bars, &cached));
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_network_errors_are_retried_with_backoff() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .then(network_error())
            .then(network_error())
            .then(Ok(series_body(3))),
    );
    let client = client(gateway.clone());

    let started = Instant::now();
    let bars = client
        .get_time_series("AAPL", Interval::FiveMinutes, 3, None, None)
        .await
        .unwrap();

    assert_eq!(bars.len(), 3);
    assert_eq!(gateway.calls(), 3);
    // Every attempt takes its own slot.
    assert_eq!(client.rate_budget().calls_in_window, 3);
    // 500ms + 1s of backoff.
    assert!(started.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_network_retries_are_bounded() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .then(network_error())
            .then(network_error())
            .then(network_error())
            .then(Ok(series_body(3))),
    );
    let client = client(gateway.clone());

    let result = client
        .get_time_series("AAPL", Interval::FiveMinutes, 3, None, None)
        .await;

    assert!(matches!(result, Err(MarketDataError::Network { .. })));
    assert_eq!(gateway.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retries_can_be_disabled() {
    let gateway = Arc::new(ScriptedGateway::new().then(network_error()));
    let config = MarketDataConfig {
        retry: RetryPolicy::no_retry(),
        ..MarketDataConfig::default()
    };
    let client = client_with(gateway.clone(), config);

    let result = client.get_ipo_calendar(date(2024, 5, 1)).await;
    assert!(matches!(result, Err(MarketDataError::Network { .. })));
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_provider_errors_are_not_retried() {
    let gateway = Arc::new(ScriptedGateway::new().then(Err(MarketDataError::Provider {
        status: None,
        code: Some(404),
        message: "symbol not found".to_string(),
    })));
    let client = client(gateway.clone());

    let result = client
        .get_time_series("ZZZZ", Interval::OneDay, 5, None, None)
        .await;

    assert!(matches!(
        result,
        Err(MarketDataError::Provider { code: Some(404), .. })
    ));
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_times_out_but_still_fills_cache() {
    let gateway = Arc::new(ScriptedGateway::with_delay(Duration::from_secs(5)));
    let config = MarketDataConfig {
        request_timeout: Duration::from_secs(1),
        ..MarketDataConfig::default()
    };
    let client = client_with(gateway.clone(), config);

    let result = client.get_ipo_calendar(date(2024, 5, 1)).await;
    match result {
        Err(MarketDataError::Timeout { elapsed }) => assert_eq!(elapsed, Duration::from_secs(1)),
        other => panic!("expected Timeout, got {:?}", other),
    }

    // The fetch keeps running after the caller gave up.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(client.cache_stats().entries, 1);

    let events = client.get_ipo_calendar(date(2024, 5, 1)).await.unwrap();
    assert!(events.is_empty());
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_waiter_does_not_cancel_fetch() {
    let gateway = Arc::new(ScriptedGateway::with_delay(Duration::from_millis(500)));
    let client = client(gateway.clone());

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .get_time_series("AAPL", Interval::OneHour, 24, None, None)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.in_flight(), 1);
    waiter.abort();
    assert!(waiter.await.unwrap_err().is_cancelled());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(client.in_flight(), 0);

    let bars = client
        .get_time_series("AAPL", Interval::OneHour, 24, None, None)
        .await
        .unwrap();
    assert_eq!(bars.len(), 24);
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_entries_expire_and_can_be_evicted() {
    let gateway = Arc::new(ScriptedGateway::new());
    let client = client(gateway.clone());

    client
        .get_time_series("AAPL", Interval::FiveMinutes, 10, None, None)
        .await
        .unwrap();
    client
        .get_time_series("AAPL", Interval::OneDay, 10, None, None)
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(301)).await;
    assert_eq!(client.evict_expired(), 1);
    assert_eq!(client.cache_stats().entries, 1);

    // Expired intraday series is fetched again.
    client
        .get_time_series("AAPL", Interval::FiveMinutes, 10, None, None)
        .await
        .unwrap();
    assert_eq!(gateway.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_forces_refetch() {
    let gateway = Arc::new(ScriptedGateway::new());
    let client = client(gateway.clone());
    let query = QuoteQuery::new("AAPL", Interval::OneWeek, 4, None, None).unwrap();

    client.get_series(&query).await.unwrap();
    assert!(client.invalidate(&query.signature()));
    assert!(!client.invalidate(&query.signature()));

    client.get_series(&query).await.unwrap();
    assert_eq!(gateway.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_historical_range_gets_long_ttl() {
    let gateway = Arc::new(ScriptedGateway::new());
    let client = client(gateway.clone());
    let query = QuoteQuery::new(
        "AAPL",
        Interval::FiveMinutes,
        10,
        Some(date(2020, 1, 2)),
        Some(date(2020, 1, 3)),
    )
    .unwrap();

    client.get_series(&query).await.unwrap();
    assert_eq!(
        client.cache_ttl(&query.signature()),
        Some(Duration::from_secs(24 * 60 * 60))
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_queries_never_reach_the_gateway() {
    let gateway = Arc::new(ScriptedGateway::new());
    let client = client(gateway.clone());

    let results = [
        client.get_time_series("", Interval::OneDay, 5, None, None).await,
        client.get_time_series("AAPL", Interval::OneDay, 0, None, None).await,
        client
            .get_time_series(
                "AAPL",
                Interval::OneDay,
                5,
                Some(date(2024, 5, 2)),
                Some(date(2024, 5, 1)),
            )
            .await,
    ];

    for result in results {
        assert!(matches!(result, Err(MarketDataError::InvalidQuery(_))));
    }
    assert_eq!(gateway.calls(), 0);
    assert_eq!(client.rate_budget().calls_in_window, 0);
}
