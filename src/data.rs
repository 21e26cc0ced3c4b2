use crate::config::{AppConfig, DataProviderMode, FETCH_RETRY_DELAY_SECS};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Weekday};
use futures_util::future::BoxFuture;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use tracing::{info, warn};

/// One daily close.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close_price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close_price: f64) -> Self {
        Self { date, close_price }
    }
}

/// Daily close history for one symbol, ordered by date.
#[derive(Clone, Debug)]
pub struct StockData {
    pub symbol: String,
    pub history: Vec<PricePoint>,
}

impl StockData {
    pub fn closes(&self) -> Vec<f64> {
        self.history.iter().map(|p| p.close_price).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Where historical prices come from.
///
/// `end` is exclusive. An empty history is a valid answer; failures are errors.
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch<'a>(
        &'a self,
        symbol: &'a str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BoxFuture<'a, Result<StockData>>;
}

pub fn source_for(config: &AppConfig) -> Arc<dyn PriceSource> {
    match config.provider {
        DataProviderMode::Yahoo => Arc::new(YahooSource::new(config)),
        DataProviderMode::Mock => Arc::new(MockSource),
    }
}

// ── Yahoo Finance ───────────────────────────────────────────────────────────

#[derive(Deserialize, Serialize, Debug)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooResult {
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooQuote {
    close: Option<Vec<Option<f64>>>,
}

pub struct YahooSource {
    client: reqwest::Client,
    attempts: usize,
}

impl YahooSource {
    pub fn new(config: &AppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.fetch_timeout_secs))
            .user_agent("Mozilla/5.0")
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build configured HTTP client ({}); using defaults", e);
                reqwest::Client::new()
            });
        Self {
            client,
            attempts: config.fetch_attempts.max(1),
        }
    }

    async fn fetch_chart(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<StockData> {
        let url = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{}?period1={}&period2={}&interval=1d",
            symbol,
            date_to_unix(start),
            date_to_unix(end)
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request_once(&url).await {
                Ok(body) => return parse_chart_body(symbol, &body),
                Err(e) if attempt >= self.attempts => return Err(e),
                Err(e) => {
                    warn!(
                        "Failed to fetch data for {} (attempt {}/{}): {:#}",
                        symbol, attempt, self.attempts, e
                    );
                }
            }
            tokio::time::sleep(std::time::Duration::from_secs(FETCH_RETRY_DELAY_SECS)).await;
        }
    }

    async fn request_once(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;
        // Yahoo answers unknown symbols with 404 plus a JSON error body, which
        // carries the useful message; only bail on bodies we cannot read.
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() && !body.trim_start().starts_with('{') {
            anyhow::bail!("Yahoo Finance returned HTTP {}", status);
        }
        Ok(body)
    }
}

impl PriceSource for YahooSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn fetch<'a>(
        &'a self,
        symbol: &'a str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BoxFuture<'a, Result<StockData>> {
        Box::pin(self.fetch_chart(symbol, start, end))
    }
}

fn parse_chart_body(symbol: &str, body: &str) -> Result<StockData> {
    let parsed: YahooChartResponse =
        serde_json::from_str(body).context("Unexpected response from Yahoo Finance")?;

    if let Some(err) = parsed.chart.error {
        let description = err
            .description
            .or(err.code)
            .unwrap_or_else(|| "unknown error".to_string());
        anyhow::bail!("{}", description);
    }

    let mut history = Vec::new();
    if let Some(result) = parsed.chart.result.and_then(|r| r.into_iter().next()) {
        let timestamps = result.timestamp.unwrap_or_default();
        let closes = result
            .indicators
            .quote
            .into_iter()
            .next()
            .and_then(|q| q.close)
            .unwrap_or_default();

        for (ts, close) in timestamps.iter().zip(closes) {
            let Some(close) = close.filter(|c| c.is_finite()) else {
                continue;
            };
            let Some(dt) = DateTime::from_timestamp(*ts, 0) else {
                continue;
            };
            history.push(PricePoint::new(dt.date_naive(), close));
        }
    }
    history.sort_by_key(|p| p.date);
    history.dedup_by_key(|p| p.date);

    info!("Parsed {} daily closes for {}", history.len(), symbol);
    Ok(StockData {
        symbol: symbol.to_string(),
        history,
    })
}

pub fn date_to_unix(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

// ── Offline ─────────────────────────────────────────────────────────────────

/// Deterministic random-walk prices on weekdays, seeded by the symbol.
pub struct MockSource;

impl MockSource {
    pub fn generate(symbol: &str, start: NaiveDate, end: NaiveDate) -> StockData {
        let mut hasher = DefaultHasher::new();
        symbol.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());

        let mut history = Vec::new();
        let mut price: f64 = rng.gen_range(20.0..400.0);
        let mut date = start;
        while date < end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                let volatility = 0.02;
                let change_pct: f64 = rng.gen_range(-volatility..volatility);
                price = (price * (1.0 + change_pct)).max(0.01);
                history.push(PricePoint::new(date, price));
            }
            date += Duration::days(1);
        }

        StockData {
            symbol: symbol.to_string(),
            history,
        }
    }
}

impl PriceSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn fetch<'a>(
        &'a self,
        symbol: &'a str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BoxFuture<'a, Result<StockData>> {
        Box::pin(async move { Ok(Self::generate(symbol, start, end)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const FIXTURE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "ABC"},
                "timestamp": [1578061800, 1577975400, 1578321000, 1578407400],
                "indicators": {"quote": [{
                    "open": [1.0, 1.0, 1.0, 1.0],
                    "close": [75.5, 74.25, null, 76.0]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn chart_body_drops_nulls_and_sorts_by_date() {
        let data = parse_chart_body("ABC", FIXTURE).unwrap();
        assert_eq!(data.symbol, "ABC");
        assert_eq!(
            data.history,
            vec![
                PricePoint::new(date(2020, 1, 2), 74.25),
                PricePoint::new(date(2020, 1, 3), 75.5),
                PricePoint::new(date(2020, 1, 7), 76.0),
            ]
        );
    }

    #[test]
    fn chart_error_description_is_surfaced_verbatim() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart_body("ZZZZ", body).unwrap_err();
        assert_eq!(err.to_string(), "No data found, symbol may be delisted");
    }

    #[test]
    fn result_without_timestamps_is_empty_not_an_error() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        let data = parse_chart_body("ABC", body).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn unix_conversion_uses_utc_midnight() {
        assert_eq!(date_to_unix(date(2020, 1, 1)), 1_577_836_800);
    }

    #[tokio::test]
    async fn mock_source_is_deterministic_and_skips_weekends() {
        let start = date(2020, 1, 1);
        let end = date(2020, 2, 1);
        let a = MockSource.fetch("ABC", start, end).await.unwrap();
        let b = MockSource.fetch("ABC", start, end).await.unwrap();

        assert_eq!(a.history, b.history);
        assert_eq!(a.history.len(), 23);
        assert!(a.history.iter().all(|p| p.date >= start && p.date < end));
        assert!(a.history.iter().all(|p| !matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun)));
        assert!(a.closes().iter().all(|c| *c > 0.0));
    }
}
