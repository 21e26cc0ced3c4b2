use chrono::{NaiveDate, Utc};
use std::fmt;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataProviderMode {
    Yahoo,
    Mock,
}

impl DataProviderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Mock => "mock",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yahoo" | "yfinance" => Some(Self::Yahoo),
            "mock" | "offline" => Some(Self::Mock),
            _ => None,
        }
    }
}

/// Forecast lengths offered by the interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForecastHorizon {
    Days30,
    Days60,
    Days90,
    Days180,
    Days365,
}

impl ForecastHorizon {
    pub const ALL: [ForecastHorizon; 5] = [
        Self::Days30,
        Self::Days60,
        Self::Days90,
        Self::Days180,
        Self::Days365,
    ];

    pub fn days(self) -> usize {
        match self {
            Self::Days30 => 30,
            Self::Days60 => 60,
            Self::Days90 => 90,
            Self::Days180 => 180,
            Self::Days365 => 365,
        }
    }
}

impl Default for ForecastHorizon {
    fn default() -> Self {
        Self::Days30
    }
}

impl fmt::Display for ForecastHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.days())
    }
}

/// Runtime settings resolved once at startup from CLI flags and environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Latest end date the user may request. Stands in for "today".
    pub as_of: NaiveDate,
    pub provider: DataProviderMode,
    pub fetch_attempts: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            as_of: Utc::now().date_naive(),
            provider: DataProviderMode::Yahoo,
            fetch_attempts: FETCH_ATTEMPTS,
            fetch_timeout_secs: FETCH_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Builds the config from explicit overrides, then `STOCKCAST_*` env vars, then defaults.
    pub fn resolve(as_of: Option<NaiveDate>, offline: bool) -> Self {
        let mut config = Self::default();

        config.as_of = as_of.or_else(env_as_of).unwrap_or(config.as_of);
        config.provider = if offline {
            DataProviderMode::Mock
        } else {
            env_provider_mode().unwrap_or(config.provider)
        };
        config.fetch_attempts = env_parse::<usize>("STOCKCAST_FETCH_ATTEMPTS")
            .filter(|n| *n > 0)
            .unwrap_or(config.fetch_attempts);
        config.fetch_timeout_secs = env_parse::<u64>("STOCKCAST_FETCH_TIMEOUT_SECS")
            .filter(|n| *n > 0)
            .unwrap_or(config.fetch_timeout_secs);

        info!(
            "Resolved config: as_of={}, provider={}, fetch_attempts={}, fetch_timeout={}s",
            config.as_of,
            config.provider.as_str(),
            config.fetch_attempts,
            config.fetch_timeout_secs
        );
        config
    }
}

fn env_as_of() -> Option<NaiveDate> {
    let raw = std::env::var("STOCKCAST_AS_OF").ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("Ignoring STOCKCAST_AS_OF={} ({}); expected YYYY-MM-DD", trimmed, e);
            None
        }
    }
}

fn env_provider_mode() -> Option<DataProviderMode> {
    let raw = std::env::var("STOCKCAST_DATA_PROVIDER").ok()?;
    match DataProviderMode::parse(&raw) {
        Some(mode) => Some(mode),
        None => {
            warn!(
                "Unknown STOCKCAST_DATA_PROVIDER={} ; defaulting to yahoo. Allowed values: yahoo | mock",
                raw.trim()
            );
            None
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

// ── Chart interaction ───────────────────────────────────────────────────────
/// Scale applied to the visible span per scroll notch when zooming out.
pub const ZOOM_STEP: f64 = 1.2;
/// Relative margin added around the data when fitting the initial viewport.
pub const VIEWPORT_MARGIN: f64 = 0.05;

// ── Analysis ────────────────────────────────────────────────────────────────
pub const ANOMALY_Z_THRESHOLD: f64 = 2.0;
/// Two-sided coverage of the forecast interval.
pub const INTERVAL_WIDTH: f64 = 0.80;

// ── Data fetch ──────────────────────────────────────────────────────────────
pub const FETCH_ATTEMPTS: usize = 3;
pub const FETCH_TIMEOUT_SECS: u64 = 20;
pub const FETCH_RETRY_DELAY_SECS: u64 = 2;

// ── Input defaults ──────────────────────────────────────────────────────────
pub const DEFAULT_START_DATE: &str = "2020-01-01";
pub const DEFAULT_END_DATE: &str = "2024-12-31";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizons_are_the_offered_day_counts() {
        let days: Vec<usize> = ForecastHorizon::ALL.iter().map(|h| h.days()).collect();
        assert_eq!(days, vec![30, 60, 90, 180, 365]);
        assert_eq!(ForecastHorizon::default(), ForecastHorizon::Days30);
        assert_eq!(ForecastHorizon::Days180.to_string(), "180");
    }

    #[test]
    fn provider_mode_parsing_accepts_aliases() {
        assert_eq!(DataProviderMode::parse(" Yahoo "), Some(DataProviderMode::Yahoo));
        assert_eq!(DataProviderMode::parse("yfinance"), Some(DataProviderMode::Yahoo));
        assert_eq!(DataProviderMode::parse("offline"), Some(DataProviderMode::Mock));
        assert_eq!(DataProviderMode::parse("polygon"), None);
    }

    #[test]
    fn explicit_overrides_win() {
        let as_of = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        let config = AppConfig::resolve(Some(as_of), true);
        assert_eq!(config.as_of, as_of);
        assert_eq!(config.provider, DataProviderMode::Mock);
        assert!(config.fetch_attempts > 0);
    }
}
