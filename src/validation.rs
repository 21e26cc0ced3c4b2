use crate::config::ForecastHorizon;
use crate::error::ValidationError;
use chrono::NaiveDate;
use tracing::debug;

/// A request that passed every input check and is ready for the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForecastRequest {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub horizon: ForecastHorizon,
}

impl ForecastRequest {
    /// Validates raw form input against the `as_of` cutoff.
    ///
    /// Checks run in order (ticker, date format, range, cutoff) and the first
    /// failure is returned.
    pub fn parse(
        ticker: &str,
        start_date: &str,
        end_date: &str,
        horizon: ForecastHorizon,
        as_of: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let ticker = normalize_ticker(ticker)?;
        let start_date = parse_date(start_date)?;
        let end_date = parse_date(end_date)?;

        if start_date >= end_date {
            return Err(ValidationError::InvertedRange { start: start_date, end: end_date });
        }
        if end_date > as_of {
            return Err(ValidationError::FutureEndDate { end: end_date, cutoff: as_of });
        }

        Ok(Self { ticker, start_date, end_date, horizon })
    }
}

pub fn normalize_ticker(raw: &str) -> Result<String, ValidationError> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        Err(ValidationError::EmptyTicker)
    } else {
        Ok(ticker)
    }
}

/// Parses `YYYY-MM-DD`, also accepting `/` as the separator.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let normalized = raw.trim().replace('/', "-");
    debug!("Date input raw='{}' normalized='{}'", raw, normalized);

    if !has_iso_date_shape(&normalized) {
        return Err(ValidationError::MalformedDate(raw.to_string()));
    }
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .map_err(|_| ValidationError::MalformedDate(raw.to_string()))
}

// chrono alone would also take "2021-6-5" or "+2021-06-05".
fn has_iso_date_shape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cutoff() -> NaiveDate {
        date(2025, 5, 2)
    }

    #[test]
    fn ticker_is_trimmed_and_upper_cased() {
        assert_eq!(normalize_ticker("  nvda "), Ok("NVDA".to_string()));
        assert_eq!(normalize_ticker("   "), Err(ValidationError::EmptyTicker));
        assert_eq!(normalize_ticker(""), Err(ValidationError::EmptyTicker));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        for raw in ["2021-13-01", "2021-02-30", "not-a-date", "2021-6-15", "21-06-15", "2021.06.15", ""] {
            assert!(
                matches!(parse_date(raw), Err(ValidationError::MalformedDate(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn slash_separated_dates_are_normalized() {
        assert_eq!(parse_date("2021/06/15"), parse_date("2021-06-15"));
        assert_eq!(parse_date("2021/06/15"), Ok(date(2021, 6, 15)));
        assert_eq!(parse_date(" 2024-02-29 "), Ok(date(2024, 2, 29)));
    }

    #[test]
    fn range_must_be_strictly_increasing() {
        let same = ForecastRequest::parse("ABC", "2021-06-15", "2021-06-15", ForecastHorizon::Days30, cutoff());
        assert!(matches!(same, Err(ValidationError::InvertedRange { .. })));

        let inverted = ForecastRequest::parse("ABC", "2021-06-16", "2021-06-15", ForecastHorizon::Days30, cutoff());
        assert_eq!(
            inverted.unwrap_err().to_string(),
            "Start date must be before end date."
        );
    }

    #[test]
    fn end_date_is_bounded_by_the_cutoff() {
        let on_cutoff = ForecastRequest::parse("ABC", "2025-01-01", "2025-05-02", ForecastHorizon::Days60, cutoff());
        assert_eq!(on_cutoff.unwrap().end_date, cutoff());

        let past_cutoff = ForecastRequest::parse("ABC", "2025-01-01", "2025-05-03", ForecastHorizon::Days60, cutoff());
        assert_eq!(
            past_cutoff,
            Err(ValidationError::FutureEndDate { end: date(2025, 5, 3), cutoff: cutoff() })
        );
    }

    #[test]
    fn first_failing_check_wins() {
        let err = ForecastRequest::parse(" ", "bogus", "2030-01-01", ForecastHorizon::Days30, cutoff()).unwrap_err();
        assert_eq!(err, ValidationError::EmptyTicker);

        let err = ForecastRequest::parse("abc", "2030-01-02", "2030-01-01", ForecastHorizon::Days30, cutoff()).unwrap_err();
        assert!(matches!(err, ValidationError::InvertedRange { .. }));
    }

    #[test]
    fn valid_request_keeps_normalized_fields() {
        let request = ForecastRequest::parse("abc", "2020/01/01", "2020-06-01", ForecastHorizon::Days90, cutoff()).unwrap();
        assert_eq!(
            request,
            ForecastRequest {
                ticker: "ABC".to_string(),
                start_date: date(2020, 1, 1),
                end_date: date(2020, 6, 1),
                horizon: ForecastHorizon::Days90,
            }
        );
    }
}
