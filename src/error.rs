use chrono::NaiveDate;
use thiserror::Error;

pub type ViewportResult<T> = Result<T, ViewportError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewportError {
    #[error("invalid canvas size: width={width}, height={height}")]
    InvalidCanvas { width: f64, height: f64 },

    #[error("degenerate viewport: x=[{x_min}, {x_max}], y=[{y_min}, {y_max}]")]
    Degenerate {
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
    },

    #[error("non-finite pointer position: ({x}, {y})")]
    NonFinitePointer { x: f64, y: f64 },

    #[error("no data to fit a viewport to")]
    EmptyExtent,
}

/// Rejections raised before the pipeline starts. Display text is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid stock ticker.")]
    EmptyTicker,

    #[error("Please enter valid dates in YYYY-MM-DD format.")]
    MalformedDate(String),

    #[error("Start date must be before end date.")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error(
        "End date cannot be in the future. Please select a date on or before {}.",
        .cutoff.format("%B %d, %Y")
    )]
    FutureEndDate { end: NaiveDate, cutoff: NaiveDate },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No data found for the given ticker and date range.")]
    NoData { ticker: String },

    #[error("Failed to fetch or predict stock data: {0:#}")]
    Collaborator(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_end_date_message_names_the_cutoff() {
        let err = ValidationError::FutureEndDate {
            end: NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            cutoff: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "End date cannot be in the future. Please select a date on or before May 02, 2025."
        );
    }

    #[test]
    fn collaborator_failures_are_reported_verbatim() {
        let err = PipelineError::from(anyhow::anyhow!("connection refused"));
        assert_eq!(
            err.to_string(),
            "Failed to fetch or predict stock data: connection refused"
        );
    }
}
