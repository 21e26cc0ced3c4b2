use crate::anomaly::{AnomalyDetector, AnomalyRecord};
use crate::data::{date_to_unix, PricePoint, PriceSource};
use crate::error::{PipelineError, ViewportResult};
use crate::forecast::{ForecastPoint, Forecaster};
use crate::validation::ForecastRequest;
use crate::viewport::{DataPos, Viewport};
use std::sync::Arc;
use tracing::info;

/// Everything the chart needs, in plot coordinates (x = unix seconds).
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub historical: Vec<[f64; 2]>,
    pub forecast: Vec<[f64; 2]>,
    /// `(x, lower, upper)` per forecast date.
    pub band: Vec<(f64, f64, f64)>,
    pub anomalies: Vec<[f64; 2]>,
}

impl ChartSpec {
    fn build(
        ticker: &str,
        history: &[PricePoint],
        forecast: &[ForecastPoint],
        anomalies: &[AnomalyRecord],
    ) -> Self {
        let x = |d| date_to_unix(d) as f64;
        Self {
            title: format!("Stock Price Forecast for {}", ticker),
            historical: history.iter().map(|p| [x(p.date), p.close_price]).collect(),
            forecast: forecast.iter().map(|p| [x(p.date), p.predicted]).collect(),
            band: forecast
                .iter()
                .map(|p| (x(p.date), p.lower_bound, p.upper_bound))
                .collect(),
            anomalies: anomalies.iter().map(|a| [x(a.date), a.close_price]).collect(),
        }
    }

    /// Rectangle enclosing every drawn element; the chart opens on it.
    pub fn full_extent(&self) -> ViewportResult<Viewport> {
        let lines = self
            .historical
            .iter()
            .chain(&self.forecast)
            .chain(&self.anomalies)
            .map(|[x, y]| DataPos::new(*x, *y));
        let band = self
            .band
            .iter()
            .flat_map(|(x, lo, hi)| [DataPos::new(*x, *lo), DataPos::new(*x, *hi)]);
        Viewport::fit(lines.chain(band))
    }
}

#[derive(Clone, Debug)]
pub struct PredictionReport {
    pub ticker: String,
    /// Future dates only, one row per forecast day.
    pub forecast_rows: Vec<ForecastPoint>,
    pub anomalies: Vec<AnomalyRecord>,
    pub chart: ChartSpec,
}

/// The collaborators one prediction run goes through.
#[derive(Clone)]
pub struct Pipeline {
    pub source: Arc<dyn PriceSource>,
    pub detector: Arc<dyn AnomalyDetector>,
    pub forecaster: Arc<dyn Forecaster>,
}

impl Pipeline {
    pub async fn run(&self, request: &ForecastRequest) -> Result<PredictionReport, PipelineError> {
        let periods = request.horizon.days();
        info!(
            "Fetching {} from {} to {} via {}",
            request.ticker,
            request.start_date,
            request.end_date,
            self.source.name()
        );
        let data = self
            .source
            .fetch(&request.ticker, request.start_date, request.end_date)
            .await?;
        if data.is_empty() {
            return Err(PipelineError::NoData {
                ticker: request.ticker.clone(),
            });
        }

        let anomalies = self.detector.detect(&data.history);
        info!("Detected {} anomalies in {} closes", anomalies.len(), data.history.len());

        let forecast = self.forecaster.forecast(&data.history, periods)?;
        let split = forecast.len().saturating_sub(periods);
        let forecast_rows = forecast[split..].to_vec();
        info!(
            "Forecast {} days with {} ({} points total)",
            forecast_rows.len(),
            self.forecaster.name(),
            forecast.len()
        );

        let chart = ChartSpec::build(&request.ticker, &data.history, &forecast, &anomalies);
        Ok(PredictionReport {
            ticker: request.ticker.clone(),
            forecast_rows,
            anomalies,
            chart,
        })
    }
}
