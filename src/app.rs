use crate::config::{AppConfig, ForecastHorizon, DEFAULT_END_DATE, DEFAULT_START_DATE};
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, PredictionReport};
use crate::validation::ForecastRequest;
use crate::viewport::ViewportController;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{error, info, warn};

type PipelineOutcome = Result<PredictionReport, PipelineError>;

/// Application state shared by the presentation layer.
///
/// Form inputs, the busy flag and the last outcome live here; the chart's
/// viewport is a separate [`ViewportController`] rebuilt for every new report.
pub struct App {
    pub config: AppConfig,
    pipeline: Pipeline,
    pub ticker_input: String,
    pub start_input: String,
    pub end_input: String,
    pub horizon: ForecastHorizon,
    pub busy: bool,
    pub error_msg: Option<String>,
    pub report: Option<PredictionReport>,
    pub viewport: Option<ViewportController>,
    pending: Option<mpsc::Receiver<PipelineOutcome>>,
}

impl App {
    pub fn new(config: AppConfig, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline,
            ticker_input: String::new(),
            start_input: DEFAULT_START_DATE.to_string(),
            end_input: DEFAULT_END_DATE.to_string(),
            horizon: ForecastHorizon::default(),
            busy: false,
            error_msg: None,
            report: None,
            viewport: None,
            pending: None,
        }
    }

    /// Validates the form and, when it passes, starts the pipeline in the background.
    ///
    /// Returns `false` when nothing was started (already busy or invalid input).
    pub fn trigger_predict(&mut self) -> bool {
        if self.busy {
            return false;
        }

        let request = match ForecastRequest::parse(
            &self.ticker_input,
            &self.start_input,
            &self.end_input,
            self.horizon,
            self.config.as_of,
        ) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected input: {}", e);
                self.error_msg = Some(e.to_string());
                return false;
            }
        };

        info!(
            "Starting prediction for {} ({} to {}, {} days)",
            request.ticker, request.start_date, request.end_date, request.horizon
        );
        self.ticker_input = request.ticker.clone();
        self.busy = true;
        self.error_msg = None;

        let (tx, rx) = mpsc::channel(1);
        self.pending = Some(rx);
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            let outcome = pipeline.run(&request).await;
            let _ = tx.send(outcome).await;
        });
        true
    }

    /// Polls the background run. Call once per frame.
    pub fn tick(&mut self) {
        let Some(rx) = &mut self.pending else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => None,
        };

        // Runs for success, failure and a task that died without answering.
        self.pending = None;
        self.busy = false;

        match outcome {
            Some(Ok(report)) => self.apply_report(report),
            Some(Err(e)) => {
                error!("Prediction failed: {}", e);
                self.error_msg = Some(e.to_string());
            }
            None => {
                error!("Prediction task ended without a result");
                self.error_msg = Some(
                    PipelineError::Collaborator(anyhow::anyhow!("prediction task ended unexpectedly"))
                        .to_string(),
                );
            }
        }
    }

    fn apply_report(&mut self, report: PredictionReport) {
        info!(
            "Prediction for {} ready: {} forecast rows, {} anomalies",
            report.ticker,
            report.forecast_rows.len(),
            report.anomalies.len()
        );
        self.viewport = match report.chart.full_extent() {
            Ok(extent) => Some(ViewportController::new(extent)),
            Err(e) => {
                warn!("Chart has no drawable extent: {}", e);
                None
            }
        };
        self.report = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalyDetector, AnomalyRecord, ZScoreDetector};
    use crate::data::{MockSource, PricePoint};
    use crate::forecast::{ForecastPoint, Forecaster};
    use crate::pipeline::tests::{recording_pipeline, sample_history, CallLog};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn config() -> AppConfig {
        AppConfig {
            as_of: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            ..AppConfig::default()
        }
    }

    fn abc_app(pipeline: Pipeline) -> App {
        let mut app = App::new(config(), pipeline);
        app.ticker_input = " abc ".to_string();
        app.start_input = "2020-01-01".to_string();
        app.end_input = "2020-06-01".to_string();
        app.horizon = ForecastHorizon::Days30;
        app
    }

    async fn settle(app: &mut App) {
        for _ in 0..400 {
            app.tick();
            if !app.busy {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("prediction did not finish");
    }

    #[tokio::test]
    async fn end_to_end_prediction_leaves_the_app_interactive() {
        let log = CallLog::default();
        let mut app = abc_app(recording_pipeline(&log, sample_history(), None));

        assert!(app.trigger_predict());
        assert!(app.busy);
        assert_eq!(app.ticker_input, "ABC");
        assert!(!app.trigger_predict(), "second request while busy is ignored");

        settle(&mut app).await;

        assert!(!app.busy);
        assert!(app.error_msg.is_none());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "fetch ABC 2020-01-01 2020-06-01".to_string(),
                "detect 100".to_string(),
                "forecast periods=30".to_string(),
            ]
        );
        let report = app.report.as_ref().unwrap();
        assert_eq!(report.forecast_rows.len(), 30);
        assert_eq!(report.chart.title, "Stock Price Forecast for ABC");

        let viewport = app.viewport.as_ref().unwrap();
        assert_eq!(viewport.viewport(), report.chart.full_extent().unwrap());
        assert!(!viewport.is_panning());
    }

    #[tokio::test]
    async fn invalid_input_never_starts_the_pipeline() {
        let log = CallLog::default();
        let mut app = abc_app(recording_pipeline(&log, sample_history(), None));
        app.end_input = "2025-05-03".to_string();

        assert!(!app.trigger_predict());
        assert!(!app.busy);
        assert_eq!(
            app.error_msg.as_deref(),
            Some("End date cannot be in the future. Please select a date on or before May 02, 2025.")
        );
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_keeps_the_previous_results_and_clears_busy() {
        let log = CallLog::default();
        let mut app = abc_app(recording_pipeline(&log, sample_history(), None));
        app.trigger_predict();
        settle(&mut app).await;
        let previous_rows = app.report.as_ref().unwrap().forecast_rows.clone();

        app.pipeline = recording_pipeline(&log, Vec::new(), None);
        assert!(app.trigger_predict());
        settle(&mut app).await;

        assert!(!app.busy);
        assert_eq!(
            app.error_msg.as_deref(),
            Some("No data found for the given ticker and date range.")
        );
        assert_eq!(app.report.as_ref().unwrap().forecast_rows, previous_rows);
    }

    struct PanickingForecaster;

    impl Forecaster for PanickingForecaster {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn forecast(&self, _history: &[PricePoint], _periods: usize) -> anyhow::Result<Vec<ForecastPoint>> {
            panic!("model blew up");
        }
    }

    struct NoAnomalies;

    impl AnomalyDetector for NoAnomalies {
        fn detect(&self, _history: &[PricePoint]) -> Vec<AnomalyRecord> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn busy_state_is_cleared_even_when_the_task_dies() {
        let mut app = abc_app(Pipeline {
            source: Arc::new(MockSource),
            detector: Arc::new(NoAnomalies),
            forecaster: Arc::new(PanickingForecaster),
        });

        assert!(app.trigger_predict());
        settle(&mut app).await;

        assert!(!app.busy);
        assert!(app.report.is_none());
        assert_eq!(
            app.error_msg.as_deref(),
            Some("Failed to fetch or predict stock data: prediction task ended unexpectedly")
        );
    }

    #[tokio::test]
    async fn new_report_replaces_the_viewport() {
        let mut app = abc_app(Pipeline {
            source: Arc::new(MockSource),
            detector: Arc::new(ZScoreDetector::default()),
            forecaster: Arc::new(crate::forecast::TrendForecaster::default()),
        });
        app.trigger_predict();
        settle(&mut app).await;
        let first = app.viewport.as_ref().unwrap().viewport();

        app.horizon = ForecastHorizon::Days365;
        app.trigger_predict();
        settle(&mut app).await;
        let second = app.viewport.as_ref().unwrap().viewport();

        assert!(second.x_max() > first.x_max());
        assert_eq!(app.report.as_ref().unwrap().forecast_rows.len(), 365);
    }
}
