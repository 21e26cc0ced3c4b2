use crate::config::INTERVAL_WIDTH;
use crate::data::PricePoint;
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use tracing::info;

/// Model output for one calendar date.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// A time-series model fitted on demand.
///
/// Implementations return one point per historical date followed by `periods`
/// consecutive calendar days after the last historical date.
pub trait Forecaster: Send + Sync {
    fn name(&self) -> &'static str;

    fn forecast(&self, history: &[PricePoint], periods: usize) -> Result<Vec<ForecastPoint>>;
}

/// Additive model: least-squares linear trend plus a day-of-week offset.
///
/// The interval is symmetric around the prediction. Its half-width is the
/// residual spread scaled to [`INTERVAL_WIDTH`] coverage and widens with the
/// distance past the end of the history.
#[derive(Clone, Copy, Debug)]
pub struct TrendForecaster {
    pub weekly_seasonality: bool,
    pub interval_width: f64,
}

impl Default for TrendForecaster {
    fn default() -> Self {
        Self {
            weekly_seasonality: true,
            interval_width: INTERVAL_WIDTH,
        }
    }
}

struct FittedModel {
    origin: NaiveDate,
    intercept: f64,
    slope: f64,
    weekday_offsets: [f64; 7],
    sigma: f64,
    span_days: f64,
}

impl FittedModel {
    fn t(&self, date: NaiveDate) -> f64 {
        (date - self.origin).num_days() as f64
    }

    fn predict(&self, date: NaiveDate) -> f64 {
        self.intercept
            + self.slope * self.t(date)
            + self.weekday_offsets[date.weekday().num_days_from_monday() as usize]
    }
}

impl TrendForecaster {
    fn fit(&self, history: &[PricePoint]) -> Result<FittedModel> {
        let first = history
            .first()
            .ok_or_else(|| anyhow::anyhow!("Cannot fit a forecast on an empty history"))?;
        if let Some(bad) = history.iter().find(|p| !p.close_price.is_finite()) {
            anyhow::bail!("Non-finite close price on {}", bad.date);
        }

        let origin = first.date;
        let n = history.len() as f64;
        let ts: Vec<f64> = history.iter().map(|p| (p.date - origin).num_days() as f64).collect();
        let ys: Vec<f64> = history.iter().map(|p| p.close_price).collect();

        let t_mean = ts.iter().sum::<f64>() / n;
        let y_mean = ys.iter().sum::<f64>() / n;
        let sxx: f64 = ts.iter().map(|t| (t - t_mean).powi(2)).sum();
        let sxy: f64 = ts.iter().zip(&ys).map(|(t, y)| (t - t_mean) * (y - y_mean)).sum();
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = y_mean - slope * t_mean;

        let mut weekday_offsets = [0.0; 7];
        if self.weekly_seasonality {
            let mut sums = [0.0; 7];
            let mut counts = [0usize; 7];
            for (p, t) in history.iter().zip(&ts) {
                let wd = p.date.weekday().num_days_from_monday() as usize;
                sums[wd] += p.close_price - (intercept + slope * t);
                counts[wd] += 1;
            }
            let observed: Vec<usize> = (0..7).filter(|wd| counts[*wd] > 0).collect();
            if observed.len() > 1 {
                for wd in &observed {
                    weekday_offsets[*wd] = sums[*wd] / counts[*wd] as f64;
                }
                // Centre the offsets so they do not shift the trend level.
                let centre = observed.iter().map(|wd| weekday_offsets[*wd]).sum::<f64>()
                    / observed.len() as f64;
                for wd in &observed {
                    weekday_offsets[*wd] -= centre;
                }
            }
        }

        let mut model = FittedModel {
            origin,
            intercept,
            slope,
            weekday_offsets,
            sigma: 0.0,
            span_days: ts.last().copied().unwrap_or(0.0).max(1.0),
        };

        let sse: f64 = history
            .iter()
            .map(|p| (p.close_price - model.predict(p.date)).powi(2))
            .sum();
        let dof = (n - 2.0).max(1.0);
        model.sigma = (sse / dof).sqrt();
        Ok(model)
    }
}

impl Forecaster for TrendForecaster {
    fn name(&self) -> &'static str {
        "trend+weekly"
    }

    fn forecast(&self, history: &[PricePoint], periods: usize) -> Result<Vec<ForecastPoint>> {
        let model = self.fit(history)?;
        let z = normal_quantile(0.5 + self.interval_width / 2.0);
        let last_date = history.last().map(|p| p.date).unwrap_or(model.origin);

        info!(
            "Fitted {} on {} points: slope={:.4}/day, sigma={:.4}",
            self.name(),
            history.len(),
            model.slope,
            model.sigma
        );

        let future = (1..=periods as i64).map(|d| last_date + Duration::days(d));
        let points = history
            .iter()
            .map(|p| p.date)
            .chain(future)
            .map(|date| {
                let predicted = model.predict(date);
                let ahead = (date - last_date).num_days().max(0) as f64;
                let half_width = z * model.sigma * (1.0 + ahead / model.span_days).sqrt();
                ForecastPoint {
                    date,
                    predicted,
                    lower_bound: predicted - half_width,
                    upper_bound: predicted + half_width,
                }
            })
            .collect();
        Ok(points)
    }
}

/// Inverse of the standard normal CDF (Acklam's rational approximation).
fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e1,
        2.209460984245205e2,
        -2.759285104469687e2,
        1.383577518672690e2,
        -3.066479806614716e1,
        2.506628277459239,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e1,
        1.615858368580409e2,
        -1.556989798598866e2,
        6.680131188771972e1,
        -1.328068155288572e1,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-3,
        -3.223964580411365e-1,
        -2.400758277161838,
        -2.549732539343734,
        4.374664141464968,
        2.938163982698783,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-3,
        3.224671290700398e-1,
        2.445134137142996,
        3.754408661907416,
    ];
    const P_LOW: f64 = 0.02425;

    let p = p.clamp(1e-12, 1.0 - 1e-12);
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -normal_quantile(1.0 - p)
    }
}
