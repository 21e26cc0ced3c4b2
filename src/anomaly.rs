use crate::config::ANOMALY_Z_THRESHOLD;
use crate::data::PricePoint;
use chrono::NaiveDate;

/// A close whose z-score lies beyond the detector's threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnomalyRecord {
    pub date: NaiveDate,
    pub close_price: f64,
    pub z_score: f64,
}

pub trait AnomalyDetector: Send + Sync {
    fn detect(&self, history: &[PricePoint]) -> Vec<AnomalyRecord>;
}

/// Flags points whose population z-score exceeds `threshold` in absolute value.
#[derive(Clone, Copy, Debug)]
pub struct ZScoreDetector {
    pub threshold: f64,
}

impl Default for ZScoreDetector {
    fn default() -> Self {
        Self {
            threshold: ANOMALY_Z_THRESHOLD,
        }
    }
}

impl AnomalyDetector for ZScoreDetector {
    fn detect(&self, history: &[PricePoint]) -> Vec<AnomalyRecord> {
        let closes: Vec<f64> = history.iter().map(|p| p.close_price).collect();
        let Some(scores) = z_scores(&closes) else {
            return Vec::new();
        };

        history
            .iter()
            .zip(scores)
            .filter(|(_, z)| z.abs() > self.threshold)
            .map(|(p, z_score)| AnomalyRecord {
                date: p.date,
                close_price: p.close_price,
                z_score,
            })
            .collect()
    }
}

/// Standard scores using the population standard deviation (ddof = 0).
///
/// Returns `None` when fewer than two values are given or they are all equal.
pub fn z_scores(values: &[f64]) -> Option<Vec<f64>> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if !std.is_finite() || std == 0.0 {
        return None;
    }
    Some(values.iter().map(|v| (v - mean) / std).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::new(start + Duration::days(i as i64), *c))
            .collect()
    }

    #[test]
    fn single_outlier_in_constant_series_is_the_only_anomaly() {
        let mut closes = vec![100.0; 20];
        closes[7] = 500.0;
        let history = series(&closes);

        let anomalies = ZScoreDetector::default().detect(&history);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].date, history[7].date);
        assert_eq!(anomalies[0].close_price, 500.0);
        // With n points and one outlier the score is sqrt(n - 1).
        assert!((anomalies[0].z_score - 19.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn negative_deviations_are_flagged_too() {
        let mut closes = vec![50.0; 10];
        closes[3] = 1.0;
        let anomalies = ZScoreDetector::default().detect(&series(&closes));
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].z_score < -2.0);
    }

    #[test]
    fn flat_or_tiny_series_has_no_anomalies() {
        let detector = ZScoreDetector::default();
        assert!(detector.detect(&series(&[42.0; 12])).is_empty());
        assert!(detector.detect(&series(&[42.0])).is_empty());
        assert!(detector.detect(&[]).is_empty());
    }

    #[test]
    fn z_scores_match_population_formula() {
        let scores = z_scores(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        // mean 5, population std 2
        assert!((scores[0] - -1.5).abs() < 1e-12);
        assert!((scores[7] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn threshold_is_strict() {
        // The 9.0 sits at exactly z = 2.0 and must not be flagged.
        let anomalies = ZScoreDetector::default().detect(&series(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]));
        assert!(anomalies.is_empty());
    }
}
