//! STL remainder scoring.

use crate::core::Table;
use crate::detection::config::validate_sig_level;
use crate::detection::extract_series;
use crate::detection::result::ScoredPoint;
use crate::error::Result;
use crate::seasonality::STL;
use crate::utils::stats::{mean, population_std, two_sided_bounds};

/// Remainders whose spread is below this fraction of the series magnitude
/// are treated as an exact fit and left unscored.
const DEGENERATE_SPREAD: f64 = 1e-10;

/// Score every observation of one category's series by its STL remainder.
///
/// Remainders are standardised as `(r − mean) / std` with the population
/// standard deviation. A point is anomalous when its score is at or beyond
/// `Φ⁻¹(sig/2)` or `Φ⁻¹(1 − sig/2)`. If the remainder has no spread every
/// score is NaN and nothing is flagged.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use weekly_anomaly::core::Table;
/// use weekly_anomaly::detection::stl_anomalies;
/// use weekly_anomaly::seasonality::STL;
///
/// let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
/// let dates = (0..60).map(|i| start + chrono::Duration::weeks(i)).collect();
/// let mut values: Vec<f64> = (0..60).map(|i| 100.0 + (i % 12) as f64).collect();
/// values[30] += 80.0;
/// let table = Table::new("QUOTE_DATE", dates)
///     .with_values("QUOTE_VOLUME", values)
///     .unwrap();
///
/// let points = stl_anomalies(&table, "QUOTE_VOLUME", &STL::new(12).robust(), 0.05).unwrap();
/// assert!(points[30].anomaly);
/// ```
pub fn stl_anomalies(
    table: &Table,
    measure: &str,
    stl: &STL,
    sig_level: f64,
) -> Result<Vec<ScoredPoint>> {
    validate_sig_level(sig_level)?;
    let (dates, values) = extract_series(table, measure)?;
    let parts = stl.decompose(&values)?;
    let scores = standardise(&parts.remainder, &values);
    let (lower, upper) = two_sided_bounds(sig_level);

    Ok(dates
        .into_iter()
        .zip(values)
        .zip(scores)
        .map(|((date, value), score)| ScoredPoint {
            date,
            value,
            score,
            anomaly: score <= lower || score >= upper,
        })
        .collect())
}

fn standardise(remainder: &[f64], series: &[f64]) -> Vec<f64> {
    let centre = mean(remainder);
    let spread = population_std(remainder);
    let magnitude = series.iter().fold(1.0_f64, |acc, y| acc.max(y.abs()));
    if !(spread > DEGENERATE_SPREAD * magnitude) {
        return vec![f64::NAN; remainder.len()];
    }
    remainder.iter().map(|r| (r - centre) / spread).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnomalyError;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn weekly_table(values: Vec<f64>) -> Table {
        let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let dates = (0..values.len() as i64)
            .map(|i| start + Duration::weeks(i))
            .collect();
        Table::new("QUOTE_DATE", dates)
            .with_values("QUOTE_VOLUME", values)
            .unwrap()
    }

    #[test]
    fn scores_are_standardised() {
        let remainder = [1.0, -1.0, 3.0, -3.0];
        let scores = standardise(&remainder, &[10.0; 4]);
        let spread = population_std(&remainder);
        assert_relative_eq!(scores[2], 3.0 / spread, epsilon = 1e-12);
        assert_relative_eq!(scores.iter().sum::<f64>(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_series_is_never_flagged() {
        let points = stl_anomalies(
            &weekly_table(vec![500.0; 60]),
            "QUOTE_VOLUME",
            &STL::new(12).robust(),
            0.05,
        )
        .unwrap();
        assert_eq!(points.len(), 60);
        assert!(points.iter().all(|p| p.score.is_nan() && !p.anomaly));
    }

    #[test]
    fn spikes_on_a_flat_series_are_the_only_flags() {
        let mut values = vec![1000.0; 150];
        let spikes = [20, 45, 70, 95, 120];
        for &i in &spikes {
            values[i] += 50.0;
        }
        let points =
            stl_anomalies(&weekly_table(values), "QUOTE_VOLUME", &STL::new(12).robust(), 0.05)
                .unwrap();
        let flagged: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.anomaly)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(flagged, spikes);
    }

    #[test]
    fn rows_come_back_in_date_order() {
        let table = weekly_table((0..40).map(|i| (i % 12) as f64).collect());
        let reversed = table.take(&(0..40).rev().collect::<Vec<_>>());
        let points = stl_anomalies(&reversed, "QUOTE_VOLUME", &STL::new(12), 0.05).unwrap();
        assert!(points.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn short_series_is_insufficient() {
        let err = stl_anomalies(&weekly_table(vec![1.0; 10]), "QUOTE_VOLUME", &STL::new(12), 0.05)
            .unwrap_err();
        assert!(matches!(err, AnomalyError::InsufficientData { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn missing_measure_is_structural() {
        let err = stl_anomalies(&weekly_table(vec![1.0; 30]), "CONVERSION_RATE", &STL::new(12), 0.05)
            .unwrap_err();
        assert!(!err.is_recoverable());
    }
}
