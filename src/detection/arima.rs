//! Hold-out forecast scoring with a searched ARIMA model.
//!
//! The last `steps` observations are held out, an order is searched on the
//! rest, and each held-out value is checked against the forecast interval.
//! This path is much slower than STL and is kept for compatibility.

use tracing::debug;

use crate::core::Table;
use crate::detection::config::validate_sig_level;
use crate::detection::extract_series;
use crate::detection::result::ScoredPoint;
use crate::error::{AnomalyError, Result};
use crate::models::arima::{best_fit_model, starting_parameters, SearchOptions};

/// Score the final `steps` observations of one category's series.
///
/// The interval has coverage `1 − sig_level`. A held-out value is anomalous
/// when it falls outside its interval; the score is `(value − mean) / se`.
pub fn arima_anomalies(
    table: &Table,
    measure: &str,
    steps: usize,
    sig_level: f64,
    options: &SearchOptions,
) -> Result<Vec<ScoredPoint>> {
    validate_sig_level(sig_level)?;
    if steps == 0 {
        return Err(AnomalyError::InvalidParameter(
            "ARIMA hold-out window must contain at least one step".into(),
        ));
    }
    let (dates, values) = extract_series(table, measure)?;
    if values.len() <= steps {
        return Err(AnomalyError::InsufficientData {
            needed: steps + 1,
            got: values.len(),
        });
    }

    let split = values.len() - steps;
    let (train, test) = values.split_at(split);
    let bounds = starting_parameters(train, sig_level);
    let model = best_fit_model(train, bounds, options)?;
    debug!(bounds = %bounds, order = %model.order(), aicc = model.aicc(), "ARIMA order selected");

    let forecast = model.forecast(steps, 1.0 - sig_level)?;
    Ok(dates[split..]
        .iter()
        .zip(test)
        .enumerate()
        .map(|(h, (date, &value))| {
            let score = (value - forecast.mean[h]) / forecast.std_errors[h];
            ScoredPoint {
                date: *date,
                value,
                score,
                anomaly: !(forecast.lower[h] <= value && value <= forecast.upper[h]),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn weekly_table(values: Vec<f64>) -> Table {
        let start = NaiveDate::from_ymd_opt(2020, 1, 6).unwrap();
        let dates = (0..values.len() as i64)
            .map(|i| start + Duration::weeks(i))
            .collect();
        Table::new("QUOTE_DATE", dates)
            .with_values("CONVERSION_RATE", values)
            .unwrap()
    }

    fn non_seasonal() -> SearchOptions {
        SearchOptions {
            seasonal: false,
            ..SearchOptions::default()
        }
    }

    #[test]
    fn flags_only_the_out_of_interval_hold_out_point() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut values: Vec<f64> = (0..100).map(|_| 100.0 + rng.gen_range(-1.0..1.0)).collect();
        values.extend([100.0, 100.2, 130.0, 99.8]);

        let points =
            arima_anomalies(&weekly_table(values), "CONVERSION_RATE", 4, 0.05, &non_seasonal())
                .unwrap();
        assert_eq!(points.len(), 4);
        let flags: Vec<bool> = points.iter().map(|p| p.anomaly).collect();
        assert_eq!(flags, vec![false, false, true, false]);
        assert!(points[2].score > 5.0);
    }

    #[test]
    fn scores_only_hold_out_dates() {
        let mut rng = StdRng::seed_from_u64(7);
        let values: Vec<f64> = (0..80).map(|_| 50.0 + rng.gen_range(-1.0..1.0)).collect();
        let table = weekly_table(values);
        let points = arima_anomalies(&table, "CONVERSION_RATE", 3, 0.05, &non_seasonal()).unwrap();
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        assert_eq!(dates, table.dates()[77..].to_vec());
    }

    #[test]
    fn series_no_longer_than_window_is_insufficient() {
        let err = arima_anomalies(
            &weekly_table(vec![1.0, 2.0, 3.0, 4.0]),
            "CONVERSION_RATE",
            4,
            0.05,
            &non_seasonal(),
        )
        .unwrap_err();
        assert_eq!(err, AnomalyError::InsufficientData { needed: 5, got: 4 });
    }

    #[test]
    fn zero_deadline_is_recoverable() {
        let mut rng = StdRng::seed_from_u64(3);
        let values: Vec<f64> = (0..60).map(|_| rng.gen_range(0.0..1.0)).collect();
        let options = SearchOptions {
            deadline: Some(std::time::Duration::ZERO),
            ..non_seasonal()
        };
        let err = arima_anomalies(&weekly_table(values), "CONVERSION_RATE", 4, 0.05, &options)
            .unwrap_err();
        assert!(matches!(err, AnomalyError::DeadlineExceeded { .. }));
        assert!(err.is_recoverable());
    }
}
