//! End-to-end detection scenarios on synthetic weekly data.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use weekly_anomaly::core::{Dimension, MeasureRegistry, Table};
use weekly_anomaly::detection::{AnomalyModel, AnomalyRow, DetectionConfig, Strategy};
use weekly_anomaly::error::{AnomalyError, SelectionKind};

const WEEKS: usize = 150;
const SPIKES: [usize; 5] = [20, 45, 70, 95, 120];

fn week(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 4).unwrap() + Duration::weeks(i as i64)
}

/// Weekly quote counts per region:
/// - `Alpha` and `Beta` follow short exact cycles around a flat level
/// - `Gamma` is flat apart from five large spikes
/// - `Delta` has only 80 weeks of data
/// - `Unknown Region` is flat
fn scenario() -> Table {
    let mut dates = Vec::new();
    let mut regions = Vec::new();
    let mut quotes = Vec::new();
    let mut push = |region: &'static str, weeks: usize, value: &dyn Fn(usize) -> f64| {
        for i in 0..weeks {
            dates.push(week(i));
            regions.push(region);
            quotes.push(value(i));
        }
    };
    push("Alpha", WEEKS, &|i| 1000.0 + (i % 4) as f64);
    push("Beta", WEEKS, &|i| 800.0 + 2.0 * (i % 3) as f64);
    push("Gamma", WEEKS, &|i| {
        if SPIKES.contains(&i) {
            1050.0
        } else {
            1000.0
        }
    });
    push("Delta", 80, &|_| 300.0);
    push("Unknown Region", WEEKS, &|_| 50.0);

    let sales: Vec<f64> = quotes.iter().map(|q| (q / 10.0_f64).floor()).collect();
    Table::new("QUOTE_DATE", dates)
        .with_labels("REGION", regions)
        .unwrap()
        .with_values("QUOTE_COUNT", quotes)
        .unwrap()
        .with_values("SALES_COUNT", sales)
        .unwrap()
}

fn model() -> AnomalyModel {
    AnomalyModel::new(
        scenario(),
        MeasureRegistry::default(),
        Some("QUOTE_VOLUME"),
        Some("REGION"),
    )
    .unwrap()
}

fn categories_of(rows: &[AnomalyRow]) -> Vec<String> {
    let mut out: Vec<String> = rows.iter().map(|r| r.category.clone()).collect();
    out.sort();
    out.dedup();
    out
}

#[test]
fn stl_flags_exactly_the_injected_spikes() {
    let mut model = model();
    let anomalies = model
        .detect_anomalies(Strategy::Stl, 0.05, None, &[])
        .unwrap();

    let flagged: Vec<(String, NaiveDate)> = anomalies
        .flagged()
        .iter()
        .map(|r| (r.category.clone(), r.date))
        .collect();
    let expected: Vec<(String, NaiveDate)> =
        SPIKES.iter().map(|&i| ("Gamma".to_string(), week(i))).collect();
    assert_eq!(flagged, expected);

    assert_eq!(anomalies.len(), 3 * WEEKS);
    assert!(anomalies.failures().is_empty());
    assert!(anomalies
        .rows()
        .windows(2)
        .all(|w| (w[0].date, &w[0].category) <= (w[1].date, &w[1].category)));
}

#[test]
fn sparse_and_unknown_categories_are_excluded() {
    let mut model = model();
    assert_eq!(model.bad_categories().unwrap(), vec!["Delta", "Unknown Region"]);

    let piped = model.run_dimension_pipeline(None).unwrap();
    let labels = piped.categories(&Dimension::Column("REGION".into())).unwrap();
    assert_eq!(labels, vec!["Alpha", "Beta", "Gamma"]);

    let anomalies = model.detect(Strategy::Stl).unwrap();
    assert_eq!(categories_of(anomalies.rows()), vec!["Alpha", "Beta", "Gamma"]);
}

#[test]
fn all_dimension_keeps_every_row() {
    let mut model = model();
    model.set_dimension("ALL").unwrap();
    assert!(model.bad_categories().unwrap().is_empty());

    let piped = model.run_dimension_pipeline(None).unwrap();
    let volume = piped.values("QUOTE_VOLUME").unwrap();
    assert_eq!(volume.len(), WEEKS);
    assert_eq!(volume[0], 1000.0 + 800.0 + 1000.0 + 300.0 + 50.0);
    assert_eq!(volume[WEEKS - 1], 1001.0 + 804.0 + 1000.0 + 50.0);

    let anomalies = model.detect(Strategy::Stl).unwrap();
    assert_eq!(anomalies.len(), WEEKS);
    assert_eq!(categories_of(anomalies.rows()), vec!["ALL"]);
}

#[test]
fn prefilter_restricts_categories() {
    let mut model = model();
    let anomalies = model
        .detect_anomalies(
            Strategy::Stl,
            0.05,
            Some("REGION"),
            &["Alpha".to_string(), "Gamma".to_string()],
        )
        .unwrap();
    assert_eq!(categories_of(anomalies.rows()), vec!["Alpha", "Gamma"]);
    assert_eq!(model.working_table(), model.main_table());
}

#[test]
fn parallel_run_matches_sequential() {
    let fingerprint = |rows: &[AnomalyRow]| -> Vec<(NaiveDate, String, u64, bool)> {
        rows.iter()
            .map(|r| (r.date, r.category.clone(), r.score.to_bits(), r.anomaly))
            .collect()
    };

    let mut sequential = model();
    let expected = fingerprint(sequential.detect(Strategy::Stl).unwrap().rows());

    let mut parallel = model()
        .with_config(DetectionConfig::new().with_parallel(true))
        .unwrap();
    let actual = fingerprint(parallel.detect(Strategy::Stl).unwrap().rows());
    assert_eq!(actual, expected);
}

#[test]
fn changing_selection_keeps_previous_anomalies() {
    let mut model = model();
    let before = model.detect(Strategy::Stl).unwrap().len();
    model.set_measure("SALES_VOLUME").unwrap();
    model.set_dimension("ALL").unwrap();
    assert_eq!(model.anomalies().len(), before);
    assert_eq!(model.anomalies().measure(), "QUOTE_VOLUME");
}

#[test]
fn structural_misuse_fails_fast() {
    assert!(matches!(
        "prophet".parse::<Strategy>(),
        Err(AnomalyError::InvalidSelection {
            kind: SelectionKind::Strategy,
            ..
        })
    ));
    assert!(matches!(
        AnomalyModel::new(scenario(), MeasureRegistry::default(), Some("REVENUE"), None),
        Err(AnomalyError::InvalidSelection {
            kind: SelectionKind::Measure,
            ..
        })
    ));
    assert!(matches!(
        AnomalyModel::new(scenario(), MeasureRegistry::default(), None, Some("COUNTRY")),
        Err(AnomalyError::InvalidSelection {
            kind: SelectionKind::Dimension,
            ..
        })
    ));

    let mut model = model();
    assert!(model
        .detect_anomalies(Strategy::Stl, 1.5, None, &[])
        .is_err());
    assert!(model.anomalies().is_empty());
}

#[test]
fn append_with_other_columns_is_rejected() {
    let mut model = model();
    let rows = model.main_table().len();
    let other = Table::new("QUOTE_DATE", vec![week(0)])
        .with_labels("PRODUCT", vec!["Car"])
        .unwrap()
        .with_values("QUOTE_COUNT", vec![1.0])
        .unwrap()
        .with_values("SALES_COUNT", vec![1.0])
        .unwrap();
    assert!(matches!(
        model.append(&other, true),
        Err(AnomalyError::SchemaMismatch { .. })
    ));
    assert_eq!(model.main_table().len(), rows);
}

fn noisy_series(weeks: usize, tail: &[f64]) -> Table {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut values: Vec<f64> = (0..weeks).map(|_| 500.0 + rng.gen_range(-5.0..5.0)).collect();
    values.extend_from_slice(tail);
    let n = values.len();
    Table::new("QUOTE_DATE", (0..n).map(week).collect())
        .with_labels("REGION", vec!["Alpha"; n])
        .unwrap()
        .with_values("QUOTE_COUNT", values)
        .unwrap()
        .with_values("SALES_COUNT", vec![10.0; n])
        .unwrap()
}

#[test]
fn arima_flags_out_of_interval_hold_out_point() {
    let table = noisy_series(106, &[500.0, 501.0, 600.0, 499.0]);
    let mut model = AnomalyModel::new(table, MeasureRegistry::default(), Some("QUOTE_VOLUME"), None)
        .unwrap();
    let anomalies = model.detect(Strategy::Arima).unwrap();

    assert_eq!(anomalies.len(), 4);
    let flagged: Vec<NaiveDate> = anomalies.flagged().iter().map(|r| r.date).collect();
    assert_eq!(flagged, vec![week(108)]);
}

#[test]
fn arima_deadline_is_recorded_per_category() {
    let table = noisy_series(106, &[500.0; 4]);
    let mut model = AnomalyModel::new(table, MeasureRegistry::default(), Some("QUOTE_VOLUME"), None)
        .unwrap()
        .with_config(DetectionConfig::new().with_deadline(std::time::Duration::ZERO))
        .unwrap();
    let anomalies = model.detect(Strategy::Arima).unwrap();

    assert!(anomalies.is_empty());
    assert_eq!(anomalies.failures().len(), 1);
    assert_eq!(anomalies.failures()[0].category, "Alpha");
    assert!(matches!(
        anomalies.failures()[0].error,
        AnomalyError::DeadlineExceeded { .. }
    ));
}

fn two_regions(north_week_10: f64) -> Table {
    let mut dates = Vec::new();
    let mut regions = Vec::new();
    let mut quotes = Vec::new();
    let mut rng = StdRng::seed_from_u64(7);
    for i in 0..WEEKS {
        dates.extend([week(i), week(i)]);
        regions.extend(["North", "South"]);
        let north = if i == 10 { north_week_10 } else { 1000.0 + (i % 4) as f64 };
        quotes.extend([north, 800.0 + rng.gen_range(-5.0..5.0)]);
    }
    let n = quotes.len();
    Table::new("QUOTE_DATE", dates)
        .with_labels("REGION", regions)
        .unwrap()
        .with_values("QUOTE_COUNT", quotes)
        .unwrap()
        .with_values("SALES_COUNT", vec![10.0; n])
        .unwrap()
}

#[test]
fn nan_count_is_filled_as_zero() {
    let mut model = AnomalyModel::new(
        two_regions(f64::NAN),
        MeasureRegistry::default(),
        Some("QUOTE_VOLUME"),
        Some("REGION"),
    )
    .unwrap();
    let anomalies = model.detect(Strategy::Stl).unwrap();

    assert!(anomalies.failures().is_empty());
    assert_eq!(anomalies.len(), 2 * WEEKS);
    let filled = anomalies
        .rows()
        .iter()
        .find(|r| r.category == "North" && r.date == week(10))
        .unwrap();
    assert_eq!(filled.value, 0.0);
}

#[test]
fn non_finite_category_is_recorded_not_fatal() {
    for strategy in [Strategy::Stl, Strategy::Arima] {
        let mut model = AnomalyModel::new(
            two_regions(f64::INFINITY),
            MeasureRegistry::default(),
            Some("QUOTE_VOLUME"),
            Some("REGION"),
        )
        .unwrap();
        let anomalies = model.detect(strategy).unwrap();

        assert_eq!(anomalies.failures().len(), 1, "{strategy}");
        assert_eq!(anomalies.failures()[0].category, "North");
        assert_eq!(
            anomalies.failures()[0].error,
            AnomalyError::NonFiniteData { count: 1 }
        );
        assert!(anomalies.rows().iter().all(|r| r.category == "South"));
    }
}
