//! Property-based tests for the data-shaping pipeline.
//!
//! Tables are generated as random raw records: a date within a few weeks, a
//! region label and integral quote/sales counts with sales never exceeding
//! quotes.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use weekly_anomaly::core::{Dimension, Frequency, MeasureRegistry, Table};
use weekly_anomaly::detection::{AnomalyModel, DetectionConfig};
use weekly_anomaly::transform::{build_dimension_pipeline, filter_category};

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];

fn region() -> Dimension {
    Dimension::Column("REGION".into())
}

fn build_table(records: &[(i64, usize, f64, f64)]) -> Table {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    Table::new(
        "QUOTE_DATE",
        records
            .iter()
            .map(|(day, _, _, _)| start + Duration::days(*day))
            .collect(),
    )
    .with_labels("REGION", records.iter().map(|(_, r, _, _)| REGIONS[*r]))
    .unwrap()
    .with_values("QUOTE_COUNT", records.iter().map(|(_, _, q, _)| *q))
    .unwrap()
    .with_values("SALES_COUNT", records.iter().map(|(_, _, _, s)| *s))
    .unwrap()
}

/// Raw records `(day offset, region index, quotes, sales)`.
fn records_strategy() -> impl Strategy<Value = Vec<(i64, usize, f64, f64)>> {
    prop::collection::vec(
        (0..60_i64, 0..REGIONS.len(), 0..50_u32, 0.0..=1.0_f64).prop_map(
            |(day, region, quotes, share)| {
                let quotes = quotes as f64;
                (day, region, quotes, (quotes * share).floor())
            },
        ),
        1..150,
    )
}

fn piped(table: &Table, measure: &str) -> Table {
    build_dimension_pipeline(
        &MeasureRegistry::default(),
        measure,
        &region(),
        &[],
        Frequency::default(),
    )
    .unwrap()
    .fit_transform(table)
    .unwrap()
}

proptest! {
    #[test]
    fn include_and_exclude_partition_rows(
        records in records_strategy(),
        picks in prop::collection::vec(0..REGIONS.len(), 0..3),
    ) {
        let table = build_table(&records);
        let categories: Vec<String> = picks.iter().map(|&i| REGIONS[i].to_string()).collect();

        let kept = filter_category(&table, &region(), &categories, false).unwrap();
        let dropped = filter_category(&table, &region(), &categories, true).unwrap();
        prop_assert_eq!(kept.len() + dropped.len(), table.len());

        let is_picked = |label: &Option<String>| {
            label.as_ref().is_some_and(|l| categories.contains(l))
        };
        prop_assert!(kept.categorical("REGION").unwrap().iter().all(is_picked));
        prop_assert!(!dropped.categorical("REGION").unwrap().iter().any(is_picked));

        let mut rebuilt = kept.clone();
        rebuilt.concat(&dropped).unwrap();
        let mut quotes = rebuilt.values("QUOTE_COUNT").unwrap();
        let mut source = table.values("QUOTE_COUNT").unwrap();
        quotes.sort_by(|a, b| a.total_cmp(b));
        source.sort_by(|a, b| a.total_cmp(b));
        prop_assert_eq!(quotes, source);
    }

    #[test]
    fn dimension_pipeline_is_repeatable(records in records_strategy()) {
        let table = build_table(&records);
        prop_assert_eq!(piped(&table, "SALES_PROPORTION"), piped(&table, "SALES_PROPORTION"));
    }

    #[test]
    fn conversion_rate_is_sales_over_quotes(records in records_strategy()) {
        let out = piped(&build_table(&records), "CONVERSION_RATE");
        let rate = out.values("CONVERSION_RATE").unwrap();
        let quotes = out.values("QUOTE_COUNT").unwrap();
        let sales = out.values("SALES_COUNT").unwrap();
        for i in 0..out.len() {
            prop_assert!(rate[i] >= 0.0);
            let expected = if quotes[i] == 0.0 { 0.0 } else { sales[i] / quotes[i] };
            prop_assert!((rate[i] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn proportions_sum_to_one_per_week(records in records_strategy()) {
        let out = piped(&build_table(&records), "SALES_PROPORTION");
        let share = out.values("SALES_PROPORTION").unwrap();
        let sales = out.values("SALES_COUNT").unwrap();

        let mut totals: HashMap<NaiveDate, (f64, f64)> = HashMap::new();
        for (i, date) in out.dates().iter().enumerate() {
            let entry = totals.entry(*date).or_insert((0.0, 0.0));
            entry.0 += share[i];
            entry.1 += sales[i];
        }
        for (share_sum, sales_sum) in totals.values() {
            if *sales_sum > 0.0 {
                prop_assert!((share_sum - 1.0).abs() < 1e-9);
            } else {
                prop_assert_eq!(*share_sum, 0.0);
            }
        }
    }

    #[test]
    fn pipeline_runs_never_touch_the_main_table(records in records_strategy()) {
        let table = build_table(&records);
        let mut model = AnomalyModel::new(
            table,
            MeasureRegistry::default(),
            Some("QUOTE_VOLUME"),
            Some("REGION"),
        )
        .unwrap()
        .with_config(DetectionConfig::new().with_bad_category_floor(0))
        .unwrap();
        let before = model.main_table().clone();

        model.run_dimension_pipeline(None).unwrap();
        prop_assert_eq!(model.main_table(), &before);
        model.reset_working();
        prop_assert_eq!(model.working_table(), &before);
    }
}
