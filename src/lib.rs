//! # weekly-anomaly
//!
//! Anomaly detection for categorical, weekly business time series.
//!
//! Raw records (a date, categorical columns such as region or product, and
//! numeric counts) are collapsed onto one dimension, resampled to weekly
//! totals and turned into a measure such as a conversion rate. Each category
//! of the dimension is then scored independently, either by standardised
//! STL remainders or by checking hold-out points against an ARIMA forecast
//! interval.
//!
//! ```
//! use chrono::{Duration, NaiveDate};
//! use weekly_anomaly::prelude::*;
//!
//! let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
//! let dates: Vec<NaiveDate> = (0..104).map(|i| start + Duration::weeks(i)).collect();
//! let mut quotes: Vec<f64> = (0..104).map(|i| 400.0 + (i % 12) as f64).collect();
//! quotes[60] += 300.0;
//! let table = Table::new("QUOTE_DATE", dates)
//!     .with_labels("REGION", vec!["North"; 104])?
//!     .with_values("QUOTE_COUNT", quotes)?
//!     .with_values("SALES_COUNT", vec![40.0; 104])?;
//!
//! let mut model = AnomalyModel::new(table, MeasureRegistry::default(), Some("QUOTE_VOLUME"), None)?
//!     .with_config(DetectionConfig::new().with_bad_category_floor(52))?;
//! let anomalies = model.detect(Strategy::Stl)?;
//! assert_eq!(anomalies.flagged().len(), 1);
//! # Ok::<(), weekly_anomaly::AnomalyError>(())
//! ```

#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod core;
pub mod detection;
pub mod error;
pub mod features;
pub mod models;
pub mod seasonality;
pub mod transform;
pub mod utils;
pub mod validation;

pub use error::{AnomalyError, Result};

pub mod prelude {
    pub use crate::core::{Dimension, Frequency, MeasureRegistry, MeasureSpec, Table};
    pub use crate::detection::{AnomalyModel, AnomalyTable, DetectionConfig, Strategy};
    pub use crate::error::{AnomalyError, Result};
    pub use crate::transform::{build_dimension_pipeline, Pipeline};
}
