//! Numerical utilities shared by the detectors.

pub mod ols;
pub mod optimization;
pub mod stats;

pub use ols::{ols_fit, OLSResult};
pub use optimization::{Minimum, NelderMead};
pub use stats::{cdf_normal, quantile_normal, two_sided_bounds};
