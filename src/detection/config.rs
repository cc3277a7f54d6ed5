//! Detection strategy and tuning knobs.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::core::Frequency;
use crate::error::{AnomalyError, Result, SelectionKind};
use crate::models::arima::SearchOptions;

/// Per-category detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Standardised STL remainders against normal quantiles.
    Stl,
    /// Out-of-interval test points of a searched ARIMA forecast.
    Arima,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Stl => "stl",
            Strategy::Arima => "arima",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = AnomalyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stl" => Ok(Strategy::Stl),
            "arima" => Ok(Strategy::Arima),
            _ => Err(AnomalyError::InvalidSelection {
                kind: SelectionKind::Strategy,
                name: s.to_string(),
            }),
        }
    }
}

/// Categories with fewer rows than this are excluded from detection.
pub const DEFAULT_BAD_CATEGORY_FLOOR: usize = 100;

/// Configuration of a detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Significance level used when none is given explicitly.
    pub sig_level: f64,
    /// Seasonal period handed to STL.
    pub stl_period: usize,
    /// Use bisquare robustness iterations in STL.
    pub stl_robust: bool,
    /// Size of the ARIMA hold-out window.
    pub arima_steps: usize,
    /// ARIMA order-search options, including the per-category deadline.
    pub arima_search: SearchOptions,
    pub bad_category_floor: usize,
    pub frequency: Frequency,
    /// Fan categories out over the rayon thread pool.
    pub parallel: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sig_level: 0.05,
            stl_period: 12,
            stl_robust: true,
            arima_steps: 4,
            arima_search: SearchOptions::default(),
            bad_category_floor: DEFAULT_BAD_CATEGORY_FLOOR,
            frequency: Frequency::default(),
            parallel: false,
        }
    }
}

impl DetectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sig_level(mut self, sig_level: f64) -> Self {
        self.sig_level = sig_level;
        self
    }

    pub fn with_stl_period(mut self, period: usize) -> Self {
        self.stl_period = period;
        self
    }

    pub fn with_stl_robust(mut self, robust: bool) -> Self {
        self.stl_robust = robust;
        self
    }

    pub fn with_arima_steps(mut self, steps: usize) -> Self {
        self.arima_steps = steps;
        self
    }

    pub fn with_arima_search(mut self, search: SearchOptions) -> Self {
        self.arima_search = search;
        self
    }

    /// Wall-clock budget for each category's ARIMA order search.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.arima_search.deadline = Some(deadline);
        self
    }

    pub fn with_bad_category_floor(mut self, floor: usize) -> Self {
        self.bad_category_floor = floor;
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check that every knob is in range.
    pub fn validate(&self) -> Result<()> {
        validate_sig_level(self.sig_level)?;
        if self.stl_period < 2 {
            return Err(AnomalyError::InvalidParameter(format!(
                "STL period must be at least 2, got {}",
                self.stl_period
            )));
        }
        if self.arima_steps == 0 {
            return Err(AnomalyError::InvalidParameter(
                "ARIMA hold-out window must contain at least one step".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_sig_level(sig_level: f64) -> Result<()> {
    if sig_level > 0.0 && sig_level < 1.0 {
        Ok(())
    } else {
        Err(AnomalyError::InvalidParameter(format!(
            "significance level must be in (0, 1), got {sig_level}"
        )))
    }
}
