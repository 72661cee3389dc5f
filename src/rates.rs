//! Per-quarter short-rate source (`spec.md` §4.2).

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::time_grid::quarter_step_index;

/// A short-rate series, either a constant applied to every quarter or a
/// sequence of per-step rates sampled at the same step granularity as the
/// accompanying `PricePath` (`dt` per entry — e.g. monthly steps for a
/// historical path, or 1/120-year steps for a Monte Carlo path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RateSeries {
    Constant(f64),
    Series(Vec<f64>),
}

impl RateSeries {
    /// The rate applicable to quarter `t >= 1`, given the step size `dt` of
    /// the underlying series. See `crate::time_grid::quarter_step_index`.
    pub fn rate_at(&self, t: u32, dt: f64) -> f64 {
        match self {
            RateSeries::Constant(r) => *r,
            RateSeries::Series(series) => {
                let idx = quarter_step_index(t, dt);
                series[idx]
            }
        }
    }

    /// Geometric mean of the per-step rates (`r̄` in `spec.md` §4.2), used to
    /// discount the insurance-cost term when deriving `R0`. For a constant
    /// rate this is just the rate itself.
    pub fn geometric_mean(&self) -> f64 {
        match self {
            RateSeries::Constant(r) => *r,
            RateSeries::Series(series) => {
                let product: f64 = series.iter().map(|r| 1.0 + r).product();
                product.powf(1.0 / series.len() as f64) - 1.0
            }
        }
    }

    /// Number of per-step entries available (`usize::MAX` for a constant
    /// series, which never runs out).
    pub fn len(&self) -> usize {
        match self {
            RateSeries::Constant(_) => usize::MAX,
            RateSeries::Series(series) => series.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RateSeries::Series(s) if s.is_empty())
    }

    /// Reject a `Series` shorter than `12*horizon_years` monthly entries; a
    /// `Constant` always covers any horizon (`spec.md` §4.3 failure
    /// semantics).
    pub fn require_horizon(&self, horizon_years: f64) -> EngineResult<()> {
        if let RateSeries::Series(series) = self {
            let required = (horizon_years * 12.0).round() as usize;
            if series.len() < required {
                return Err(EngineError::InsufficientSeries {
                    required,
                    actual: series.len(),
                });
            }
        }
        Ok(())
    }
}
