//! Scenario Generator: equity-price paths consumed by the Path Engine
//! (`spec.md` §4.1).

mod historical;
mod monte_carlo;

pub use historical::historical_path;
pub use monte_carlo::generate_monte_carlo_paths;

use crate::error::{EngineError, EngineResult};
use crate::time_grid::quarter_step_index;

/// One realized equity-price trajectory, sampled at a fixed step size `dt`
/// (1/120 year for Monte Carlo, 1/12 year for historical monthly data).
/// `prices[0]` is the price at `t = 0` (`S0`).
#[derive(Debug, Clone, PartialEq)]
pub struct PricePath {
    pub id: u32,
    pub dt: f64,
    pub prices: Vec<f64>,
}

impl PricePath {
    /// Price at `t = 0`.
    pub fn s0(&self) -> f64 {
        self.prices[0]
    }

    /// Price applicable to quarter `t >= 1`, via the shared quarter/step
    /// index mapping.
    pub fn price_at(&self, t: u32) -> f64 {
        self.prices[quarter_step_index(t, self.dt)]
    }

    /// Validate that this path (and an accompanying rate series length,
    /// when it is a series) covers at least `horizon_years` of data at this
    /// path's step size, per `spec.md` §4.3 failure semantics: "the engine
    /// itself requires `|prices| >= 12*T` and `|rates| >= 12*T`" (stated in
    /// months; equivalently `1/dt * T` steps at this path's granularity).
    pub fn require_horizon(&self, horizon_years: f64) -> EngineResult<()> {
        let required = (horizon_years / self.dt).round() as usize;
        if self.prices.len() < required {
            return Err(EngineError::InsufficientSeries {
                required,
                actual: self.prices.len(),
            });
        }
        if self.prices.iter().any(|&s| s <= 0.0) {
            return Err(EngineError::InvalidParameters(
                "price path contains a non-positive price".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_series() {
        let path = PricePath {
            id: 0,
            dt: 1.0 / 12.0,
            prices: vec![100.0; 12],
        };
        assert!(matches!(
            path.require_horizon(5.0),
            Err(EngineError::InsufficientSeries { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_price() {
        let path = PricePath {
            id: 0,
            dt: 1.0 / 12.0,
            prices: vec![100.0, 0.0, 50.0],
        };
        assert!(matches!(
            path.require_horizon(0.1),
            Err(EngineError::InvalidParameters(_))
        ));
    }

    #[test]
    fn price_at_uses_shared_index_mapping() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let path = PricePath {
            id: 0,
            dt: 1.0 / 12.0,
            prices,
        };
        assert_eq!(path.price_at(1), path.prices[2]);
        assert_eq!(path.price_at(4), path.prices[11]);
    }
}
