//! Monte Carlo geometric-Brownian-motion price path generator
//! (`spec.md` §4.1).

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use super::PricePath;

/// Time step for Monte Carlo paths: 1/120 year (`spec.md` §6).
pub const DT_MONTE_CARLO: f64 = 1.0 / 120.0;

/// Generate `total_paths` independent GBM price paths over `[0, loan_duration]`.
///
/// Draws are taken from a single seeded RNG, path 0 first then path 1, etc.,
/// so that fixing `seed` makes the full batch of paths reproducible
/// regardless of how the resulting paths are later consumed (in parallel or
/// not) — see `spec.md` §5 determinism.
pub fn generate_monte_carlo_paths(
    loan_duration_years: f64,
    equity_return: f64,
    volatility: f64,
    total_paths: u32,
    s0: f64,
    seed: u64,
) -> Vec<PricePath> {
    let dt = DT_MONTE_CARLO;
    let n = (loan_duration_years / dt).round() as usize;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut paths = Vec::with_capacity(total_paths as usize);
    for path_id in 0..total_paths {
        paths.push(generate_one_path(path_id, n, loan_duration_years, equity_return, volatility, s0, &mut rng));
    }
    paths
}

fn generate_one_path(
    path_id: u32,
    n: usize,
    loan_duration_years: f64,
    equity_return: f64,
    volatility: f64,
    s0: f64,
    rng: &mut StdRng,
) -> PricePath {
    let drift = equity_return - 0.5 * volatility * volatility;
    let mut prices = Vec::with_capacity(n);
    let mut cumulative_z = 0.0;
    for i in 0..n {
        let z: f64 = rng.sample(StandardNormal);
        cumulative_z += z;
        let w_i = cumulative_z * DT_MONTE_CARLO.sqrt();
        let t_i = if n > 1 {
            (i as f64) * loan_duration_years / ((n - 1) as f64)
        } else {
            0.0
        };
        let x_i = drift * t_i + volatility * w_i;
        prices.push(s0 * x_i.exp());
    }

    PricePath {
        id: path_id,
        dt: DT_MONTE_CARLO,
        prices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vol_zero_drift_is_flat() {
        let paths = generate_monte_carlo_paths(5.0, 0.0, 0.0, 3, 100.0, 0);
        for path in &paths {
            for &s in &path.prices {
                assert!((s - 100.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn deterministic_with_fixed_seed() {
        let a = generate_monte_carlo_paths(10.0, 0.0975, 0.15, 20, 100.0, 42);
        let b = generate_monte_carlo_paths(10.0, 0.0975, 0.15, 20, 100.0, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = generate_monte_carlo_paths(10.0, 0.0975, 0.15, 5, 100.0, 1);
        let b = generate_monte_carlo_paths(10.0, 0.0975, 0.15, 5, 100.0, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn path_count_and_length_match_request() {
        let loan_duration = 30.0;
        let paths = generate_monte_carlo_paths(loan_duration, 0.0975, 0.15, 7, 100.0, 0);
        assert_eq!(paths.len(), 7);
        let expected_n = (loan_duration / DT_MONTE_CARLO).round() as usize;
        for path in &paths {
            assert_eq!(path.prices.len(), expected_n);
        }
    }

    #[test]
    fn sequential_paths_are_not_resampled_from_scratch() {
        // Path 0 and path 1 should differ even with identical inputs, since
        // they draw from successive slices of the same RNG stream.
        let paths = generate_monte_carlo_paths(5.0, 0.05, 0.2, 2, 100.0, 7);
        assert_ne!(paths[0].prices, paths[1].prices);
    }
}
