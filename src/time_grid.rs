//! Shared quarter-to-step index mapping used by both `PricePath` and
//! `RateSeries` lookups (`spec.md` §4.2, §6).

/// Maps a quarter index `t >= 1` to the index into a per-step series (prices
/// or rates) sampled at step size `dt`: `k = ⌊t/(dt·4)⌋ − 1`.
///
/// `spec.md` §9 flags this as producing `k = -1` if ever called with `t = 0`
/// or with `dt·4 > 1`; the engine only calls it for `t >= 1`, where for
/// historical monthly data (`dt = 1/12`) it reduces to `k = 3t - 1`. This is
/// preserved as-is, matching the reference behavior.
pub fn quarter_step_index(t: u32, dt: f64) -> usize {
    debug_assert!(t >= 1, "quarter step index is undefined for t = 0");
    ((t as f64) / (dt * 4.0)).floor() as usize - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn historical_monthly_reduces_to_3t_minus_1() {
        let dt = 1.0 / 12.0;
        for t in 1..=40u32 {
            assert_eq!(quarter_step_index(t, dt), (3 * t - 1) as usize);
        }
    }
}
