//! Yearly/five-yearly hedge overlay on the reinvestment account
//! (`spec.md` §4.3 point 6).

use crate::product::HedgeParams;

/// Hedge state carried in `PathState`: the equity price observed at the
/// last yearly rebalance and the last five-yearly cap check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HedgeState {
    pub last_1y_price: f64,
    pub last_5y_price: f64,
}

impl HedgeState {
    /// Both anchors start at `S0`.
    pub fn new(s0: f64) -> Self {
        Self {
            last_1y_price: s0,
            last_5y_price: s0,
        }
    }
}

/// Apply this quarter's hedge adjustment to `holdings` in place. Returns the
/// net unit change (`hedge_units_delta`): positive when units were bought on
/// a drawdown, negative when units were sold against the upside cap.
///
/// `t` is the quarter index (`1..=4T`); the yearly cadence fires on
/// `t % 4 == 0`, the five-yearly cadence on `t % 20 == 0` (a superset of the
/// yearly quarters).
pub fn apply_hedge(holdings: &mut f64, state: &mut HedgeState, price: f64, t: u32, params: &HedgeParams) -> f64 {
    let mut delta = 0.0;

    if t % 4 == 0 {
        *holdings *= 1.0 - params.cost_pa;

        let drawdown = (price - state.last_1y_price) / state.last_1y_price;
        if drawdown < -params.max_loss {
            let buy = ((state.last_1y_price / price) * (1.0 - params.max_loss) - 1.0) * *holdings;
            *holdings += buy;
            delta += buy;
        }
        state.last_1y_price = price;
    }

    if t % 20 == 0 {
        let cap_holdings = *holdings * (state.last_5y_price / price) * (1.0 + 5.0 * params.cap);
        if *holdings > cap_holdings {
            let sell = *holdings - cap_holdings;
            *holdings -= sell;
            delta -= sell;
        }
        state.last_5y_price = price;
    }

    delta
}
