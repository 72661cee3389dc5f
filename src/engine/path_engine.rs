//! Per-quarter simulation loop for a single `(PricePath, RateSeries,
//! ProductParameters)` combination (`spec.md` §4.3).

use log::debug;

use crate::error::EngineResult;
use crate::paths::PricePath;
use crate::product::ProductParameters;
use crate::rates::RateSeries;

use super::hedge::{self, HedgeState};
use super::holiday::{self, HolidayInput};
use super::row::PathRow;
use super::state::PathState;

/// Derived constants computed once per run from `ProductParameters`, the
/// rate series' geometric mean, and `S0` (`spec.md` §4.3 "Constants derived
/// once").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constants {
    /// Initial reinvestment account value, `R0`.
    pub r0: f64,
    /// Holiday-entry threshold in dollars, `H_in = R0 * h_in`.
    pub h_in: f64,
    /// Holiday-exit threshold in dollars, `H_out = R0 * h_out`.
    pub h_out: f64,
    /// Quarterly annuity drawdown, `A_q = A * 0.25`.
    pub a_q: f64,
    /// Number of quarters the annuity runs for, `Q_a = 4 * T_a`.
    pub q_a: u32,
    /// Rows per path including row 0, `T_q = 4*T + 1`.
    pub t_q: u32,
}

impl Constants {
    pub fn derive(params: &ProductParameters, rates: &RateSeries) -> Self {
        let r_bar = rates.geometric_mean();
        let r0 = params.total_loan * params.reinvest_fraction
            - params.insurer_profit_multiplier * params.insurance_cost
                / (1.0 + r_bar).powf(params.horizon_years);
        let h_in = r0 * params.holiday_enter_fraction;
        let h_out = r0 * params.holiday_exit_fraction;
        let a_q = params.annual_income * 0.25;
        let q_a = (4.0 * params.annuity_duration_years).round() as u32;
        let t_q = (4.0 * params.horizon_years).round() as u32 + 1;
        Self {
            r0,
            h_in,
            h_out,
            a_q,
            q_a,
            t_q,
        }
    }
}

/// The pooling two-pass protocol's second-pass inputs (`spec.md` §4.5
/// "Optional pooling two-pass"): an expected per-quarter reinvestment curve
/// (indexed by absolute period `t`, as produced by an unpooled first pass
/// averaged across paths) and the insured-unit floor.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolingContext {
    pub expected_reinvestment: Vec<f64>,
    pub insured_units: f64,
}

/// Run the quarterly loop over one path, producing one `PathRow` per
/// quarter from `t=0` to `t=4*T`. `pooling` must be `Some` when
/// `params.pooling_enabled` is set and the pool-excess transfer (§4.3 step
/// 5) should run; the pooled-insured override in the holiday state machine
/// uses `params.insured_units` directly and does not require `pooling`.
pub fn run(
    path: &PricePath,
    rates: &RateSeries,
    params: &ProductParameters,
    pooling: Option<&PoolingContext>,
) -> EngineResult<Vec<PathRow>> {
    params.validate()?;
    path.require_horizon(params.horizon_years)?;
    rates.require_horizon(params.horizon_years)?;

    let constants = Constants::derive(params, rates);
    let s0 = path.s0();
    let progressive = params.variant.progressive_repayment();

    let mut holdings = constants.r0 / s0;
    let mut loan = params.total_loan * params.reinvest_fraction + constants.a_q;
    let mut initial_units_to_principal = 0.0;
    if progressive {
        initial_units_to_principal = constants.a_q / s0;
        loan -= constants.a_q;
        holdings -= initial_units_to_principal;
    }

    let mut state = PathState {
        holdings,
        loan_size: loan,
        in_holiday: params.holiday_enter_fraction > 1.0,
        holiday_quarters: 0,
        deferred: 0.0,
        cum_units_sold: 0.0,
        cum_units_to_pool: 0.0,
        cum_interest_paid: 0.0,
        funder_earned: 0.0,
        last_1y_hedge_price: s0,
        last_5y_hedge_price: s0,
    };

    let total_quarters = constants.t_q - 1;
    let mut rows = Vec::with_capacity(constants.t_q as usize);

    let holdings_value_0 = state.reinvestment_value(s0);
    rows.push(PathRow {
        path_id: path.id,
        period: 0,
        year: 0,
        quarter: 0,
        price: s0,
        interest_accrued: 0.0,
        loan_size: state.loan_size,
        holdings: state.holdings,
        reinvestment_value: holdings_value_0,
        interest_deficit: state.deferred,
        capital_deficit: (state.loan_size - holdings_value_0).max(0.0),
        surplus: holdings_value_0 - state.loan_size - state.deferred,
        in_holiday: state.in_holiday,
        funder_earned: state.funder_earned,
        annuity_income_q: constants.a_q,
        holiday_quarters: 0,
        subperform: false,
        interest_paid: 0.0,
        interest_paid_to_funder: 0.0,
        loan_interest_rate: 0.0,
        units_sold: 0.0,
        cum_units_sold: 0.0,
        deferred_delta: 0.0,
        units_to_pool: 0.0,
        cum_units_to_pool: 0.0,
        cum_interest_paid: 0.0,
        units_to_principal: initial_units_to_principal,
        total_units_sold: initial_units_to_principal,
        hedge_units_delta: 0.0,
    });

    let mut hedge_state = HedgeState {
        last_1y_price: state.last_1y_hedge_price,
        last_5y_price: state.last_5y_hedge_price,
    };

    for t in 1..=total_quarters {
        let price = path.price_at(t);
        let rate = rates.rate_at(t, path.dt);
        let loan_interest_rate = rate + params.wholesale_margin + params.additional_margin;
        let interest_accrued = state.loan_size * loan_interest_rate * 0.25;

        let insured_units = if params.pooling_enabled {
            Some(params.insured_units)
        } else {
            None
        };

        let outcome = holiday::step(&HolidayInput {
            in_holiday: state.in_holiday,
            holiday_quarters: state.holiday_quarters,
            deferred: state.deferred,
            holdings: state.holdings,
            price,
            interest_due: interest_accrued,
            loan_size: state.loan_size,
            wholesale_margin: params.wholesale_margin,
            cash_rate: rate,
            loan_interest_rate,
            holiday_exit: constants.h_out,
            holiday_enter: constants.h_in,
            superpay_start_factor: params.superpay_start_factor,
            max_superpay_factor: params.max_superpay_factor,
            insured_units,
        });

        state.in_holiday = outcome.in_holiday;
        state.holiday_quarters = outcome.holiday_quarters;
        state.deferred = outcome.deferred;
        state.holdings = outcome.holdings;
        let mut units_to_pool = outcome.units_to_pool;

        if params.pooling_enabled && !state.in_holiday && state.deferred < 1.0 {
            if let Some(ctx) = pooling {
                if let Some(&expected) = ctx.expected_reinvestment.get(t as usize) {
                    let holdings_value = state.holdings * price;
                    if holdings_value > expected && state.holdings > ctx.insured_units {
                        let excess_units = (holdings_value - expected) / price;
                        state.holdings -= excess_units;
                        units_to_pool = excess_units;
                        debug!("path {}: transferred {excess_units:.4} units to pool at t={t}", path.id);
                    }
                }
            }
        }

        let mut hedge_units_delta = 0.0;
        if params.hedging_enabled {
            let hedge_params = params
                .hedge
                .as_ref()
                .expect("hedging_enabled implies hedge params (checked by validate)");
            hedge_units_delta = hedge::apply_hedge(&mut state.holdings, &mut hedge_state, price, t, hedge_params);
        }
        state.last_1y_hedge_price = hedge_state.last_1y_price;
        state.last_5y_hedge_price = hedge_state.last_5y_price;

        state.cum_units_to_pool += units_to_pool;
        state.funder_earned += outcome.interest_paid_to_funder;
        state.cum_units_sold += outcome.units_sold;
        state.cum_interest_paid += outcome.interest_paid;

        let mut annuity_income_q = 0.0;
        let mut units_to_principal = 0.0;
        if t < constants.q_a {
            annuity_income_q = constants.a_q;
            if progressive {
                units_to_principal = constants.a_q / price;
            }
        }

        let subperform = state.holiday_quarters >= params.subperform_threshold_quarters;

        let year = ((t - 1) >> 2) + 1;
        let quarter = t - (year - 1) * 4;

        let holdings_value = state.holdings * price;
        let capital_deficit = (state.loan_size - holdings_value).max(0.0);
        let surplus = holdings_value - state.loan_size - state.deferred + state.cum_units_to_pool * price;
        let total_units_sold = outcome.units_sold + units_to_principal;

        if state.in_holiday && outcome.interest_paid > 0.0 {
            debug!("path {}: paid interest while reported in_holiday at t={t}", path.id);
        }

        rows.push(PathRow {
            path_id: path.id,
            period: t,
            year,
            quarter,
            price,
            interest_accrued,
            loan_size: state.loan_size,
            holdings: state.holdings,
            reinvestment_value: holdings_value,
            interest_deficit: state.deferred,
            capital_deficit,
            surplus,
            in_holiday: state.in_holiday,
            funder_earned: state.funder_earned,
            annuity_income_q,
            holiday_quarters: state.holiday_quarters,
            subperform,
            interest_paid: outcome.interest_paid,
            interest_paid_to_funder: outcome.interest_paid_to_funder,
            loan_interest_rate,
            units_sold: outcome.units_sold,
            cum_units_sold: state.cum_units_sold,
            deferred_delta: outcome.deferred_delta,
            units_to_pool,
            cum_units_to_pool: state.cum_units_to_pool,
            cum_interest_paid: state.cum_interest_paid,
            units_to_principal,
            total_units_sold,
            hedge_units_delta,
        });

        if t < constants.q_a {
            if progressive {
                state.holdings -= units_to_principal;
            } else {
                state.loan_size += constants.a_q;
            }
        }
    }

    Ok(rows)
}
