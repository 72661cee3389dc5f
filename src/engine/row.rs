//! `PathRow`: one record per (path, quarter) emitted by the path engine
//! (`spec.md` §3).

use serde::{Deserialize, Serialize};

/// A single quarter's outcome for one simulated path.
///
/// Rows are produced in temporal order and never mutated after emission —
/// the engine pushes a freshly built `PathRow` onto the path's output vector
/// each quarter and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathRow {
    pub path_id: u32,
    /// Period index `t ∈ [0, 4T]`.
    pub period: u32,
    pub year: u32,
    /// Intra-year quarter, 1..=4 (0 for the initial row).
    pub quarter: u32,

    /// Equity price `S_t`.
    pub price: f64,
    /// Quarterly accrued interest (`I_t = loan * R * 0.25`).
    pub interest_accrued: f64,
    /// Outstanding loan balance.
    pub loan_size: f64,
    /// Units of the equity index held.
    pub holdings: f64,
    /// Reinvestment account value (`holdings * S_t`).
    pub reinvestment_value: f64,
    /// Accumulated unpaid interest.
    pub interest_deficit: f64,
    /// `max(loan - reinvestment_value, 0)`.
    pub capital_deficit: f64,
    /// `reinvestment_value - loan - interest_deficit + cum_units_to_pool * S_t`.
    pub surplus: f64,
    /// Whether this quarter ended in a payment holiday.
    pub in_holiday: bool,
    /// Cumulative interest earned by the funder.
    pub funder_earned: f64,
    /// Annuity income paid this quarter (0 outside the annuity duration).
    pub annuity_income_q: f64,
    /// Consecutive holiday-quarter counter.
    pub holiday_quarters: u32,
    /// Whether the sub-performance threshold has been reached.
    pub subperform: bool,
    /// Interest actually paid this quarter (0 while deferred).
    pub interest_paid: f64,
    /// Portion of `interest_paid` attributed to the funder.
    pub interest_paid_to_funder: f64,
    /// Effective loan interest rate this quarter (`R = r_t + m_w + m_a`).
    pub loan_interest_rate: f64,
    /// Units sold this quarter to fund interest payments.
    pub units_sold: f64,
    /// Cumulative units sold across the path so far.
    pub cum_units_sold: f64,
    /// Change in `interest_deficit` this quarter.
    pub deferred_delta: f64,
    /// Units transferred to the shared pool this quarter.
    pub units_to_pool: f64,
    /// Cumulative units transferred to the pool.
    pub cum_units_to_pool: f64,
    /// Cumulative interest paid across the path so far.
    pub cum_interest_paid: f64,
    /// Units sold against principal this quarter (progressive repayment only).
    pub units_to_principal: f64,
    /// `units_sold + units_to_principal`.
    pub total_units_sold: f64,
    /// Net unit change from the hedge overlay this quarter (positive = bought).
    pub hedge_units_delta: f64,
}
