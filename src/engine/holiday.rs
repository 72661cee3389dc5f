//! Payment-holiday state machine and super-payment rule (`spec.md` §4.3).
//!
//! Factored out of the per-quarter loop so the transition table can be unit
//! tested directly against boundary scenarios S2/S3 without driving a full
//! path.

/// Inputs to one quarter's holiday transition.
pub struct HolidayInput {
    pub in_holiday: bool,
    pub holiday_quarters: u32,
    pub deferred: f64,
    pub holdings: f64,
    pub price: f64,
    /// Interest due this quarter (`I_t`), in dollars.
    pub interest_due: f64,
    pub loan_size: f64,
    pub wholesale_margin: f64,
    pub cash_rate: f64,
    /// Effective loan rate `R = r_t + m_w + m_a`.
    pub loan_interest_rate: f64,
    pub holiday_exit: f64,
    pub holiday_enter: f64,
    pub superpay_start_factor: f64,
    pub max_superpay_factor: f64,
    /// `Some(insured_units)` when pooling is enabled; the pooled-insured
    /// override activates when `holdings <= insured_units`.
    pub insured_units: Option<f64>,
}

/// Result of one quarter's holiday transition. `holdings` and `units_sold`
/// reflect only the interest/super-pay unit sales of this step — callers
/// still apply hedging, pool-excess transfer and annuity drawdown on top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HolidayOutcome {
    pub in_holiday: bool,
    pub holiday_quarters: u32,
    pub deferred: f64,
    pub deferred_delta: f64,
    pub holdings: f64,
    pub units_sold: f64,
    pub units_to_pool: f64,
    pub interest_paid: f64,
    pub interest_paid_to_funder: f64,
}

/// Whether the pooled-insured override is active this quarter: pooling is
/// enabled and current holdings have fallen to or below the insured-unit
/// floor.
fn pool_override_active(holdings: f64, insured_units: Option<f64>) -> bool {
    matches!(insured_units, Some(floor) if holdings <= floor)
}

pub fn step(input: &HolidayInput) -> HolidayOutcome {
    let interest_due_per_share = input.interest_due / input.price;
    let holdings_value = input.holdings * input.price;
    let funder_rate_share = input.wholesale_margin + input.cash_rate;

    let mut holdings = input.holdings;
    let mut deferred = input.deferred;
    let mut deferred_delta = 0.0;
    let mut units_sold = 0.0;
    let mut units_to_pool = 0.0;
    let mut interest_paid = 0.0;
    let mut interest_paid_to_funder = 0.0;
    let mut in_holiday = input.in_holiday;
    let mut holiday_quarters = input.holiday_quarters;

    let pooled = pool_override_active(holdings, input.insured_units);

    if input.in_holiday {
        if holdings_value > input.holiday_exit {
            in_holiday = false;
            if pooled {
                units_to_pool -= interest_due_per_share;
            } else {
                holdings -= interest_due_per_share;
                units_sold += interest_due_per_share;
            }
            interest_paid = input.interest_due;
            interest_paid_to_funder = input.loan_size * funder_rate_share * 0.25;
            holiday_quarters = 0;
        } else if pooled {
            units_to_pool -= interest_due_per_share;
        } else {
            holiday_quarters += 1;
            deferred += input.interest_due;
            deferred_delta += input.interest_due;
        }
    } else if holdings_value < input.holiday_enter {
        if pooled {
            units_to_pool -= interest_due_per_share;
        } else {
            deferred += input.interest_due;
            deferred_delta += input.interest_due;
            in_holiday = true;
            holiday_quarters += 1;
        }
    } else {
        holiday_quarters = 0;
        if pooled {
            units_to_pool -= interest_due_per_share;
        } else {
            holdings -= interest_due_per_share;
            units_sold += interest_due_per_share;
        }
        interest_paid = input.interest_due;
        interest_paid_to_funder = input.loan_size * funder_rate_share * 0.25;

        let insured_units = input.insured_units.unwrap_or(f64::NEG_INFINITY);
        if holdings_value > input.holiday_exit * input.superpay_start_factor
            && deferred > 0.0
            && holdings > insured_units
        {
            let surplus_pay = (input.max_superpay_factor * input.interest_due).min(deferred);
            let surplus_pay_per_share = surplus_pay / input.price;
            holdings -= surplus_pay_per_share;
            deferred -= surplus_pay;
            deferred_delta -= surplus_pay;
            units_sold += surplus_pay_per_share;
            interest_paid += surplus_pay;
            interest_paid_to_funder += surplus_pay * funder_rate_share / input.loan_interest_rate;
        }
    }

    HolidayOutcome {
        in_holiday,
        holiday_quarters,
        deferred,
        deferred_delta,
        holdings,
        units_sold,
        units_to_pool,
        interest_paid,
        interest_paid_to_funder,
    }
}
