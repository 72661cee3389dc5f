//! Product parameters: the immutable inputs to a single path-engine run.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Repayment variant selected at loan origination.
///
/// See `spec.md` §6 "Variant semantics". `borrower_profit_share` is a fixed
/// constant of the product design (0.3), not a per-run parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanVariant {
    /// Interest is paid (or deferred) quarterly; the full annuity total is
    /// repaid as a lump sum at term.
    InterestOnly,
    /// The annuity is funded by progressively selling units to repay
    /// principal each quarter; no lump-sum repayment at term.
    PrincipalPlusInterest,
    /// Like interest-only, but the term repayment is reduced by the
    /// borrower's share of any scheme profit.
    Hybrid,
}

/// Share of scheme profit returned to the borrower under the hybrid variant.
pub const BORROWER_PROFIT_SHARE: f64 = 0.3;

/// Share of reinvestment-account profit retained by the funder (lender).
pub const LENDER_PROFIT_SHARE: f64 = 0.5;

impl LoanVariant {
    /// Whether units are sold against principal each annuity quarter
    /// instead of the annuity being drawn down as additional loan balance.
    pub fn progressive_repayment(self) -> bool {
        matches!(self, LoanVariant::PrincipalPlusInterest)
    }

    /// The term repayment lump sum `C`, given the total annuity paid
    /// (`annual_income * annuity_duration_years`) and, for the hybrid
    /// variant, the scheme profit realized on this path
    /// (`max(R_T - L0 - D_T, 0)`).
    pub fn repayment_amount(self, total_annuity: f64, scheme_profit: f64) -> f64 {
        match self {
            LoanVariant::InterestOnly => total_annuity,
            LoanVariant::PrincipalPlusInterest => 0.0,
            LoanVariant::Hybrid => {
                (total_annuity - BORROWER_PROFIT_SHARE * scheme_profit).max(0.0)
            }
        }
    }
}

/// Optional equity hedge overlay parameters (`spec.md` §4.3 point 6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HedgeParams {
    /// Maximum tolerated one-year drawdown before the hedge buys units (`λ`).
    pub max_loss: f64,
    /// Five-year upside cap applied to the hedge (`κ`).
    pub cap: f64,
    /// Annual hedging cost, charged quarterly at the yearly hedge cadence (`c_h`).
    pub cost_pa: f64,
}

impl Default for HedgeParams {
    fn default() -> Self {
        Self {
            max_loss: 0.1,
            cap: 0.2,
            cost_pa: 0.01,
        }
    }
}

/// Immutable inputs for one path-engine run. See `spec.md` §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductParameters {
    /// Loan horizon in years (`T`).
    pub horizon_years: f64,
    /// Annuity payment duration in years (`T_a <= T`).
    pub annuity_duration_years: f64,
    /// Total initial loan principal (`L0`).
    pub total_loan: f64,
    /// Fraction of `L0` placed in the reinvestment account (`φ`).
    pub reinvest_fraction: f64,
    /// Annual annuity income paid to the borrower (`A`).
    pub annual_income: f64,
    /// Wholesale funding margin (`m_w`).
    pub wholesale_margin: f64,
    /// Additional retail margin (`m_a`).
    pub additional_margin: f64,
    /// Insurer profit multiplier (`π = 1 + μ`).
    pub insurer_profit_multiplier: f64,
    /// Insurance cost over the term, in dollars (`I`). This is the quantity
    /// the Insurance Solver searches for.
    pub insurance_cost: f64,
    /// Holiday-entry fraction of `R0` (`h_in`).
    pub holiday_enter_fraction: f64,
    /// Holiday-exit fraction of `R0` (`h_out >= h_in`).
    pub holiday_exit_fraction: f64,
    /// Super-pay start factor, applied to `H_out` (`σ_s >= 1`).
    pub superpay_start_factor: f64,
    /// Super-pay cap factor, applied to the quarter's interest due (`σ_m ∈ (0, 1]`).
    pub max_superpay_factor: f64,
    /// Consecutive holiday quarters before a path is flagged sub-performing.
    pub subperform_threshold_quarters: u32,
    /// Loan variant (drives `C` and progressive repayment).
    pub variant: LoanVariant,
    /// At-risk capital contribution reducing insurer exposure at term.
    pub at_risk_capital: f64,
    /// Whether insured-unit pooling is enabled.
    pub pooling_enabled: bool,
    /// Floor below which holdings are treated as pool-insured: while
    /// `holdings <= insured_units`, interest is charged to the shared pool
    /// instead of sold from the reinvestment account. Unused unless
    /// `pooling_enabled` is set.
    pub insured_units: f64,
    /// Whether the reinvestment account is hedged.
    pub hedging_enabled: bool,
    /// Hedge parameters, required when `hedging_enabled` is true.
    pub hedge: Option<HedgeParams>,
}

impl ProductParameters {
    /// Total annuity income paid over the annuity duration (`A * T_a`).
    pub fn total_annuity(&self) -> f64 {
        self.annual_income * self.annuity_duration_years
    }

    /// Validate the invariants in `spec.md` §3. Called once before a run;
    /// the engine itself assumes these hold.
    pub fn validate(&self) -> EngineResult<()> {
        if !(0.0..=1.0).contains(&self.reinvest_fraction) {
            return Err(EngineError::InvalidParameters(format!(
                "reinvest_fraction must be in [0, 1], got {}",
                self.reinvest_fraction
            )));
        }
        if self.holiday_exit_fraction < self.holiday_enter_fraction {
            return Err(EngineError::InvalidParameters(format!(
                "holiday_exit_fraction ({}) must be >= holiday_enter_fraction ({})",
                self.holiday_exit_fraction, self.holiday_enter_fraction
            )));
        }
        if !(self.max_superpay_factor > 0.0 && self.max_superpay_factor <= 1.0) {
            return Err(EngineError::InvalidParameters(format!(
                "max_superpay_factor must be in (0, 1], got {}",
                self.max_superpay_factor
            )));
        }
        if self.superpay_start_factor < 1.0 {
            return Err(EngineError::InvalidParameters(format!(
                "superpay_start_factor must be >= 1, got {}",
                self.superpay_start_factor
            )));
        }
        if self.annuity_duration_years > self.horizon_years {
            return Err(EngineError::InvalidParameters(format!(
                "annuity_duration_years ({}) must be <= horizon_years ({})",
                self.annuity_duration_years, self.horizon_years
            )));
        }
        if self.insurance_cost < 0.0 {
            return Err(EngineError::InvalidParameters(format!(
                "insurance_cost must be >= 0, got {}",
                self.insurance_cost
            )));
        }
        if self.hedging_enabled && self.hedge.is_none() {
            return Err(EngineError::InvalidParameters(
                "hedging_enabled is true but no HedgeParams supplied".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> ProductParameters {
        ProductParameters {
            horizon_years: 10.0,
            annuity_duration_years: 0.0,
            total_loan: 1_200_000.0,
            reinvest_fraction: 1.0,
            annual_income: 0.0,
            wholesale_margin: 0.02,
            additional_margin: 0.015,
            insurer_profit_multiplier: 1.5,
            insurance_cost: 0.0,
            holiday_enter_fraction: 0.0,
            holiday_exit_fraction: 0.0,
            superpay_start_factor: 1.0,
            max_superpay_factor: 1.0,
            subperform_threshold_quarters: 6,
            variant: LoanVariant::InterestOnly,
            at_risk_capital: 0.0,
            pooling_enabled: false,
            insured_units: 0.0,
            hedging_enabled: false,
            hedge: None,
        }
    }

    #[test]
    fn rejects_holiday_exit_below_enter() {
        let mut p = base_params();
        p.holiday_enter_fraction = 1.0;
        p.holiday_exit_fraction = 0.5;
        assert!(matches!(p.validate(), Err(EngineError::InvalidParameters(_))));
    }

    #[test]
    fn rejects_hedging_without_params() {
        let mut p = base_params();
        p.hedging_enabled = true;
        assert!(matches!(p.validate(), Err(EngineError::InvalidParameters(_))));
    }

    #[test]
    fn accepts_valid_params() {
        assert!(base_params().validate().is_ok());
    }

    #[test]
    fn hybrid_repayment_clips_at_zero() {
        let total_annuity = 10_000.0;
        let huge_profit = 1_000_000.0;
        let repay = LoanVariant::Hybrid.repayment_amount(total_annuity, huge_profit);
        assert_eq!(repay, 0.0);
    }

    #[test]
    fn interest_only_ignores_scheme_profit() {
        let repay = LoanVariant::InterestOnly.repayment_amount(45_000.0, 999_999.0);
        assert_eq!(repay, 45_000.0);
    }

    #[test]
    fn principal_plus_interest_never_repays_lump_sum() {
        assert_eq!(
            LoanVariant::PrincipalPlusInterest.repayment_amount(45_000.0, 10_000.0),
            0.0
        );
    }
}
