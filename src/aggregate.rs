//! Aggregator: folds per-path row sequences into quantile paths, per-period
//! means and end-of-term statistics (`spec.md` §4.4).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::row::PathRow;
use crate::product::{ProductParameters, LENDER_PROFIT_SHARE};

/// End-of-term (`period = 4T`) quantities for a single path, derived from
/// its last emitted row plus the selected product variant's repayment rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndOfTerm {
    pub path_id: u32,
    pub price: f64,
    pub reinvestment_value: f64,
    pub interest_deficit: f64,
    pub funder_earned: f64,
    pub cum_units_to_pool: f64,
    /// Scheme profit realized on this path, `max(R_T - L0 - D_T, 0)`.
    pub scheme_profit: f64,
    /// Repayment lump sum `C` per `spec.md` §6 variant semantics.
    pub repayment_amount: f64,
}

pub fn end_of_term(rows: &[PathRow], params: &ProductParameters) -> EndOfTerm {
    let last = rows.last().expect("a path always has at least row 0");
    let scheme_profit = (last.reinvestment_value - params.total_loan - last.interest_deficit).max(0.0);
    let repayment_amount = params.variant.repayment_amount(params.total_annuity(), scheme_profit);
    EndOfTerm {
        path_id: last.path_id,
        price: last.price,
        reinvestment_value: last.reinvestment_value,
        interest_deficit: last.interest_deficit,
        funder_earned: last.funder_earned,
        cum_units_to_pool: last.cum_units_to_pool,
        scheme_profit,
        repayment_amount,
    }
}

/// The lender's (funder's) profit share of one path's scheme profit, plus
/// its share of any pooled units at the terminal price. Clipped at zero,
/// matching the original's `.clip(0, None)`.
fn lender_profit_share_amount(e: &EndOfTerm, total_loan: f64) -> f64 {
    let pool_profit = e.cum_units_to_pool.max(0.0) * LENDER_PROFIT_SHARE * e.price;
    (LENDER_PROFIT_SHARE * (e.reinvestment_value - total_loan - e.interest_deficit) + pool_profit).max(0.0)
}

/// Per-quarter reinvestment payout, `max(L0 + D_T - R_T - C - ARC, 0)` — the
/// quantity the Insurance Solver's expected payout `Π(I)` averages over
/// paths.
pub fn insurance_payout(e: &EndOfTerm, total_loan: f64, at_risk_capital: f64) -> f64 {
    (total_loan + e.interest_deficit - e.reinvestment_value - e.repayment_amount - at_risk_capital).max(0.0)
}

/// `E_paths[insurance_payout(...)]` across all paths — the `Π(I)` of
/// `spec.md` §4.5, used directly by the Insurance Solver's secant loop.
pub fn expected_insurance_payout(paths: &[Vec<PathRow>], params: &ProductParameters, at_risk_capital: f64) -> f64 {
    let ends: Vec<EndOfTerm> = paths.par_iter().map(|rows| end_of_term(rows, params)).collect();
    let sum: f64 = ends
        .iter()
        .map(|e| insurance_payout(e, params.total_loan, at_risk_capital))
        .sum();
    sum / ends.len() as f64
}

/// Path ids selected at the 2%, 25%, median and 75% ranks by terminal
/// price, per `spec.md` §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantilePaths {
    pub p02: u32,
    pub p25: u32,
    pub p50: u32,
    pub p75: u32,
}

fn quantile_rank(sorted: &[EndOfTerm], p: f64) -> u32 {
    let idx = ((p * sorted.len() as f64).round() as usize).min(sorted.len() - 1);
    sorted[idx].path_id
}

pub fn quantile_paths(ends: &[EndOfTerm]) -> QuantilePaths {
    let mut sorted = ends.to_vec();
    sorted.sort_by(|a, b| a.price.partial_cmp(&b.price).expect("prices are never NaN"));
    QuantilePaths {
        p02: quantile_rank(&sorted, 0.02),
        p25: quantile_rank(&sorted, 0.25),
        p50: quantile_rank(&sorted, 0.50),
        p75: quantile_rank(&sorted, 0.75),
    }
}

/// Mean of a handful of numeric columns at a fixed period, across all
/// paths. Feeds both reporting and the pooling two-pass protocol's expected
/// reinvestment curve (`reinvestment_value` at each period).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodMean {
    pub period: u32,
    pub price: f64,
    pub holdings: f64,
    pub reinvestment_value: f64,
    pub interest_deficit: f64,
    pub loan_size: f64,
    pub interest_paid_to_funder: f64,
    pub annuity_income: f64,
}

/// Per-period means across paths. Assumes every path has the same row
/// count (guaranteed by the Path Engine: `T_q` rows for every path sharing
/// a horizon), so periods are grouped by row index rather than by a
/// dataframe group-by.
pub fn period_means(paths: &[Vec<PathRow>]) -> Vec<PeriodMean> {
    if paths.is_empty() {
        return Vec::new();
    }
    let t_q = paths[0].len();
    let n = paths.len() as f64;
    (0..t_q)
        .into_par_iter()
        .map(|i| {
            let mut price = 0.0;
            let mut holdings = 0.0;
            let mut reinvestment_value = 0.0;
            let mut interest_deficit = 0.0;
            let mut loan_size = 0.0;
            let mut interest_paid_to_funder = 0.0;
            let mut annuity_income = 0.0;
            for rows in paths {
                let row = &rows[i];
                price += row.price;
                holdings += row.holdings;
                reinvestment_value += row.reinvestment_value;
                interest_deficit += row.interest_deficit;
                loan_size += row.loan_size;
                interest_paid_to_funder += row.interest_paid_to_funder;
                annuity_income += row.annuity_income_q;
            }
            PeriodMean {
                period: paths[0][i].period,
                price: price / n,
                holdings: holdings / n,
                reinvestment_value: reinvestment_value / n,
                interest_deficit: interest_deficit / n,
                loan_size: loan_size / n,
                interest_paid_to_funder: interest_paid_to_funder / n,
                annuity_income: annuity_income / n,
            }
        })
        .collect()
}

/// One row's running totals since the start of its path: cumulative annuity
/// income paid and cumulative interest accrued (not to be confused with
/// `PathRow::cum_interest_paid`, the engine-tracked sum of interest actually
/// *paid*; this is the original's `CumInterestAccrued`, a running sum of the
/// full quarterly accrual regardless of whether it was paid or deferred).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CumulativeSums {
    pub period: u32,
    pub cumulative_annuity_income: f64,
    pub cumulative_interest_accrued: f64,
}

/// Cumulative per-path sums of annuity income and accrued interest
/// (`spec.md` §4.4 "cumulative per-path sums for interest paid and annuity
/// income", `SPEC_FULL.md` §3 "Supplemented fields"). These are derived
/// purely from the already-emitted row stream, one entry per row, in the
/// same order as `rows`.
pub fn cumulative_sums(rows: &[PathRow]) -> Vec<CumulativeSums> {
    let mut cumulative_annuity_income = 0.0;
    let mut cumulative_interest_accrued = 0.0;
    rows.iter()
        .map(|row| {
            cumulative_annuity_income += row.annuity_income_q;
            cumulative_interest_accrued += row.interest_accrued;
            CumulativeSums {
                period: row.period,
                cumulative_annuity_income,
                cumulative_interest_accrued,
            }
        })
        .collect()
}

/// End-of-term and whole-of-run statistics across a batch of paths
/// (`spec.md` §4.4, supplemented by `SPEC_FULL.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub funder_roi: f64,
    pub funder_cagr: f64,
    pub funder_profit_share: f64,
    pub funder_earned_mean: f64,
    pub net_funder_position: f64,
    pub holiday_rate: f64,
    pub insurance_payout_mean: f64,
    pub probability_of_full_coverage: f64,
    /// Mean end-of-term reinvestment account value, `E[R_T]`.
    pub reinvestment_mean: f64,
    /// Mean end-of-term interest deficit, `E[D_T]`.
    pub interest_deficit_mean: f64,
    pub quantiles: QuantilePaths,
}

pub fn summarize(paths: &[Vec<PathRow>], params: &ProductParameters, at_risk_capital: f64) -> Summary {
    let ends: Vec<EndOfTerm> = paths.par_iter().map(|rows| end_of_term(rows, params)).collect();
    let n = ends.len() as f64;
    let total_loan = params.total_loan;

    let lender_shares: Vec<f64> = ends.iter().map(|e| lender_profit_share_amount(e, total_loan)).collect();

    let funder_roi = ends
        .iter()
        .zip(&lender_shares)
        .map(|(e, lp)| (e.funder_earned + lp + e.interest_deficit) / total_loan)
        .sum::<f64>()
        / n;

    let cagr_base = ends
        .iter()
        .zip(&lender_shares)
        .map(|(e, lp)| (e.funder_earned + lp + total_loan + e.interest_deficit) / total_loan)
        .sum::<f64>()
        / n;
    let funder_cagr = cagr_base.powf(1.0 / params.horizon_years) - 1.0;

    let funder_profit_share = lender_shares.iter().sum::<f64>() / n;
    let funder_earned_mean = ends.iter().map(|e| e.funder_earned).sum::<f64>() / n;
    let net_funder_position = funder_earned_mean + funder_profit_share;

    let insurance_payout_mean = ends.iter().map(|e| insurance_payout(e, total_loan, at_risk_capital)).sum::<f64>() / n;

    let covered = ends
        .iter()
        .filter(|e| e.reinvestment_value + e.repayment_amount >= total_loan + e.interest_deficit)
        .count() as f64;
    let probability_of_full_coverage = covered / n;

    let (holiday_sum, holiday_count) = paths
        .iter()
        .flat_map(|rows| rows.iter())
        .fold((0.0, 0usize), |(sum, count), row| {
            (sum + if row.in_holiday { 1.0 } else { 0.0 }, count + 1)
        });
    let holiday_rate = holiday_sum / holiday_count as f64;

    let reinvestment_mean = ends.iter().map(|e| e.reinvestment_value).sum::<f64>() / n;
    let interest_deficit_mean = ends.iter().map(|e| e.interest_deficit).sum::<f64>() / n;

    Summary {
        funder_roi,
        funder_cagr,
        funder_profit_share,
        funder_earned_mean,
        net_funder_position,
        holiday_rate,
        insurance_payout_mean,
        probability_of_full_coverage,
        reinvestment_mean,
        interest_deficit_mean,
        quantiles: quantile_paths(&ends),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::LoanVariant;

    fn params() -> ProductParameters {
        ProductParameters {
            horizon_years: 10.0,
            annuity_duration_years: 0.0,
            total_loan: 1_000_000.0,
            reinvest_fraction: 1.0,
            annual_income: 0.0,
            wholesale_margin: 0.02,
            additional_margin: 0.015,
            insurer_profit_multiplier: 1.0,
            insurance_cost: 0.0,
            holiday_enter_fraction: 0.0,
            holiday_exit_fraction: 0.0,
            superpay_start_factor: 1.0,
            max_superpay_factor: 1.0,
            subperform_threshold_quarters: 100,
            variant: LoanVariant::InterestOnly,
            at_risk_capital: 0.0,
            pooling_enabled: false,
            insured_units: 0.0,
            hedging_enabled: false,
            hedge: None,
        }
    }

    fn row(path_id: u32, period: u32, price: f64, reinvestment_value: f64, interest_deficit: f64, in_holiday: bool) -> PathRow {
        PathRow {
            path_id,
            period,
            year: period / 4,
            quarter: period % 4,
            price,
            interest_accrued: 0.0,
            loan_size: 1_000_000.0,
            holdings: reinvestment_value / price,
            reinvestment_value,
            interest_deficit,
            capital_deficit: 0.0,
            surplus: 0.0,
            in_holiday,
            funder_earned: 10_000.0,
            annuity_income_q: 0.0,
            holiday_quarters: 0,
            subperform: false,
            interest_paid: 5_000.0,
            interest_paid_to_funder: 4_000.0,
            loan_interest_rate: 0.075,
            units_sold: 0.0,
            cum_units_sold: 0.0,
            deferred_delta: 0.0,
            units_to_pool: 0.0,
            cum_units_to_pool: 0.0,
            cum_interest_paid: 0.0,
            units_to_principal: 0.0,
            total_units_sold: 0.0,
            hedge_units_delta: 0.0,
        }
    }

    #[test]
    fn quantile_paths_select_by_terminal_price_rank() {
        let ends: Vec<EndOfTerm> = (0..100)
            .map(|i| EndOfTerm {
                path_id: i,
                price: i as f64,
                reinvestment_value: 0.0,
                interest_deficit: 0.0,
                funder_earned: 0.0,
                cum_units_to_pool: 0.0,
                scheme_profit: 0.0,
                repayment_amount: 0.0,
            })
            .collect();
        let q = quantile_paths(&ends);
        assert_eq!(q.p02, 2);
        assert_eq!(q.p25, 25);
        assert_eq!(q.p50, 50);
        assert_eq!(q.p75, 75);
    }

    #[test]
    fn holiday_rate_is_the_mean_indicator_across_all_rows() {
        let path_a = vec![row(0, 0, 100.0, 900_000.0, 0.0, false), row(0, 1, 100.0, 900_000.0, 0.0, true)];
        let path_b = vec![row(1, 0, 100.0, 900_000.0, 0.0, false), row(1, 1, 100.0, 900_000.0, 0.0, false)];
        let s = summarize(&[path_a, path_b], &params(), 0.0);
        assert!((s.holiday_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn full_coverage_counts_paths_whose_account_clears_the_loan() {
        let covered = vec![row(0, 0, 100.0, 1_100_000.0, 0.0, false)];
        let uncovered = vec![row(1, 0, 100.0, 500_000.0, 0.0, false)];
        let s = summarize(&[covered, uncovered], &params(), 0.0);
        assert!((s.probability_of_full_coverage - 0.5).abs() < 1e-9);
    }

    #[test]
    fn period_means_average_across_paths_at_each_index() {
        let path_a = vec![row(0, 0, 100.0, 1_000_000.0, 0.0, false)];
        let path_b = vec![row(1, 0, 200.0, 2_000_000.0, 0.0, false)];
        let means = period_means(&[path_a, path_b]);
        assert_eq!(means.len(), 1);
        assert!((means[0].price - 150.0).abs() < 1e-9);
        assert!((means[0].reinvestment_value - 1_500_000.0).abs() < 1e-9);
    }

    #[test]
    fn cumulative_sums_accumulate_annuity_income_and_interest_accrued() {
        let mut r0 = row(0, 0, 100.0, 1_000_000.0, 0.0, false);
        r0.annuity_income_q = 5_000.0;
        r0.interest_accrued = 1_000.0;
        let mut r1 = row(0, 1, 100.0, 1_000_000.0, 0.0, false);
        r1.annuity_income_q = 5_000.0;
        r1.interest_accrued = 1_200.0;
        let mut r2 = row(0, 2, 100.0, 1_000_000.0, 0.0, false);
        r2.annuity_income_q = 0.0;
        r2.interest_accrued = 1_200.0;

        let sums = cumulative_sums(&[r0, r1, r2]);
        assert_eq!(sums.len(), 3);
        assert!((sums[0].cumulative_annuity_income - 5_000.0).abs() < 1e-9);
        assert!((sums[0].cumulative_interest_accrued - 1_000.0).abs() < 1e-9);
        assert!((sums[1].cumulative_annuity_income - 10_000.0).abs() < 1e-9);
        assert!((sums[1].cumulative_interest_accrued - 2_200.0).abs() < 1e-9);
        assert!((sums[2].cumulative_annuity_income - 10_000.0).abs() < 1e-9, "no further annuity once drawdown ends");
        assert!((sums[2].cumulative_interest_accrued - 3_400.0).abs() < 1e-9);
    }
}
