//! Run a Monte Carlo batch for a single product configuration: solve for
//! the fair insurance premium, then project every path and write the
//! aggregate summary plus a per-period CSV.

use std::fs::File;
use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use equity_release_model::aggregate::{self, Summary};
use equity_release_model::insurance;
use equity_release_model::paths::generate_monte_carlo_paths;
use equity_release_model::product::{LoanVariant, ProductParameters};
use equity_release_model::rates::RateSeries;
use equity_release_model::scenario::ScenarioRunner;

const TOTAL_PATHS: u32 = 2_000;
const SEED: u64 = 42;

fn base_params() -> ProductParameters {
    ProductParameters {
        horizon_years: 20.0,
        annuity_duration_years: 15.0,
        total_loan: 1_200_000.0,
        reinvest_fraction: 0.9,
        annual_income: 24_000.0,
        wholesale_margin: 0.02,
        additional_margin: 0.0125,
        insurer_profit_multiplier: 1.5,
        insurance_cost: 0.0,
        holiday_enter_fraction: 0.85,
        holiday_exit_fraction: 1.1,
        superpay_start_factor: 1.2,
        max_superpay_factor: 0.5,
        subperform_threshold_quarters: 12,
        variant: LoanVariant::InterestOnly,
        at_risk_capital: 0.0,
        pooling_enabled: false,
        insured_units: 0.0,
        hedging_enabled: false,
        hedge: None,
    }
}

fn write_period_means_csv(path: &str, summary_paths: &[Vec<equity_release_model::PathRow>]) -> Result<()> {
    let means = aggregate::period_means(summary_paths);
    let mut file = File::create(path).with_context(|| format!("failed to create {path}"))?;
    writeln!(file, "Period,Price,Holdings,ReinvestmentValue,InterestDeficit,LoanSize,InterestPaidToFunder,AnnuityIncome")?;
    for m in &means {
        writeln!(
            file,
            "{},{:.4},{:.6},{:.2},{:.2},{:.2},{:.2},{:.2}",
            m.period, m.price, m.holdings, m.reinvestment_value, m.interest_deficit, m.loan_size, m.interest_paid_to_funder, m.annuity_income,
        )?;
    }
    Ok(())
}

fn print_summary(summary: &Summary, premium: f64) {
    println!("Insurance premium:        ${premium:.2}");
    println!("Funder simple ROI:        {:.4}", summary.funder_roi);
    println!("Funder CAGR:              {:.4}", summary.funder_cagr);
    println!("Funder profit share:      ${:.2}", summary.funder_profit_share);
    println!("Net funder position:      ${:.2}", summary.net_funder_position);
    println!("Holiday rate:             {:.4}", summary.holiday_rate);
    println!("Mean insurance payout:    ${:.2}", summary.insurance_payout_mean);
    println!("P(full coverage):         {:.4}", summary.probability_of_full_coverage);
    println!(
        "Quantile paths (2/25/50/75): {} / {} / {} / {}",
        summary.quantiles.p02, summary.quantiles.p25, summary.quantiles.p50, summary.quantiles.p75
    );
}

fn main() -> Result<()> {
    env_logger::init();

    let start = Instant::now();
    let params = base_params();
    let rates = RateSeries::Constant(0.0435);

    println!("Generating {TOTAL_PATHS} Monte Carlo paths (seed {SEED})...");
    let paths = generate_monte_carlo_paths(params.horizon_years, 0.0975, 0.15, TOTAL_PATHS, 100.0, SEED);

    println!("Solving for the fair insurance premium...");
    let solution = insurance::solve(&paths, &rates, &params, params.at_risk_capital, (10_000.0, 50_000.0), 500.0, None)
        .context("insurance solver did not converge")?;
    println!(
        "Converged to ${:.2} in {} iterations (residual ${:.2})",
        solution.premium, solution.iterations, solution.residual
    );

    let mut priced_params = params.clone();
    priced_params.insurance_cost = solution.premium;

    let runner = ScenarioRunner::new(&priced_params, &rates);
    let rows = runner.run_paths(&paths, None, None)?;
    let summary = aggregate::summarize(&rows, &priced_params, priced_params.at_risk_capital);

    print_summary(&summary, solution.premium);

    let csv_path = "scenario_period_means.csv";
    write_period_means_csv(csv_path, &rows)?;
    println!("Per-period means written to {csv_path}");

    let json_path = "scenario_summary.json";
    let mut json_file = File::create(json_path).with_context(|| format!("failed to create {json_path}"))?;
    serde_json::to_writer_pretty(&mut json_file, &summary)?;
    println!("Summary JSON written to {json_path}");

    println!("Done in {:?}", start.elapsed());
    Ok(())
}
