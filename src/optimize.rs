//! Parameter Optimizer: a from-scratch Nelder-Mead search over product
//! levers, wrapping the Insurance Solver under penalty constraints
//! (`spec.md` §4.6).

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;

use crate::aggregate::{self, Summary};
use crate::engine;
use crate::error::{EngineError, EngineResult};
use crate::insurance;
use crate::paths::PricePath;
use crate::product::ProductParameters;
use crate::rates::RateSeries;
use crate::scenario::CancelToken;

/// Reflection/expansion/contraction/shrink coefficients, the method's
/// standard published values.
const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Any objective value at or above this is treated the same as an
/// exception from the inner stack: a sentinel telling the search to move
/// away from this point (`spec.md` §4.6, §7).
const SENTINEL: f64 = 1000.0;

/// Box bounds for the 5-vector `x = (h_in, h_out-h_in, sigma_m, sigma_s, A)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lo: [f64; 5],
    pub hi: [f64; 5],
}

impl Bounds {
    fn clamp(&self, x: [f64; 5]) -> [f64; 5] {
        let mut out = x;
        for i in 0..5 {
            out[i] = out[i].clamp(self.lo[i], self.hi[i]);
        }
        out
    }

    fn sample(&self, rng: &mut StdRng) -> [f64; 5] {
        let mut out = [0.0; 5];
        for i in 0..5 {
            out[i] = rng.gen_range(self.lo[i]..=self.hi[i]);
        }
        out
    }
}

/// Which quantity the optimizer maximizes (or minimizes), per `spec.md`
/// §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    MaximizeFunderRoi,
    /// `ω·goal = A/10000`, independent of the caller-supplied `omega`.
    MaximizeAnnualIncome,
    MaximizeReinvestment,
    MinimizeDeficit,
    MinimizeHolidayRate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    pub bounds: Bounds,
    pub goal: Goal,
    pub omega: f64,
    pub max_fn_evals: u32,
    pub roi_lower_limit: f64,
    pub holiday_upper_limit: f64,
    pub insurance_upper_limit: f64,
    pub secant_bracket: (f64, f64),
    pub secant_tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerSolution {
    pub point: [f64; 5],
    pub objective: f64,
    pub evaluations: u32,
}

pub struct ParameterOptimizer<'a> {
    base_params: &'a ProductParameters,
    paths: &'a [PricePath],
    rates: &'a RateSeries,
    at_risk_capital: f64,
    config: OptimizerConfig,
}

/// Outcome of evaluating the objective at one point: the value the search
/// minimizes, and whether every penalty term was satisfied (`penalty ==
/// 0`) — the latter is what `OPTIMIZER_INFEASIBLE` actually tracks.
struct Evaluation {
    objective: f64,
    feasible: bool,
}

impl<'a> ParameterOptimizer<'a> {
    pub fn new(base_params: &'a ProductParameters, paths: &'a [PricePath], rates: &'a RateSeries, at_risk_capital: f64, config: OptimizerConfig) -> Self {
        Self {
            base_params,
            paths,
            rates,
            at_risk_capital,
            config,
        }
    }

    fn params_for(&self, x: &[f64; 5]) -> EngineResult<ProductParameters> {
        let annual_income = x[4];
        let mut params = self.base_params.clone();
        params.holiday_enter_fraction = x[0];
        params.holiday_exit_fraction = x[0] + x[1];
        params.max_superpay_factor = x[2];
        params.superpay_start_factor = x[3];
        params.annual_income = annual_income;
        params.reinvest_fraction = 1.0 - (params.annuity_duration_years * annual_income) / params.total_loan;
        params.validate()?;
        Ok(params)
    }

    fn run_summary(&self, params: &ProductParameters, cancel: Option<&CancelToken>) -> EngineResult<(Summary, f64)> {
        let solution = insurance::solve(
            self.paths,
            self.rates,
            params,
            self.at_risk_capital,
            self.config.secant_bracket,
            self.config.secant_tolerance,
            cancel,
        )?;
        let mut priced = params.clone();
        priced.insurance_cost = solution.premium;
        let rows: Vec<_> = self.paths.par_iter().map(|p| engine::run(p, self.rates, &priced, None)).collect::<EngineResult<_>>()?;
        let summary = aggregate::summarize(&rows, &priced, self.at_risk_capital);
        Ok((summary, solution.premium))
    }

    fn try_evaluate(&self, x: &[f64; 5], cancel: Option<&CancelToken>) -> EngineResult<Evaluation> {
        let params = self.params_for(x)?;
        let (summary, premium) = self.run_summary(&params, cancel)?;

        let insurance_pa = premium / params.total_loan / params.horizon_years;
        let mut penalty = 0.0;
        if summary.funder_roi < self.config.roi_lower_limit {
            penalty += (self.config.roi_lower_limit - summary.funder_roi) / 10.0;
        }
        if summary.holiday_rate > self.config.holiday_upper_limit {
            penalty += (summary.holiday_rate - self.config.holiday_upper_limit) * 10.0;
        }
        if insurance_pa > self.config.insurance_upper_limit {
            penalty += (insurance_pa - self.config.insurance_upper_limit) * 100.0;
        }
        let feasible = penalty == 0.0;
        penalty *= 1000.0;

        let goal_term = match self.config.goal {
            Goal::MaximizeFunderRoi => self.config.omega * summary.funder_roi,
            Goal::MaximizeAnnualIncome => x[4] / 10_000.0,
            Goal::MaximizeReinvestment => self.config.omega * summary.reinvestment_mean,
            Goal::MinimizeDeficit => -self.config.omega * summary.interest_deficit_mean,
            Goal::MinimizeHolidayRate => -self.config.omega * summary.holiday_rate,
        };

        Ok(Evaluation {
            objective: penalty - goal_term,
            feasible,
        })
    }

    /// Evaluate the objective, mapping any inner failure (invalid
    /// parameters, secant non-convergence) to the sentinel, matching the
    /// Python `except ValueError: return 1000` in the source this was
    /// distilled from.
    fn evaluate(&self, x: &[f64; 5], cancel: Option<&CancelToken>) -> Evaluation {
        match self.try_evaluate(x, cancel) {
            Ok(e) => e,
            Err(err) => {
                warn!("optimizer objective raised {err}, using sentinel");
                Evaluation {
                    objective: SENTINEL,
                    feasible: false,
                }
            }
        }
    }

    /// Rejection-sample an initial point within bounds: draw uniformly,
    /// evaluate, retry while the objective exceeds 999 (mirrors the
    /// source's `while ini_f > 999: resample`). Checked at each attempt
    /// boundary against `cancel`, per `spec.md` §5.
    pub fn find_feasible_start(&self, rng: &mut StdRng, max_attempts: u32, cancel: Option<&CancelToken>) -> EngineResult<[f64; 5]> {
        for attempt in 0..max_attempts {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                debug!("rejection sampling cancelled after {attempt} attempts");
                break;
            }
            let candidate = self.config.bounds.sample(rng);
            let eval = self.evaluate(&candidate, cancel);
            if eval.objective <= 999.0 {
                return Ok(candidate);
            }
            debug!("rejection sampling attempt {attempt}: objective={:.1}", eval.objective);
        }
        Err(EngineError::OptimizerInfeasible {
            evaluations: max_attempts,
            best_point: [0.0; 5],
            best_objective: SENTINEL,
        })
    }

    /// Run Nelder-Mead from `x0` (or a rejection-sampled start when `x0` is
    /// `None`), returning the best point found. Fails with
    /// `OptimizerInfeasible` if no evaluated point ever satisfied every
    /// penalty constraint. `cancel` is checked at each Nelder-Mead iteration
    /// boundary, mirroring the secant loop's cancellation check in
    /// `insurance::solve`.
    pub fn optimize(&self, x0: Option<[f64; 5]>, rng: &mut StdRng, cancel: Option<&CancelToken>) -> EngineResult<OptimizerSolution> {
        let x0 = match x0 {
            Some(x) => x,
            None => self.find_feasible_start(rng, 1000, cancel)?,
        };

        let n = 5usize;
        let mut evaluations = 0u32;
        let mut best_overall: ([f64; 5], f64) = (x0, f64::INFINITY);
        let mut best_feasible: Option<([f64; 5], f64)> = None;

        let mut eval_and_track = |x: [f64; 5], evaluations: &mut u32| -> f64 {
            *evaluations += 1;
            let e = self.evaluate(&x, cancel);
            if e.objective < best_overall.1 {
                best_overall = (x, e.objective);
            }
            if e.feasible && best_feasible.map(|(_, v)| e.objective < v).unwrap_or(true) {
                best_feasible = Some((x, e.objective));
            }
            e.objective
        };

        // Initial simplex: x0 plus one perturbed vertex per dimension, a
        // 5% step (or a fixed nudge when a bound sits at zero).
        let mut simplex: Vec<[f64; 5]> = vec![x0];
        for i in 0..n {
            let mut v = x0;
            let step = if v[i] != 0.0 { v[i] * 0.05 } else { 0.05 };
            v[i] += step;
            simplex.push(self.config.bounds.clamp(v));
        }
        let mut values: Vec<f64> = simplex.iter().map(|x| eval_and_track(*x, &mut evaluations)).collect();

        while evaluations < self.config.max_fn_evals {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                debug!("nelder-mead cancelled after {evaluations} evaluations");
                break;
            }
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).expect("objective is never NaN"));
            simplex = order.iter().map(|&i| simplex[i]).collect();
            values = order.iter().map(|&i| values[i]).collect();

            let spread = values[n] - values[0];
            if spread.abs() < 1e-6 {
                break;
            }

            let centroid = {
                let mut c = [0.0; 5];
                for v in simplex.iter().take(n) {
                    for (ci, vi) in c.iter_mut().zip(v.iter()) {
                        *ci += vi / n as f64;
                    }
                }
                c
            };

            let worst = simplex[n];
            let mut reflected = [0.0; 5];
            for i in 0..5 {
                reflected[i] = centroid[i] + ALPHA * (centroid[i] - worst[i]);
            }
            let reflected = self.config.bounds.clamp(reflected);
            let f_reflected = eval_and_track(reflected, &mut evaluations);

            if f_reflected < values[0] {
                let mut expanded = [0.0; 5];
                for i in 0..5 {
                    expanded[i] = centroid[i] + GAMMA * (reflected[i] - centroid[i]);
                }
                let expanded = self.config.bounds.clamp(expanded);
                let f_expanded = eval_and_track(expanded, &mut evaluations);
                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_reflected;
                }
            } else if f_reflected < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_reflected;
            } else {
                let mut contracted = [0.0; 5];
                for i in 0..5 {
                    contracted[i] = centroid[i] + RHO * (worst[i] - centroid[i]);
                }
                let contracted = self.config.bounds.clamp(contracted);
                let f_contracted = eval_and_track(contracted, &mut evaluations);
                if f_contracted < values[n] {
                    simplex[n] = contracted;
                    values[n] = f_contracted;
                } else {
                    let best = simplex[0];
                    for i in 1..=n {
                        let mut shrunk = [0.0; 5];
                        for d in 0..5 {
                            shrunk[d] = best[d] + SIGMA * (simplex[i][d] - best[d]);
                        }
                        simplex[i] = self.config.bounds.clamp(shrunk);
                        values[i] = eval_and_track(simplex[i], &mut evaluations);
                    }
                }
            }

            if evaluations >= self.config.max_fn_evals {
                break;
            }
        }

        match best_feasible {
            Some((point, objective)) => Ok(OptimizerSolution {
                point,
                objective,
                evaluations,
            }),
            None => Err(EngineError::OptimizerInfeasible {
                evaluations,
                best_point: best_overall.0,
                best_objective: best_overall.1,
            }),
        }
    }
}
