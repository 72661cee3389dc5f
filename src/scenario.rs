//! `ScenarioRunner`: batch façade tying the Scenario Generator, Path Engine
//! and Aggregator together over a set of price paths (`spec.md` §2, §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use crate::aggregate::{self, Summary};
use crate::engine::{self, row::PathRow, PoolingContext};
use crate::error::EngineResult;
use crate::paths::PricePath;
use crate::product::ProductParameters;
use crate::rates::RateSeries;

/// Cooperative cancellation flag shared across a batch run, the Insurance
/// Solver's secant loop and the Optimizer's Nelder-Mead loop. Checked at
/// path/iteration boundaries only — no mid-path cancellation is required
/// (`spec.md` §5).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Runs the Path Engine over a batch of price paths against one fixed set
/// of product parameters, fanning out across `rayon`'s work-stealing pool
/// exactly as `spec.md` §5 permits ("each path's PE execution ... may
/// therefore execute paths in parallel").
pub struct ScenarioRunner<'a> {
    pub params: &'a ProductParameters,
    pub rates: &'a RateSeries,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(params: &'a ProductParameters, rates: &'a RateSeries) -> Self {
        Self { params, rates }
    }

    /// Run every path, returning one row sequence per path in input order.
    /// Returns an empty vec if `cancel` is already set when the batch
    /// starts (coarse, path-boundary cancellation per `spec.md` §5).
    pub fn run_paths(
        &self,
        paths: &[PricePath],
        pooling: Option<&PoolingContext>,
        cancel: Option<&CancelToken>,
    ) -> EngineResult<Vec<Vec<PathRow>>> {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            debug!("scenario run cancelled before dispatch");
            return Ok(Vec::new());
        }
        paths.par_iter().map(|path| engine::run(path, self.rates, self.params, pooling)).collect()
    }

    /// Run every path and fold the result into a `Summary`.
    pub fn run_and_summarize(
        &self,
        paths: &[PricePath],
        pooling: Option<&PoolingContext>,
        at_risk_capital: f64,
        cancel: Option<&CancelToken>,
    ) -> EngineResult<Summary> {
        let rows = self.run_paths(paths, pooling, cancel)?;
        Ok(aggregate::summarize(&rows, self.params, at_risk_capital))
    }
}
