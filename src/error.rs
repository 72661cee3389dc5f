//! Error kinds surfaced by the simulation core.

/// Failures the path engine, insurance solver and parameter optimizer can
/// report. Fatal kinds (`InsufficientSeries`, `InvalidParameters`) abort the
/// run they occur in; `SecantNoConverge` and `OptimizerInfeasible` carry
/// enough of the best-so-far state that a caller (or the optimizer's own
/// objective function) can decide how to proceed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("price or rate series too short: need at least {required} periods, got {actual}")]
    InsufficientSeries { required: usize, actual: usize },

    #[error("invalid product parameters: {0}")]
    InvalidParameters(String),

    #[error(
        "secant solver did not converge after {iterations} iterations \
         (residual {residual:.2}, tolerance {tolerance:.2})"
    )]
    SecantNoConverge {
        iterations: u32,
        residual: f64,
        tolerance: f64,
        last_estimate: f64,
    },

    #[error("optimizer exited without a feasible point after {evaluations} evaluations")]
    OptimizerInfeasible {
        evaluations: u32,
        best_point: [f64; 5],
        best_objective: f64,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
