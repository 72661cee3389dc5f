//! Quarterly simulation, insurance pricing and parameter optimization for
//! equity-release-with-annuity loans.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod insurance;
pub mod optimize;
pub mod paths;
pub mod product;
pub mod rates;
pub mod scenario;
pub mod time_grid;

pub use aggregate::Summary;
pub use engine::PathRow;
pub use error::{EngineError, EngineResult};
pub use insurance::InsuranceSolution;
pub use optimize::{Bounds, Goal, OptimizerConfig, OptimizerSolution, ParameterOptimizer};
pub use paths::PricePath;
pub use product::ProductParameters;
pub use rates::RateSeries;
pub use scenario::{CancelToken, ScenarioRunner};
