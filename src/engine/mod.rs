//! Path Engine: the per-quarter simulation of a single price path against
//! one set of product parameters (`spec.md` §4.3).

pub mod hedge;
pub mod holiday;
pub mod path_engine;
pub mod row;
pub mod state;

pub use path_engine::{run, Constants, PoolingContext};
pub use row::PathRow;
pub use state::PathState;
