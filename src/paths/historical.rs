//! Single historical equity-price path sampled from pre-parsed monthly data
//! (`spec.md` §4.1). CSV/series ingestion itself is out of scope for this
//! crate — callers supply an already-parsed `&[f64]` slice.

use crate::error::{EngineError, EngineResult};

use super::PricePath;

/// Time step for historical monthly paths: 1/12 year (`spec.md` §6).
pub const DT_HISTORICAL: f64 = 1.0 / 12.0;

/// Build the single historical path `(0, prices[offset .. offset + 12*T])`
/// used in place of a Monte Carlo batch. `offset` lets the caller pick which
/// historical start year to replay (e.g. an index into a monthly series
/// beginning at `year0`).
pub fn historical_path(prices: &[f64], offset: usize, horizon_years: f64) -> EngineResult<PricePath> {
    let required = (horizon_years * 12.0).round() as usize;
    let available = prices.len().saturating_sub(offset);
    if available < required {
        return Err(EngineError::InsufficientSeries {
            required,
            actual: available,
        });
    }
    let window = prices[offset..offset + required].to_vec();
    if window.iter().any(|&s| s <= 0.0) {
        return Err(EngineError::InvalidParameters(
            "historical price window contains a non-positive price".to_string(),
        ));
    }
    Ok(PricePath {
        id: 0,
        dt: DT_HISTORICAL,
        prices: window,
    })
}
