#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Settlement classification and population estimation.
//!
//! Three independent methods estimate residents from a building
//! inventory and are combined into a weighted ensemble whose spread gives
//! the uncertainty. Separately, a dasymetric mapper redistributes an
//! externally supplied baseline using the same inventory. The two are
//! alternative refinements; combining them is the orchestrator's call.

pub mod dasymetric;
pub mod ensemble;
pub mod methods;
pub mod settlement;

use thiserror::Error;
use zone_resource_population_models::EstimationMethod;

pub use dasymetric::DasymetricMapper;
pub use ensemble::PopulationEstimator;
pub use settlement::classify;

/// Errors that can occur during population estimation.
#[derive(Debug, Error)]
pub enum PopulationError {
    /// A method produced a zero, negative, or non-finite total. Callers
    /// must substitute the area fallback rather than pass this on.
    #[error("Invalid {method} estimate: {total}")]
    InvalidEstimate {
        /// Method that produced the total.
        method: EstimationMethod,
        /// The rejected total.
        total: f64,
    },

    /// The inventory is empty, so no building method can run.
    #[error("No buildings available for {method} estimate")]
    NoBuildings {
        /// Method that was attempted.
        method: EstimationMethod,
    },

    /// The externally supplied baseline cannot be redistributed.
    #[error("Invalid baseline population: {value}")]
    InvalidBaseline {
        /// The rejected baseline.
        value: f64,
    },

    /// The zone area cannot support an estimate.
    #[error("Invalid zone area: {area_m2} m²")]
    InvalidArea {
        /// The rejected area.
        area_m2: f64,
    },
}

/// Rejects totals the rest of the pipeline cannot use.
pub(crate) fn ensure_positive(method: EstimationMethod, total: f64) -> Result<f64, PopulationError> {
    if total.is_finite() && total > 0.0 {
        Ok(total)
    } else {
        Err(PopulationError::InvalidEstimate { method, total })
    }
}
