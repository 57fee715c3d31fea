#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Zone resource analysis.
//!
//! Takes a zone polygon and, optionally, its building inventory, and
//! produces population, waste and collection-logistics estimates with a
//! plausibility report. Results are cached by request content.
//!
//! ```text
//! buildings → settlement → population → dasymetric → waste → collection
//!                                                                 ↓
//!                                                            validation
//! ```

pub mod cache;
pub mod key;
pub mod orchestrator;
pub mod stages;

#[cfg(test)]
mod fixtures;

use thiserror::Error;
use zone_resource_calibration::CalibrationError;
use zone_resource_zone::ZoneError;

pub use cache::{AnalysisCache, CacheStatus, Clock, ManualClock, SystemClock};
pub use orchestrator::AnalysisOrchestrator;

/// Errors that abort an analysis.
///
/// Everything else a stage runs into is recorded as a warning on the
/// result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The zone polygon is unusable.
    #[error(transparent)]
    Zone(#[from] ZoneError),

    /// Not even the default calibration region could be loaded.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// The request could not be hashed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
