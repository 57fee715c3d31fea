#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Zone geometry measurement and the seams to external collaborators.
//!
//! Turns a user-drawn polygon into a [`ZoneGeometry`] with area,
//! perimeter, and centroid, and defines the traits through which the
//! analysis engine asks outside services for building footprints and
//! driving distances.
//!
//! [`ZoneGeometry`]: zone_resource_zone_models::ZoneGeometry

pub mod distance;
pub mod geometry;
pub mod providers;

use thiserror::Error;

/// Errors raised while reading a zone polygon.
///
/// These are the only errors that abort an analysis: without a usable
/// polygon there is nothing to fall back to.
#[derive(Debug, Error)]
pub enum ZoneError {
    /// The polygon cannot describe a zone.
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of what went wrong.
        message: String,
    },

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reported by an external building or distance provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider could not be reached or refused the request.
    #[error("{provider} unavailable: {message}")]
    Unavailable {
        /// Provider name.
        provider: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The provider answered with data that cannot be used.
    #[error("{provider} returned unusable data: {message}")]
    InvalidResponse {
        /// Provider name.
        provider: String,
        /// Description of what went wrong.
        message: String,
    },
}
