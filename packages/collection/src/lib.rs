#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Waste collection logistics optimization.
//!
//! Converts a population and waste rate into weekly tonnage, then
//! searches collection frequencies and truck classes for the cheapest
//! schedule that carries all of it. The search space is at most seven
//! frequencies by a handful of truck classes, so it is exhaustive.

pub mod cost;
pub mod optimizer;

use thiserror::Error;

pub use optimizer::{CollectionInputs, CollectionOptimizer};

/// Errors that can occur during collection optimization.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// An input cannot be used by the cost model.
    #[error("Invalid {field}: {value}")]
    InvalidInput {
        /// Name of the offending input.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}
