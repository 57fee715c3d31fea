//! Compile-time registry of regional calibration tables.
//!
//! Each entry is a `(id, toml_content)` pair embedded via `include_str!`.
//! Adding a region requires creating a TOML file in `regions/` and adding
//! a corresponding entry here.

use crate::{CalibrationError, CalibrationTable};

/// Region used when a request does not name one.
pub const DEFAULT_REGION: &str = "lusaka";

/// Number of registered regions. Enforced by a test.
#[cfg(test)]
const EXPECTED_REGION_COUNT: usize = 1;

/// Embedded TOML region tables.
const REGION_TOMLS: &[(&str, &str)] = &[("lusaka", include_str!("../regions/lusaka.toml"))];

/// Returns all registered calibration tables.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse or validate. Since
/// these are compile-time constants, failures indicate a development
/// error and are caught by the tests below.
#[must_use]
pub fn all_regions() -> Vec<CalibrationTable> {
    REGION_TOMLS
        .iter()
        .map(|(id, toml_str)| {
            CalibrationTable::from_toml_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to load calibration region '{id}': {e}"))
        })
        .collect()
}

/// Loads the calibration table for `id`.
///
/// # Errors
///
/// Returns [`CalibrationError::UnknownRegion`] if no such region is
/// registered, or a parse/validation error for a malformed table.
pub fn region(id: &str) -> Result<CalibrationTable, CalibrationError> {
    let (_, toml_str) = REGION_TOMLS
        .iter()
        .find(|(region_id, _)| region_id.eq_ignore_ascii_case(id))
        .ok_or_else(|| CalibrationError::UnknownRegion { id: id.to_string() })?;

    log::debug!("Loading calibration region '{id}'");
    CalibrationTable::from_toml_str(toml_str)
}

/// Loads the [`DEFAULT_REGION`] table.
///
/// # Errors
///
/// Returns [`CalibrationError`] if the embedded table is malformed.
pub fn default_region() -> Result<CalibrationTable, CalibrationError> {
    region(DEFAULT_REGION)
}
