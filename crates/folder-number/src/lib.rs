//! Folder number value objects.
//!
//! A *folder number* is the human-readable unique identifier issued to a patient
//! record, scoped by region, facility, and registration year:
//!
//! `REGION-FACILITY-YEAR-SEQUENCE`
//!
//! Example: `GAR-KBTH-2025-000123`
//!
//! This crate provides:
//! - A closed enum of the 16 Ghana region codes ([`RegionCode`]).
//! - An immutable, always-valid [`FolderNumber`] value object whose `Display`
//!   output is the canonical text form (sequence zero-padded to 6 digits).
//! - Structural parsing ([`FolderNumber::parse`]) that returns `None` for any
//!   malformed or unknown input rather than an error, so callers can treat
//!   externally supplied identifiers as untrusted.
//! - Prefix derivation ([`prefix_for`]) for the `region-facility-year` counter
//!   key used by sequence allocation.
//!
//! ## Canonical form
//! - Region: one of the 16 fixed codes, 2–3 uppercase letters.
//! - Facility: uppercase alphanumeric, 2–10 characters.
//! - Year: 4 digits, 2020–2100.
//! - Sequence: 6 digits, 000001–999999.
//!
//! Formatting and parsing are inverse operations: for every valid folder
//! number `x`, `FolderNumber::parse(&x.to_string()) == Some(x)`.
//!
//! A folder number is never reused, even if its owning record is later voided.

mod number;
mod region;

pub use number::FolderNumber;
pub use region::RegionCode;

use chrono::Datelike;

/// Earliest acceptable registration year.
pub const MIN_YEAR: i32 = 2020;

/// Latest acceptable registration year.
pub const MAX_YEAR: i32 = 2100;

/// Smallest issuable sequence number.
pub const MIN_SEQUENCE: u32 = 1;

/// Largest issuable sequence number (6 digits).
pub const MAX_SEQUENCE: u32 = 999_999;

/// Width of the zero-padded sequence component.
pub const SEQUENCE_WIDTH: usize = 6;

/// Error type for folder number construction.
///
/// Each variant names the offending field so callers can surface a
/// field-level validation message. Parsing never produces these errors;
/// [`FolderNumber::parse`] folds them into `None`.
#[derive(Debug, thiserror::Error)]
pub enum FolderNumberError {
    /// The region code is not one of the 16 fixed Ghana region codes.
    #[error("Invalid Ghana region code: {0}")]
    InvalidRegion(String),

    /// The facility code is not 2–10 uppercase alphanumeric characters.
    #[error("Invalid facility code {0:?}: must be 2-10 uppercase alphanumeric characters")]
    InvalidFacility(String),

    /// The year is outside the supported range.
    #[error("Year {0} out of range: must be between {MIN_YEAR} and {MAX_YEAR}")]
    YearOutOfRange(i32),

    /// The sequence is outside the issuable range.
    #[error("Sequence {0} out of range: must be between {MIN_SEQUENCE} and {MAX_SEQUENCE}")]
    SequenceOutOfRange(u32),
}

/// Result type for folder number operations.
pub type FolderNumberResult<T> = Result<T, FolderNumberError>;

/// Derive the `REGION-FACILITY-YEAR` counter prefix.
///
/// The prefix keys the per-year sequence counter. When `year` is `None` the
/// current UTC year is used, which is what keeps a stale counter from a prior
/// year out of a new year's allocations.
///
/// The facility code is not validated here; prefix derivation is also used
/// for diagnostics where the caller has already validated inputs.
pub fn prefix_for(region: RegionCode, facility: &str, year: Option<i32>) -> String {
    let effective_year = year.unwrap_or_else(current_year);
    format!("{}-{}-{}", region.as_str(), facility, effective_year)
}

/// The current UTC year, used as the default for prefix derivation and
/// allocation.
pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}
