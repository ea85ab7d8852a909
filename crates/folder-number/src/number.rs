//! The `FolderNumber` value object.

use crate::{
    FolderNumberError, FolderNumberResult, RegionCode, MAX_SEQUENCE, MAX_YEAR, MIN_SEQUENCE,
    MIN_YEAR, SEQUENCE_WIDTH,
};
use std::fmt;
use std::str::FromStr;

/// An issued patient folder number.
///
/// Construction always validates, so a `FolderNumber` in hand is guaranteed to
/// render to (and re-parse from) the canonical `REGION-FACILITY-YEAR-SEQUENCE`
/// form. Fields are private to keep the value immutable once issued.
///
/// # Construction
/// - [`FolderNumber::new`] validates each field and fails loudly with a
///   field-level [`FolderNumberError`]; use it where identity integrity
///   matters (allocation, formatting).
/// - [`FolderNumber::parse`] accepts untrusted text and returns `None` on any
///   mismatch; use it at system edges.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FolderNumber {
    region: RegionCode,
    facility: String,
    year: i32,
    sequence: u32,
}

impl FolderNumber {
    /// Build a folder number from validated components.
    ///
    /// # Arguments
    ///
    /// * `region` - One of the 16 Ghana region codes.
    /// * `facility` - Facility code, 2–10 uppercase alphanumeric characters.
    /// * `year` - Registration year, 2020–2100.
    /// * `sequence` - Per-prefix sequence, 1–999999.
    ///
    /// # Errors
    ///
    /// Returns a [`FolderNumberError`] naming the first offending field.
    pub fn new(
        region: RegionCode,
        facility: impl Into<String>,
        year: i32,
        sequence: u32,
    ) -> FolderNumberResult<Self> {
        let facility = facility.into();
        validate_facility(&facility)?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(FolderNumberError::YearOutOfRange(year));
        }
        if !(MIN_SEQUENCE..=MAX_SEQUENCE).contains(&sequence) {
            return Err(FolderNumberError::SequenceOutOfRange(sequence));
        }
        Ok(Self {
            region,
            facility,
            year,
            sequence,
        })
    }

    /// Parse canonical folder number text.
    ///
    /// The input must match `REGION-FACILITY-YEAR-SEQUENCE` structurally
    /// (2–3 letter region, uppercase alphanumeric facility, 4-digit year,
    /// exactly 6-digit sequence) and every field must pass the same
    /// validation as [`FolderNumber::new`].
    ///
    /// Returns `None` for any mismatch, including an unknown region code.
    /// Untrusted input is expected here, so a mismatch is not an error.
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.split('-').collect();
        let [region_str, facility, year_str, sequence_str] = parts.as_slice() else {
            return None;
        };

        if !(2..=3).contains(&region_str.len())
            || !region_str.chars().all(|c| c.is_ascii_uppercase())
        {
            return None;
        }
        let region = RegionCode::from_str(region_str).ok()?;

        if year_str.len() != 4 || !year_str.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let year: i32 = year_str.parse().ok()?;

        if sequence_str.len() != SEQUENCE_WIDTH
            || !sequence_str.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let sequence: u32 = sequence_str.parse().ok()?;

        Self::new(region, *facility, year, sequence).ok()
    }

    /// Whether `text` is a valid canonical folder number.
    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_some()
    }

    /// The region component.
    pub fn region(&self) -> RegionCode {
        self.region
    }

    /// The facility code component.
    pub fn facility(&self) -> &str {
        &self.facility
    }

    /// The registration year component.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The sequence component (unpadded).
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The `REGION-FACILITY-YEAR` prefix of this folder number.
    pub fn prefix(&self) -> String {
        crate::prefix_for(self.region, &self.facility, Some(self.year))
    }
}

impl fmt::Display for FolderNumber {
    /// Renders the canonical text form with the sequence zero-padded to 6
    /// digits, e.g. `GAR-KBTH-2025-000123`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{:0width$}",
            self.region.as_str(),
            self.facility,
            self.year,
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FolderNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for FolderNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FolderNumber::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid folder number: {s}")))
    }
}

fn validate_facility(facility: &str) -> FolderNumberResult<()> {
    let well_formed = (2..=10).contains(&facility.len())
        && facility
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if well_formed {
        Ok(())
    } else {
        Err(FolderNumberError::InvalidFacility(facility.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_canonical_example() {
        let folder =
            FolderNumber::new(RegionCode::Gar, "KBTH", 2025, 123).expect("valid folder number");
        assert_eq!(folder.to_string(), "GAR-KBTH-2025-000123");
    }

    #[test]
    fn parses_canonical_example() {
        let folder = FolderNumber::parse("AR-KATH-2025-000001").expect("valid text");
        assert_eq!(folder.region(), RegionCode::Ar);
        assert_eq!(folder.facility(), "KATH");
        assert_eq!(folder.year(), 2025);
        assert_eq!(folder.sequence(), 1);
    }

    #[test]
    fn round_trips_all_regions() {
        for region in RegionCode::ALL {
            let folder =
                FolderNumber::new(region, "KBTH", 2025, 123).expect("valid folder number");
            let reparsed = FolderNumber::parse(&folder.to_string()).expect("round trip");
            assert_eq!(reparsed, folder);
        }
    }

    #[test]
    fn round_trips_boundary_values() {
        for (year, sequence) in [(2020, 1), (2100, 999_999), (2025, 42)] {
            let folder =
                FolderNumber::new(RegionCode::Vr, "A1", year, sequence).expect("valid bounds");
            assert_eq!(FolderNumber::parse(&folder.to_string()), Some(folder));
        }
    }

    #[test]
    fn new_rejects_out_of_range_sequence() {
        let too_big = FolderNumber::new(RegionCode::Gar, "KBTH", 2025, 1_000_000);
        assert!(matches!(
            too_big,
            Err(FolderNumberError::SequenceOutOfRange(1_000_000))
        ));

        let zero = FolderNumber::new(RegionCode::Gar, "KBTH", 2025, 0);
        assert!(matches!(
            zero,
            Err(FolderNumberError::SequenceOutOfRange(0))
        ));
    }

    #[test]
    fn new_rejects_out_of_range_year() {
        assert!(matches!(
            FolderNumber::new(RegionCode::Gar, "KBTH", 2019, 1),
            Err(FolderNumberError::YearOutOfRange(2019))
        ));
        assert!(matches!(
            FolderNumber::new(RegionCode::Gar, "KBTH", 2101, 1),
            Err(FolderNumberError::YearOutOfRange(2101))
        ));
    }

    #[test]
    fn new_rejects_bad_facility_codes() {
        for facility in ["K", "TOOLONGFACILIT", "kbth", "KB-TH", "KB TH", ""] {
            let result = FolderNumber::new(RegionCode::Gar, facility, 2025, 1);
            assert!(
                matches!(result, Err(FolderNumberError::InvalidFacility(_))),
                "accepted facility {facility:?}"
            );
        }
    }

    #[test]
    fn parse_returns_none_for_malformed_text() {
        for text in [
            "",
            "GAR-KBTH-2025",
            "GAR-KBTH-2025-123",
            "GAR-KBTH-2025-0000123",
            "GAR-KBTH-25-000123",
            "gar-KBTH-2025-000123",
            "GAR-kbth-2025-000123",
            "GARX-KBTH-2025-000123",
            "G-KBTH-2025-000123",
            "GAR-KBTH-2025-00012X",
            "GAR-KBTH-2025-000123-EXTRA",
            "GAR_KBTH_2025_000123",
        ] {
            assert_eq!(FolderNumber::parse(text), None, "accepted {text:?}");
        }
    }

    #[test]
    fn parse_returns_none_for_unknown_region() {
        assert_eq!(FolderNumber::parse("ZZZ-KBTH-2025-000123"), None);
    }

    #[test]
    fn parse_returns_none_for_out_of_range_fields() {
        // Structurally fine, semantically out of bounds.
        assert_eq!(FolderNumber::parse("GAR-KBTH-2019-000123"), None);
        assert_eq!(FolderNumber::parse("GAR-KBTH-2025-000000"), None);
        assert_eq!(FolderNumber::parse("GAR-K-2025-000123"), None);
    }

    #[test]
    fn is_valid_matches_parse() {
        assert!(FolderNumber::is_valid("GAR-KBTH-2025-000123"));
        assert!(!FolderNumber::is_valid("ZZZ-KBTH-2025-000123"));
    }

    #[test]
    fn prefix_matches_components() {
        let folder =
            FolderNumber::new(RegionCode::Uer, "NAV37", 2024, 7).expect("valid folder number");
        assert_eq!(folder.prefix(), "UER-NAV37-2024");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_canonical_text() {
        let folder =
            FolderNumber::new(RegionCode::Gar, "KBTH", 2025, 123).expect("valid folder number");
        let json = serde_json::to_string(&folder).expect("serialize");
        assert_eq!(json, "\"GAR-KBTH-2025-000123\"");

        let parsed: FolderNumber = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, folder);

        assert!(serde_json::from_str::<FolderNumber>("\"ZZZ-KBTH-2025-000123\"").is_err());
    }
}
