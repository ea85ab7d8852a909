//! The closed set of Ghana region codes.

use crate::FolderNumberError;
use std::fmt;
use std::str::FromStr;

/// Ghana region codes (16 regions as of the 2019 reorganisation).
///
/// The set is closed: a folder number can only ever carry one of these codes,
/// and parsing rejects anything outside it. Codes are 2–3 uppercase letters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionCode {
    /// Ashanti
    Ar,
    /// Bono East
    Ber,
    /// Bono
    Br,
    /// Central
    Cr,
    /// Eastern
    Er,
    /// Greater Accra
    Gar,
    /// North East
    Ner,
    /// Northern
    Nr,
    /// North West
    Nwr,
    /// Oti
    Or,
    /// Savannah
    Sr,
    /// Upper East
    Uer,
    /// Upper West
    Uwr,
    /// Volta
    Vr,
    /// Western
    Wr,
    /// Western North
    Wnr,
}

impl RegionCode {
    /// All 16 region codes, in code order.
    pub const ALL: [RegionCode; 16] = [
        RegionCode::Ar,
        RegionCode::Ber,
        RegionCode::Br,
        RegionCode::Cr,
        RegionCode::Er,
        RegionCode::Gar,
        RegionCode::Ner,
        RegionCode::Nr,
        RegionCode::Nwr,
        RegionCode::Or,
        RegionCode::Sr,
        RegionCode::Uer,
        RegionCode::Uwr,
        RegionCode::Vr,
        RegionCode::Wr,
        RegionCode::Wnr,
    ];

    /// The canonical uppercase code for this region.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionCode::Ar => "AR",
            RegionCode::Ber => "BER",
            RegionCode::Br => "BR",
            RegionCode::Cr => "CR",
            RegionCode::Er => "ER",
            RegionCode::Gar => "GAR",
            RegionCode::Ner => "NER",
            RegionCode::Nr => "NR",
            RegionCode::Nwr => "NWR",
            RegionCode::Or => "OR",
            RegionCode::Sr => "SR",
            RegionCode::Uer => "UER",
            RegionCode::Uwr => "UWR",
            RegionCode::Vr => "VR",
            RegionCode::Wr => "WR",
            RegionCode::Wnr => "WNR",
        }
    }

    /// The full region name, for display surfaces.
    pub fn name(&self) -> &'static str {
        match self {
            RegionCode::Ar => "Ashanti",
            RegionCode::Ber => "Bono East",
            RegionCode::Br => "Bono",
            RegionCode::Cr => "Central",
            RegionCode::Er => "Eastern",
            RegionCode::Gar => "Greater Accra",
            RegionCode::Ner => "North East",
            RegionCode::Nr => "Northern",
            RegionCode::Nwr => "North West",
            RegionCode::Or => "Oti",
            RegionCode::Sr => "Savannah",
            RegionCode::Uer => "Upper East",
            RegionCode::Uwr => "Upper West",
            RegionCode::Vr => "Volta",
            RegionCode::Wr => "Western",
            RegionCode::Wnr => "Western North",
        }
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionCode {
    type Err = FolderNumberError;

    /// Parses an exact uppercase region code.
    ///
    /// Lowercase or mixed-case input is rejected; callers normalise case at
    /// the edge if they want to accept it.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        RegionCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == input)
            .ok_or_else(|| FolderNumberError::InvalidRegion(input.to_owned()))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RegionCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RegionCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RegionCode::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_codes_round_trip_through_from_str() {
        for code in RegionCode::ALL {
            let parsed = RegionCode::from_str(code.as_str()).expect("parse known code");
            assert_eq!(parsed, code);
        }
    }

    #[test]
    fn rejects_unknown_codes() {
        for input in ["ZZZ", "XX", "GA", "ARR", ""] {
            assert!(RegionCode::from_str(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn rejects_lowercase_codes() {
        assert!(RegionCode::from_str("gar").is_err());
        assert!(RegionCode::from_str("Gar").is_err());
    }

    #[test]
    fn has_sixteen_regions() {
        assert_eq!(RegionCode::ALL.len(), 16);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_code_string() {
        let json = serde_json::to_string(&RegionCode::Gar).expect("serialize");
        assert_eq!(json, "\"GAR\"");

        let parsed: RegionCode = serde_json::from_str("\"AR\"").expect("deserialize");
        assert_eq!(parsed, RegionCode::Ar);

        assert!(serde_json::from_str::<RegionCode>("\"ZZZ\"").is_err());
    }
}
