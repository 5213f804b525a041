//! ABO/Rh blood groups

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// One of the eight ABO/Rh blood groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodGroup {
    pub const ALL: [BloodGroup; 8] = [
        BloodGroup::APositive,
        BloodGroup::ANegative,
        BloodGroup::BPositive,
        BloodGroup::BNegative,
        BloodGroup::AbPositive,
        BloodGroup::AbNegative,
        BloodGroup::OPositive,
        BloodGroup::ONegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodGroup::APositive => "A+",
            BloodGroup::ANegative => "A-",
            BloodGroup::BPositive => "B+",
            BloodGroup::BNegative => "B-",
            BloodGroup::AbPositive => "AB+",
            BloodGroup::AbNegative => "AB-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = Error;

    /// Parse a blood group label, ignoring case and surrounding whitespace
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        BloodGroup::ALL
            .into_iter()
            .find(|g| g.as_str() == normalized)
            .ok_or_else(|| Error::InvalidBloodGroup(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_labels() {
        for group in BloodGroup::ALL {
            assert_eq!(group.as_str().parse::<BloodGroup>().unwrap(), group);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(" ab- ".parse::<BloodGroup>().unwrap(), BloodGroup::AbNegative);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(
            "C+".parse::<BloodGroup>(),
            Err(Error::InvalidBloodGroup("C+".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_labels() {
        let json = serde_json::to_string(&BloodGroup::OPositive).unwrap();
        assert_eq!(json, "\"O+\"");
        let parsed: BloodGroup = serde_json::from_str("\"B-\"").unwrap();
        assert_eq!(parsed, BloodGroup::BNegative);
    }
}
