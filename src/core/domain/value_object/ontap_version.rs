use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An ONTAP release as `(generation, major, minor)`, e.g. `9.10.1`.
///
/// Ordering is lexicographic over the three components, which matches how
/// ONTAP releases compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OntapVersion {
    pub generation: u32,
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
}

impl OntapVersion {
    pub const fn new(generation: u32, major: u32, minor: u32) -> Self {
        Self {
            generation,
            major,
            minor,
        }
    }

    /// First release with a usable REST API.
    pub const REST_MINIMUM: OntapVersion = OntapVersion::new(9, 6, 0);
}

impl fmt::Display for OntapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.generation, self.major, self.minor)
    }
}

impl FromStr for OntapVersion {
    type Err = ValidationError;

    /// Parses `9.10.1` or `9.10` (minor defaults to 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(ValidationError::Format(format!(
                "Invalid ONTAP version '{s}': expected generation.major[.minor]"
            )));
        }
        let parse = |part: &str| {
            part.parse::<u32>().map_err(|_| {
                ValidationError::Format(format!(
                    "Invalid ONTAP version '{s}': '{part}' is not a number"
                ))
            })
        };
        Ok(Self {
            generation: parse(parts[0])?,
            major: parse(parts[1])?,
            minor: parts.get(2).map(|p| parse(p)).transpose()?.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let version: OntapVersion = "9.10.1".parse().unwrap();
        assert_eq!(version, OntapVersion::new(9, 10, 1));
        assert_eq!(version.to_string(), "9.10.1");

        let short: OntapVersion = "9.8".parse().unwrap();
        assert_eq!(short, OntapVersion::new(9, 8, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("9".parse::<OntapVersion>().is_err());
        assert!("9.x.1".parse::<OntapVersion>().is_err());
        assert!("9.1.2.3".parse::<OntapVersion>().is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        let v9_6: OntapVersion = "9.6".parse().unwrap();
        let v9_10_1: OntapVersion = "9.10.1".parse().unwrap();
        assert!(v9_6 < v9_10_1);
        assert!(OntapVersion::new(9, 10, 0) < v9_10_1);
        assert!(v9_6 >= OntapVersion::REST_MINIMUM);
    }

    #[test]
    fn test_deserialize_cluster_version_object() {
        let version: OntapVersion = serde_json::from_value(serde_json::json!({
            "generation": 9, "major": 11, "minor": 1, "full": "NetApp Release 9.11.1"
        }))
        .unwrap();
        assert_eq!(version, OntapVersion::new(9, 11, 1));
    }
}
