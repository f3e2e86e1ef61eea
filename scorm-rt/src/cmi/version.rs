//! SCORM protocol version

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// SCORM data model generation a package was authored against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "SCORM12")]
    Scorm12,
    #[serde(rename = "SCORM2004")]
    Scorm2004,
}

impl ProtocolVersion {
    /// Wire name sent to and echoed back by the player
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::Scorm12 => "SCORM12",
            ProtocolVersion::Scorm2004 => "SCORM2004",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = Error;

    /// Accepts the wire names plus the older underscore spelling
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCORM12" | "SCORM_12" => Ok(ProtocolVersion::Scorm12),
            "SCORM2004" | "SCORM_2004" => Ok(ProtocolVersion::Scorm2004),
            other => Err(Error::InvalidVersion(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_parse() {
        assert_eq!("SCORM12".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Scorm12);
        assert_eq!("SCORM2004".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Scorm2004);
    }

    #[test]
    fn test_legacy_names_parse() {
        assert_eq!("SCORM_12".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Scorm12);
        assert_eq!("SCORM_2004".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Scorm2004);
    }

    #[test]
    fn test_unknown_version_rejected() {
        for raw in ["", "scorm12", "SCORM13", "AICC"] {
            assert!(matches!(raw.parse::<ProtocolVersion>(), Err(Error::InvalidVersion(_))));
        }
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ProtocolVersion::Scorm2004).unwrap();
        assert_eq!(json, "\"SCORM2004\"");
    }
}
