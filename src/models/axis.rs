// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! EFBD axis codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the fixed behavioural-scale dimensions a profile accumulates
/// a score against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisCode {
    #[serde(rename = "EBF-SOCIAL")]
    Social,
    #[serde(rename = "EBF-MIND")]
    Mind,
    #[serde(rename = "EBF-DECLINE")]
    Decline,
    #[serde(rename = "EBF-EXPOSURE")]
    Exposure,
    #[serde(rename = "EBF-ABANDON")]
    Abandon,
}

impl AxisCode {
    /// All axes, in the order the profile page renders them.
    pub const ALL: [AxisCode; 5] = [
        AxisCode::Social,
        AxisCode::Mind,
        AxisCode::Decline,
        AxisCode::Exposure,
        AxisCode::Abandon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AxisCode::Social => "EBF-SOCIAL",
            AxisCode::Mind => "EBF-MIND",
            AxisCode::Decline => "EBF-DECLINE",
            AxisCode::Exposure => "EBF-EXPOSURE",
            AxisCode::Abandon => "EBF-ABANDON",
        }
    }
}

impl fmt::Display for AxisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown axis code: {0}")]
pub struct UnknownAxis(pub String);

impl FromStr for AxisCode {
    type Err = UnknownAxis;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AxisCode::ALL
            .into_iter()
            .find(|axis| axis.as_str() == s.trim())
            .ok_or_else(|| UnknownAxis(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_axes() {
        for axis in AxisCode::ALL {
            assert_eq!(axis.as_str().parse::<AxisCode>().unwrap(), axis);
        }
        assert_eq!(" EBF-MIND ".parse::<AxisCode>().unwrap(), AxisCode::Mind);
    }

    #[test]
    fn test_parse_unknown_axis() {
        assert!("NOT-REAL".parse::<AxisCode>().is_err());
        assert!("ebf-social".parse::<AxisCode>().is_err());
        assert!("".parse::<AxisCode>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_codes() {
        let json = serde_json::to_string(&AxisCode::Exposure).unwrap();
        assert_eq!(json, "\"EBF-EXPOSURE\"");
    }
}
