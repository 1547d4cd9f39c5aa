//! Project identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Project identifier as found in the `project_id` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub i64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProjectId {
    fn from(id: i64) -> Self {
        ProjectId(id)
    }
}

impl FromStr for ProjectId {
    type Err = String;

    /// Accepts plain integers and integral floats (`"7"`, `" 7 "`, `"7.0"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(ProjectId(id));
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(ProjectId(f as i64))
            }
            _ => Err(format!("invalid project id: {:?}", s)),
        }
    }
}
