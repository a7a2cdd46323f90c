use std::fmt;

use serde::{Deserialize, Serialize};

/// Application role carried in the `app_metadata.role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Dev,
    Viewer,
}

impl Role {
    /// Parse the role claim. The match is exact: `"Admin"` is not a role.
    pub fn from_claim(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "dev" => Some(Self::Dev),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Dev => write!(f, "dev"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}
