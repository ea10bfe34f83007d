//! Membership roles.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role a member holds inside one group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Chairperson,
    Secretary,
    Treasurer,
    Member,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Chairperson,
        Role::Secretary,
        Role::Treasurer,
        Role::Member,
    ];

    /// At most one active holder per group.
    pub fn is_singleton(&self) -> bool {
        !matches!(self, Self::Member)
    }

    /// Chairperson, secretary or treasurer.
    pub fn is_officer(&self) -> bool {
        self.is_singleton()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chairperson => "chairperson",
            Self::Secretary => "secretary",
            Self::Treasurer => "treasurer",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chairperson" | "chairman" | "chair" => Ok(Self::Chairperson),
            "secretary" => Ok(Self::Secretary),
            "treasurer" => Ok(Self::Treasurer),
            "member" => Ok(Self::Member),
            other => Err(CoreError::Validation(format!("unknown role: {other}"))),
        }
    }
}
