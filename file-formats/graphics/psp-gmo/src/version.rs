//! Container format versions

use std::fmt;

use crate::error::{GmoError, Result};

/// Supported container versions, one per title
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum GmoVersion {
    /// Persona 3 Portable
    Persona3Portable,
    /// Persona 4 Golden
    Persona4Golden,
    /// Text export (`.GMS`), which carries no version tag
    Text,
}

impl GmoVersion {
    /// Map the header's version word to a known title
    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            1 => Ok(Self::Persona3Portable),
            2 => Ok(Self::Persona4Golden),
            other => Err(GmoError::UnsupportedFormatVersion(other)),
        }
    }

    /// The header's version word; `0` for text exports
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Persona3Portable => 1,
            Self::Persona4Golden => 2,
            Self::Text => 0,
        }
    }
}

impl fmt::Display for GmoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persona3Portable => write!(f, "Persona 3 Portable (v1)"),
            Self::Persona4Golden => write!(f, "Persona 4 Golden (v2)"),
            Self::Text => write!(f, "GMS text"),
        }
    }
}
