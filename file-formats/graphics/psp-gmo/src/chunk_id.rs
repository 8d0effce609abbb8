use std::fmt;

/// Type tag of a top-level chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum ChunkKind {
    BoneTable,
    Geometry,
    MaterialTable,
    TextureRef,
    /// Animation data, recognized but not decoded
    Motion,
    /// Any other tag, kept as-is and skipped
    Unknown(u16),
}

impl ChunkKind {
    pub const BONE_TABLE: u16 = 0x0004;
    pub const GEOMETRY: u16 = 0x0005;
    pub const MATERIAL_TABLE: u16 = 0x0008;
    pub const TEXTURE_REF: u16 = 0x000A;
    pub const MOTION: u16 = 0x000B;

    pub fn from_tag(tag: u16) -> Self {
        match tag {
            Self::BONE_TABLE => Self::BoneTable,
            Self::GEOMETRY => Self::Geometry,
            Self::MATERIAL_TABLE => Self::MaterialTable,
            Self::TEXTURE_REF => Self::TextureRef,
            Self::MOTION => Self::Motion,
            other => Self::Unknown(other),
        }
    }

    pub fn tag(self) -> u16 {
        match self {
            Self::BoneTable => Self::BONE_TABLE,
            Self::Geometry => Self::GEOMETRY,
            Self::MaterialTable => Self::MATERIAL_TABLE,
            Self::TextureRef => Self::TEXTURE_REF,
            Self::Motion => Self::MOTION,
            Self::Unknown(tag) => tag,
        }
    }

    /// Chunks without which no usable scene can be built
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Geometry | Self::BoneTable)
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BoneTable => write!(f, "BoneTable"),
            Self::Geometry => write!(f, "Geometry"),
            Self::MaterialTable => write!(f, "MaterialTable"),
            Self::TextureRef => write!(f, "TextureRef"),
            Self::Motion => write!(f, "Motion"),
            Self::Unknown(tag) => write!(f, "Unknown({tag:#06x})"),
        }
    }
}
