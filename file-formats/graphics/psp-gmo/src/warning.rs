//! Recoverable issues collected during an import

use std::fmt;

use crate::chunk_id::ChunkKind;
use crate::chunks::geometry::PrimitiveKind;
use crate::converter::ConversionError;

/// A problem that was worked around without failing the import
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub enum ImportWarning {
    /// A non-critical chunk could not be decoded and was dropped
    ChunkFailed {
        index: usize,
        kind: ChunkKind,
        reason: String,
    },

    /// A chunk was intentionally not decoded
    ChunkSkipped {
        index: usize,
        kind: ChunkKind,
        reason: String,
    },

    /// A draw command used a primitive type that has no triangles
    UnsupportedPrimitive {
        mesh: String,
        primitive: PrimitiveKind,
    },

    /// A mesh referenced a missing material and got the default one
    DanglingMaterialReference {
        mesh: String,
        index: Option<u32>,
        material_count: usize,
    },

    /// A material slot referenced a missing texture and was left empty
    DanglingTextureReference {
        material: String,
        index: u32,
        texture_count: usize,
    },

    /// The texture converter failed; the texture is a placeholder
    TextureConversionFailed {
        texture: String,
        reason: ConversionError,
    },

    /// A bone's bind position lies well outside the mesh bounds
    BoneOutsideMeshBounds {
        bone: String,
        index: usize,
        position: [f32; 3],
    },

    /// A text bone named a parent that does not exist and became a root
    UnknownParentBone { bone: String, parent: String },

    /// A text blend list named a bone that does not exist
    UnknownBlendBone { part: String, bone: String },
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChunkFailed {
                index,
                kind,
                reason,
            } => write!(f, "chunk #{index} ({kind}) dropped: {reason}"),
            Self::ChunkSkipped {
                index,
                kind,
                reason,
            } => write!(f, "chunk #{index} ({kind}) skipped: {reason}"),
            Self::UnsupportedPrimitive { mesh, primitive } => {
                write!(f, "mesh '{mesh}': {primitive:?} primitives ignored")
            }
            Self::DanglingMaterialReference {
                mesh,
                index: Some(index),
                material_count,
            } => write!(
                f,
                "mesh '{mesh}': material {index} out of range ({material_count} materials), using default"
            ),
            Self::DanglingMaterialReference { mesh, index: None, .. } => {
                write!(f, "mesh '{mesh}': no material, using default")
            }
            Self::DanglingTextureReference {
                material,
                index,
                texture_count,
            } => write!(
                f,
                "material '{material}': texture {index} out of range ({texture_count} textures)"
            ),
            Self::TextureConversionFailed { texture, reason } => {
                write!(f, "texture '{texture}': {reason}")
            }
            Self::BoneOutsideMeshBounds {
                bone,
                index,
                position,
            } => write!(
                f,
                "bone #{index} '{bone}' at ({:.3}, {:.3}, {:.3}) lies outside the mesh bounds",
                position[0], position[1], position[2]
            ),
            Self::UnknownParentBone { bone, parent } => {
                write!(f, "bone '{bone}': parent '{parent}' not found, treated as root")
            }
            Self::UnknownBlendBone { part, bone } => {
                write!(f, "part '{part}': blend bone '{bone}' not found")
            }
        }
    }
}

/// Ordered collection of warnings that also logs each entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Warnings {
    entries: Vec<ImportWarning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning
    pub fn push(&mut self, warning: ImportWarning) {
        log::warn!("{warning}");
        self.entries.push(warning);
    }

    /// Append warnings already logged elsewhere
    pub fn extend(&mut self, other: Warnings) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImportWarning> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<ImportWarning> {
        self.entries
    }
}
