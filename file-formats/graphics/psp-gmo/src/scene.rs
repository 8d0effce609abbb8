//! The renderer-neutral result of an import

use glam::{Vec2, Vec3, Vec4};
use std::path::{Path, PathBuf};

use crate::chunks::{TextureRole, TextureSource};
use crate::converter::ConversionError;
use crate::material::MaterialFlags;
use crate::skeleton::Skeleton;
use crate::version::GmoVersion;
use crate::warning::ImportWarning;

/// A bone and how strongly it moves a vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneInfluence {
    pub bone: u32,
    pub weight: f32,
}

/// One vertex in the target coordinate system
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Option<Vec3>,
    pub uv: Option<Vec2>,
    pub color: Option<Vec4>,
    /// Normalized bone weights; empty for unskinned meshes
    pub influences: Vec<BoneInfluence>,
}

/// How a mesh follows the skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoneBinding {
    /// Not attached to any bone
    Unbound,
    /// Moves rigidly with one bone
    Rigid(u32),
    /// Per-vertex weights in [`Vertex::influences`]
    Skinned,
}

/// A triangle mesh with one material
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<[u32; 3]>,
    /// Index into [`Scene::materials`]
    pub material: usize,
    pub binding: BoneBinding,
}

impl Mesh {
    /// Bones referenced by this mesh, including the rigid bone
    pub fn referenced_bones(&self) -> impl Iterator<Item = u32> + '_ {
        let rigid = match self.binding {
            BoneBinding::Rigid(bone) => Some(bone),
            _ => None,
        };
        rigid.into_iter().chain(
            self.vertices
                .iter()
                .flat_map(|v| v.influences.iter().map(|i| i.bone)),
        )
    }

    /// Axis-aligned bounds of all vertex positions
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        bounds_of(self.vertices.iter().map(|v| v.position))
    }
}

pub(crate) fn bounds_of(points: impl Iterator<Item = Vec3>) -> Option<(Vec3, Vec3)> {
    points.fold(None, |acc, p| match acc {
        None => Some((p, p)),
        Some((min, max)) => Some((min.min(p), max.max(p))),
    })
}

/// A texture slot bound to an entry of [`Scene::textures`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSlot {
    pub role: TextureRole,
    /// `None` for an empty or dangling slot
    pub texture: Option<usize>,
}

/// Surface description, with flags and blend mode carried over unmodified
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub flags: MaterialFlags,
    /// Raw blend word, see [`crate::material::BlendFunc::decode`]
    pub blend_mode: u32,
    pub diffuse: Vec4,
    pub ambient: Vec4,
    pub specular: Vec4,
    pub emission: Vec4,
    pub slots: Vec<TextureSlot>,
    /// Substituted default, or a bound texture failed to convert
    pub placeholder: bool,
}

/// Resolution state of a texture
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TextureStatus {
    #[default]
    Unresolved,
    /// A loadable image file
    ConvertedPath(PathBuf),
    ConversionFailed(ConversionError),
}

impl TextureStatus {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::ConvertedPath(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::ConversionFailed(_))
    }
}

/// A texture and what became of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRef {
    pub name: String,
    pub source: TextureSource,
    pub status: TextureStatus,
}

/// Everything decoded from one model file
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub version: GmoVersion,
    pub meshes: Vec<Mesh>,
    pub skeleton: Skeleton,
    pub materials: Vec<Material>,
    pub textures: Vec<TextureRef>,
    pub warnings: Vec<ImportWarning>,
    /// Translation applied to every vertex and to the skeleton roots
    pub floor_offset: Vec3,
}

impl Scene {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.triangles.len()).sum()
    }

    /// Combined bounds of every mesh
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        bounds_of(
            self.meshes
                .iter()
                .flat_map(|m| m.vertices.iter().map(|v| v.position)),
        )
    }

    pub fn material(&self, mesh: &Mesh) -> Option<&Material> {
        self.materials.get(mesh.material)
    }
}
