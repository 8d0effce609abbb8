//! Bone hierarchy and bind-pose world transforms
//!
//! Bones may reference parents that appear later in the table, so the
//! hierarchy is validated as a whole before any transform is computed.
//! World transforms are derived on demand and memoized per bone; a chain
//! is walked iteratively, so deep hierarchies cannot overflow the stack.
//!
//! # Example
//!
//! ```rust
//! use psp_gmo::chunks::BoneRecord;
//! use psp_gmo::skeleton::{Skeleton, SkeletonOptions};
//! use glam::Vec3;
//!
//! let mut child = BoneRecord::root("child");
//! child.parent = Some(0);
//! child.translation = Vec3::new(0.0, 1.0, 0.0);
//!
//! let skeleton = Skeleton::from_records(
//!     &[BoneRecord::root("root"), child],
//!     &SkeletonOptions::default(),
//! )?;
//! assert_eq!(skeleton.children(0), vec![1]);
//! # Ok::<(), psp_gmo::GmoError>(())
//! ```

use glam::{Mat4, Quat, Vec3};
use std::sync::OnceLock;

use crate::chunks::{BoneRecord, BoneRotation};
use crate::coordinate::{matrix, AxisConvention};
use crate::error::{GmoError, Result};
use crate::scene::{bounds_of, Mesh};
use crate::warning::ImportWarning;

/// Minimum distance for a child head to define a bone's tail
const TAIL_EPSILON: f32 = 1e-4;

/// Length of a leaf bone's tail before scaling
const LEAF_TAIL_LENGTH: f32 = 0.01;

/// Order in which a parent's world transform and a bone's local transform combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum BoneComposition {
    /// `world = parent * local`
    #[default]
    ParentThenLocal,
    /// `world = local * parent`
    LocalThenParent,
}

/// How stored quaternions are read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum QuaternionConvention {
    /// Use the quaternion as stored
    #[default]
    Direct,
    /// Use the conjugate of the stored quaternion
    Inverse,
}

/// Settings for building a [`Skeleton`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkeletonOptions {
    pub axis: AxisConvention,
    /// Uniform scale applied to translations
    pub scale: f32,
    pub composition: BoneComposition,
    pub quaternion_convention: QuaternionConvention,
}

impl Default for SkeletonOptions {
    fn default() -> Self {
        Self {
            axis: AxisConvention::default(),
            scale: 1.0,
            composition: BoneComposition::default(),
            quaternion_convention: QuaternionConvention::default(),
        }
    }
}

/// A bone with its local bind transform in native PSP space
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Bone {
    pub fn from_record(record: &BoneRecord, convention: QuaternionConvention) -> Self {
        let rotation = match (record.rotation, convention) {
            (BoneRotation::Quaternion(_), QuaternionConvention::Inverse) => {
                record.rotation.to_quat().conjugate()
            }
            _ => record.rotation.to_quat(),
        };
        Self {
            name: record.name.clone(),
            parent: record.parent,
            translation: record.translation,
            rotation,
            scale: record.scale,
        }
    }

    /// Local transform `T * R * S`
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Ordered bones with lazily computed world transforms
#[derive(Debug, Clone)]
pub struct Skeleton {
    bones: Vec<Bone>,
    options: SkeletonOptions,
    /// Added to every root, in target space
    root_offset: Vec3,
    /// World transforms in source space, filled on first use
    world: Vec<OnceLock<Mat4>>,
}

impl PartialEq for Skeleton {
    fn eq(&self, other: &Self) -> bool {
        self.bones == other.bones
            && self.options == other.options
            && self.root_offset == other.root_offset
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::empty()
    }
}

impl Skeleton {
    /// A skeleton without bones
    pub fn empty() -> Self {
        Self {
            bones: Vec::new(),
            options: SkeletonOptions::default(),
            root_offset: Vec3::ZERO,
            world: Vec::new(),
        }
    }

    /// Build and validate a skeleton from decoded bone records
    pub fn from_records(records: &[BoneRecord], options: &SkeletonOptions) -> Result<Self> {
        let bones = records
            .iter()
            .map(|r| Bone::from_record(r, options.quaternion_convention))
            .collect();
        Self::new(bones, *options)
    }

    /// Validate the hierarchy and wrap it
    ///
    /// Fails with [`GmoError::BoneIndexOutOfRange`] for a parent outside the
    /// table and [`GmoError::CyclicSkeleton`] when a parent chain loops.
    pub fn new(bones: Vec<Bone>, options: SkeletonOptions) -> Result<Self> {
        validate_hierarchy(&bones)?;
        let world = (0..bones.len()).map(|_| OnceLock::new()).collect();
        log::debug!("Skeleton: {} bones", bones.len());
        Ok(Self {
            bones,
            options,
            root_offset: Vec3::ZERO,
            world,
        })
    }

    /// Shift every root by `offset` in target space
    pub fn with_root_offset(mut self, offset: Vec3) -> Self {
        self.root_offset = offset;
        self
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn options(&self) -> &SkeletonOptions {
        &self.options
    }

    pub fn root_offset(&self) -> Vec3 {
        self.root_offset
    }

    /// Indices of bones without a parent
    pub fn roots(&self) -> Vec<usize> {
        (0..self.bones.len())
            .filter(|&i| self.bones[i].parent.is_none())
            .collect()
    }

    /// Direct children of `index`, in table order
    pub fn children(&self, index: usize) -> Vec<usize> {
        (0..self.bones.len())
            .filter(|&i| self.bones[i].parent == Some(index))
            .collect()
    }

    /// Number of world transforms computed so far
    pub fn cached_transforms(&self) -> usize {
        self.world.iter().filter(|w| w.get().is_some()).count()
    }

    fn compose(&self, parent: Mat4, local: Mat4) -> Mat4 {
        match self.options.composition {
            BoneComposition::ParentThenLocal => parent * local,
            BoneComposition::LocalThenParent => local * parent,
        }
    }

    /// World transform in source space, memoized
    fn source_world(&self, index: usize) -> Mat4 {
        if let Some(cached) = self.world[index].get() {
            return *cached;
        }

        // Walk up to the nearest cached ancestor or a root
        let mut chain = vec![index];
        let mut base = Mat4::IDENTITY;
        let mut current = index;
        while let Some(parent) = self.bones[current].parent {
            if let Some(cached) = self.world[parent].get() {
                base = *cached;
                break;
            }
            chain.push(parent);
            current = parent;
        }

        let mut world = base;
        for &bone in chain.iter().rev() {
            let local = self.bones[bone].local_matrix();
            world = if self.bones[bone].parent.is_some() {
                self.compose(world, local)
            } else {
                local
            };
            world = *self.world[bone].get_or_init(|| world);
        }
        world
    }

    /// World bind transform of `index` in the target coordinate system
    pub fn world_transform(&self, index: usize) -> Option<Mat4> {
        if index >= self.bones.len() {
            return None;
        }
        let mut world = self.source_world(index);
        // Uniform scale only moves the translation column
        world.w_axis = (world.w_axis.truncate() * self.options.scale).extend(1.0);
        let converted = matrix::transform_matrix(world, self.options.axis);
        Some(Mat4::from_translation(self.root_offset) * converted)
    }

    /// World position of the bone's head
    pub fn head(&self, index: usize) -> Option<Vec3> {
        self.world_transform(index)
            .map(|m| m.transform_point3(Vec3::ZERO))
    }

    /// Point a bone visually extends to
    ///
    /// The tail reaches the first child's head when that is not on top of
    /// this bone; leaf bones get a short tail along their own X axis.
    pub fn bone_tail(&self, index: usize) -> Option<Vec3> {
        let world = self.world_transform(index)?;
        let head = world.transform_point3(Vec3::ZERO);

        if let Some(child_head) = self
            .children(index)
            .first()
            .and_then(|&child| self.head(child))
            && child_head.distance(head) > TAIL_EPSILON
        {
            return Some(child_head);
        }

        let axis = world.transform_vector3(Vec3::X).normalize_or(Vec3::X);
        Some(head + axis * LEAF_TAIL_LENGTH * self.options.scale)
    }

    /// Check every bone reference in `meshes` against the bone count
    pub fn validate_bindings(&self, meshes: &[Mesh]) -> Result<()> {
        let count = self.bones.len();
        for mesh in meshes {
            if let Some(bone) = mesh.referenced_bones().find(|&b| b as usize >= count) {
                return Err(GmoError::BoneIndexOutOfRange {
                    context: format!("mesh '{}'", mesh.name),
                    index: bone as usize,
                    count,
                });
            }
        }
        Ok(())
    }

    /// Warn about bones far outside the combined mesh bounds
    ///
    /// The bounds are grown by `tolerance` times their diagonal before testing.
    pub fn check_bounds(&self, meshes: &[Mesh], tolerance: f32) -> Vec<ImportWarning> {
        let Some((min, max)) = bounds_of(
            meshes
                .iter()
                .flat_map(|m| m.vertices.iter().map(|v| v.position)),
        ) else {
            return Vec::new();
        };

        let margin = Vec3::splat((max - min).length() * tolerance);
        let (min, max) = (min - margin, max + margin);

        (0..self.bones.len())
            .filter_map(|i| {
                let head = self.head(i)?;
                let inside = head.cmpge(min).all() && head.cmple(max).all();
                (!inside).then(|| ImportWarning::BoneOutsideMeshBounds {
                    bone: self.bones[i].name.clone(),
                    index: i,
                    position: head.to_array(),
                })
            })
            .collect()
    }
}

fn validate_hierarchy(bones: &[Bone]) -> Result<()> {
    let count = bones.len();
    for (index, bone) in bones.iter().enumerate() {
        if let Some(parent) = bone.parent
            && parent >= count
        {
            return Err(GmoError::BoneIndexOutOfRange {
                context: format!("parent of bone {index} '{}'", bone.name),
                index: parent,
                count,
            });
        }
    }

    // 0 = unvisited, 1 = on the current walk, 2 = reaches a root
    let mut state = vec![0u8; count];
    let mut walk = Vec::new();
    for start in 0..count {
        let mut current = Some(start);
        while let Some(bone) = current {
            match state[bone] {
                2 => break,
                1 => return Err(GmoError::CyclicSkeleton { bone }),
                _ => {
                    state[bone] = 1;
                    walk.push(bone);
                    current = bones[bone].parent;
                }
            }
        }
        for bone in walk.drain(..) {
            state[bone] = 2;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BoneBinding, BoneInfluence, Vertex};
    use pretty_assertions::assert_eq;

    fn bone(name: &str, parent: Option<usize>, translation: Vec3) -> Bone {
        Bone {
            name: name.to_string(),
            parent,
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    fn yup() -> SkeletonOptions {
        SkeletonOptions {
            axis: AxisConvention::YUp,
            ..SkeletonOptions::default()
        }
    }

    fn chain(len: usize) -> Vec<Bone> {
        (0..len)
            .map(|i| bone(&format!("b{i}"), i.checked_sub(1), Vec3::Y))
            .collect()
    }

    #[test]
    fn test_forward_parent_reference() {
        let bones = vec![bone("child", Some(1), Vec3::X), bone("root", None, Vec3::Y)];
        let skeleton = Skeleton::new(bones, yup()).unwrap();
        assert_eq!(skeleton.roots(), vec![1]);
        assert_eq!(skeleton.head(0).unwrap(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_cycle_detected() {
        let bones = vec![
            bone("a", Some(2), Vec3::ZERO),
            bone("b", Some(0), Vec3::ZERO),
            bone("c", Some(1), Vec3::ZERO),
        ];
        assert!(matches!(
            Skeleton::new(bones, yup()),
            Err(GmoError::CyclicSkeleton { .. })
        ));
    }

    #[test]
    fn test_cycle_reports_bone_on_loop() {
        let bones = vec![
            bone("a", Some(1), Vec3::ZERO),
            bone("b", Some(2), Vec3::ZERO),
            bone("c", Some(1), Vec3::ZERO),
        ];
        assert!(matches!(
            Skeleton::new(bones, yup()),
            Err(GmoError::CyclicSkeleton { bone: 1 })
        ));
    }

    #[test]
    fn test_self_parent_is_cycle() {
        let bones = vec![bone("a", Some(0), Vec3::ZERO)];
        assert!(matches!(
            Skeleton::new(bones, yup()),
            Err(GmoError::CyclicSkeleton { bone: 0 })
        ));
    }

    #[test]
    fn test_parent_out_of_range() {
        let bones = vec![bone("a", Some(5), Vec3::ZERO)];
        assert!(matches!(
            Skeleton::new(bones, yup()),
            Err(GmoError::BoneIndexOutOfRange { index: 5, count: 1, .. })
        ));
    }

    #[test]
    fn test_memoized_in_any_order() {
        let forward = Skeleton::new(chain(6), yup()).unwrap();
        let backward = Skeleton::new(chain(6), yup()).unwrap();

        let a: Vec<_> = (0..6).map(|i| forward.world_transform(i).unwrap()).collect();
        let mut b: Vec<_> = (0..6)
            .rev()
            .map(|i| backward.world_transform(i).unwrap())
            .collect();
        b.reverse();
        assert_eq!(a, b);
        assert_eq!(backward.cached_transforms(), 6);
    }

    #[test]
    fn test_leaf_fills_ancestors() {
        let skeleton = Skeleton::new(chain(4), yup()).unwrap();
        assert_eq!(skeleton.cached_transforms(), 0);
        assert_eq!(skeleton.head(3).unwrap(), Vec3::new(0.0, 4.0, 0.0));
        assert_eq!(skeleton.cached_transforms(), 4);
    }

    #[test]
    fn test_deep_chain_no_recursion() {
        let skeleton = Skeleton::new(chain(20_000), yup()).unwrap();
        let head = skeleton.head(19_999).unwrap();
        assert!((head.y - 20_000.0).abs() < 1.0);
    }

    #[test]
    fn test_composition_order() {
        let mut root = bone("root", None, Vec3::ZERO);
        root.rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let bones = vec![root, bone("child", Some(0), Vec3::X)];

        let parent_first = Skeleton::new(bones.clone(), yup()).unwrap();
        assert!(parent_first.head(1).unwrap().abs_diff_eq(Vec3::Y, 1e-5));

        let local_first = Skeleton::new(
            bones,
            SkeletonOptions {
                composition: BoneComposition::LocalThenParent,
                ..yup()
            },
        )
        .unwrap();
        assert!(local_first.head(1).unwrap().abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_quaternion_inverse() {
        let q = Quat::from_rotation_y(0.5);
        let record = BoneRecord {
            rotation: BoneRotation::Quaternion(q),
            ..BoneRecord::root("r")
        };
        let direct = Bone::from_record(&record, QuaternionConvention::Direct);
        let inverse = Bone::from_record(&record, QuaternionConvention::Inverse);
        assert!(direct.rotation.abs_diff_eq(q, 1e-6));
        assert!(inverse.rotation.abs_diff_eq(q.conjugate(), 1e-6));
    }

    #[test]
    fn test_zup_and_root_offset() {
        let bones = vec![bone("root", None, Vec3::new(0.0, 2.0, 0.0))];
        let skeleton = Skeleton::new(
            bones,
            SkeletonOptions {
                scale: 0.5,
                ..SkeletonOptions::default()
            },
        )
        .unwrap()
        .with_root_offset(Vec3::new(0.0, 0.0, 3.0));
        assert!(skeleton
            .head(0)
            .unwrap()
            .abs_diff_eq(Vec3::new(0.0, 0.0, 4.0), 1e-5));
    }

    #[test]
    fn test_bone_tail() {
        let bones = vec![
            bone("root", None, Vec3::ZERO),
            bone("child", Some(0), Vec3::Y),
            bone("stacked", Some(1), Vec3::ZERO),
        ];
        let skeleton = Skeleton::new(bones, yup()).unwrap();
        assert_eq!(skeleton.bone_tail(0).unwrap(), Vec3::Y);
        // child's only child sits on its head, so it falls back to the X axis
        let tail = skeleton.bone_tail(1).unwrap();
        assert!(tail.abs_diff_eq(Vec3::new(0.01, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_validate_bindings() {
        let skeleton = Skeleton::new(chain(2), yup()).unwrap();
        let mesh = Mesh {
            name: "body".to_string(),
            vertices: vec![Vertex {
                influences: vec![BoneInfluence { bone: 2, weight: 1.0 }],
                ..Vertex::default()
            }],
            triangles: Vec::new(),
            material: 0,
            binding: BoneBinding::Skinned,
        };
        assert!(matches!(
            skeleton.validate_bindings(std::slice::from_ref(&mesh)),
            Err(GmoError::BoneIndexOutOfRange { index: 2, count: 2, .. })
        ));

        let rigid = Mesh {
            vertices: Vec::new(),
            binding: BoneBinding::Rigid(1),
            ..mesh
        };
        assert!(skeleton.validate_bindings(&[rigid]).is_ok());
    }

    #[test]
    fn test_bounds_warning() {
        let bones = vec![
            bone("inside", None, Vec3::new(0.5, 0.5, 0.5)),
            bone("far", None, Vec3::new(50.0, 0.0, 0.0)),
        ];
        let skeleton = Skeleton::new(bones, yup()).unwrap();
        let mesh = Mesh {
            name: "cube".to_string(),
            vertices: [Vec3::ZERO, Vec3::ONE]
                .into_iter()
                .map(|position| Vertex {
                    position,
                    ..Vertex::default()
                })
                .collect(),
            triangles: Vec::new(),
            material: 0,
            binding: BoneBinding::Unbound,
        };
        let warnings = skeleton.check_bounds(&[mesh], 0.25);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            ImportWarning::BoneOutsideMeshBounds { index: 1, .. }
        ));
    }
}
