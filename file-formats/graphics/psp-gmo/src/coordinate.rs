//! Coordinate system conversion for PSP models
//!
//! PSP model data is right-handed with Y up. Hosts such as Blender expect
//! Z up, which is reached by a +90° rotation about X:
//!
//! ```text
//! PSP (x, y, z)  ->  Z-up (x, -z, y)
//! ```
//!
//! Positions, normals and bone transforms all go through the same change
//! of basis, so skinned meshes stay aligned with their skeleton.
//!
//! # Examples
//!
//! ```rust
//! use glam::Vec3;
//! use psp_gmo::coordinate::{AxisConvention, transform_position};
//!
//! let up = transform_position(Vec3::Y, AxisConvention::ZUp);
//! assert_eq!(up, Vec3::Z);
//! ```

use glam::Vec3;

/// Target up-axis convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum AxisConvention {
    /// Keep the native PSP axes (Y up)
    YUp,
    /// Right-handed Z up, as used by Blender
    #[default]
    ZUp,
}

impl AxisConvention {
    /// Index of the up axis in the target space
    pub fn up_axis(self) -> usize {
        match self {
            Self::YUp => 1,
            Self::ZUp => 2,
        }
    }

    /// Unit vector pointing up in the target space
    pub fn up(self) -> Vec3 {
        match self {
            Self::YUp => Vec3::Y,
            Self::ZUp => Vec3::Z,
        }
    }
}

/// Transform a position from PSP coordinates to the target convention
pub fn transform_position(pos: Vec3, target: AxisConvention) -> Vec3 {
    match target {
        AxisConvention::YUp => pos,
        AxisConvention::ZUp => Vec3::new(pos.x, -pos.z, pos.y),
    }
}

/// Transform a normal and renormalize it
///
/// Zero-length normals are returned unchanged.
pub fn transform_normal(normal: Vec3, target: AxisConvention) -> Vec3 {
    transform_position(normal, target).normalize_or_zero()
}

/// Matrix form of the axis conversion
pub mod matrix {
    use super::AxisConvention;
    use glam::{Mat4, Vec4};

    /// Change-of-basis matrix `C` from PSP space to the target
    pub fn get_transform_matrix(target: AxisConvention) -> Mat4 {
        match target {
            AxisConvention::YUp => Mat4::IDENTITY,
            AxisConvention::ZUp => Mat4::from_cols(
                Vec4::new(1.0, 0.0, 0.0, 0.0), // X stays X
                Vec4::new(0.0, 0.0, 1.0, 0.0), // Y becomes Z
                Vec4::new(0.0, -1.0, 0.0, 0.0), // Z becomes -Y
                Vec4::W,
            ),
        }
    }

    /// Re-express a PSP-space transform in the target space: `C * M * C^-1`
    pub fn transform_matrix(matrix: Mat4, target: AxisConvention) -> Mat4 {
        let transform = get_transform_matrix(target);
        // Rotation only, so the transpose is the inverse
        transform * matrix * transform.transpose()
    }
}
