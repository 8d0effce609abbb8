//! BoneTable chunk: bind-pose bone records

use glam::{EulerRot, Quat, Vec3};

use crate::cursor::ByteCursor;
use crate::error::{GmoError, Result};

use super::NAME_SIZE;

/// Size of one bone record
pub const BONE_RECORD_SIZE: usize = 76;

/// Stored rotation of a bone, angles in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoneRotation {
    /// Applied about Z, then Y, then X: `Rx * Ry * Rz`
    EulerZyx(Vec3),
    /// Applied about Y, then X, then Z: `Rz * Rx * Ry`
    EulerYxz(Vec3),
    Quaternion(Quat),
}

impl BoneRotation {
    /// Rotation as a normalized quaternion
    pub fn to_quat(self) -> Quat {
        match self {
            Self::EulerZyx(angles) => {
                Quat::from_euler(EulerRot::XYZ, angles.x, angles.y, angles.z)
            }
            Self::EulerYxz(angles) => {
                Quat::from_euler(EulerRot::ZXY, angles.z, angles.x, angles.y)
            }
            Self::Quaternion(q) => {
                if q.length_squared() > f32::EPSILON {
                    q.normalize()
                } else {
                    Quat::IDENTITY
                }
            }
        }
    }
}

/// One bone as stored in the table
#[derive(Debug, Clone, PartialEq)]
pub struct BoneRecord {
    pub name: String,
    /// Parent bone; `None` for roots
    pub parent: Option<usize>,
    pub translation: Vec3,
    pub rotation: BoneRotation,
    pub scale: Vec3,
}

impl BoneRecord {
    /// A root bone at the origin
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            translation: Vec3::ZERO,
            rotation: BoneRotation::Quaternion(Quat::IDENTITY),
            scale: Vec3::ONE,
        }
    }
}

fn read_bone(cursor: &mut ByteCursor<'_>) -> Result<BoneRecord> {
    let name = cursor.read_fixed_str(NAME_SIZE)?;
    let parent = usize::try_from(cursor.read_i16()?).ok();
    let rotation_kind = cursor.read_u16()?;
    let translation = Vec3::from_array(cursor.read_f32_array::<3>()?);
    let rotation = cursor.read_f32_array::<4>()?;
    let scale = Vec3::from_array(cursor.read_f32_array::<3>()?);

    let rotation = match rotation_kind {
        0 => BoneRotation::EulerZyx(Vec3::new(rotation[0], rotation[1], rotation[2])),
        1 => BoneRotation::EulerYxz(Vec3::new(rotation[0], rotation[1], rotation[2])),
        2 => BoneRotation::Quaternion(Quat::from_array(rotation)),
        other => {
            return Err(GmoError::Parse(format!(
                "bone '{name}': unknown rotation kind {other}"
            )));
        }
    };

    Ok(BoneRecord {
        name,
        parent,
        translation,
        rotation,
        scale,
    })
}

/// Decode a BoneTable chunk body
pub fn decode_bones(body: &[u8]) -> Result<Vec<BoneRecord>> {
    let mut cursor = ByteCursor::new(body);
    let count = cursor.read_u32()? as usize;

    let needed = count.saturating_mul(BONE_RECORD_SIZE);
    if needed > cursor.remaining() {
        return Err(GmoError::TruncatedData {
            offset: cursor.position(),
            needed,
            available: cursor.remaining(),
        });
    }

    let bones = (0..count)
        .map(|_| read_bone(&mut cursor))
        .collect::<Result<Vec<_>>>()?;

    log::debug!("BoneTable: {} bones", bones.len());
    Ok(bones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn record(name: &str, parent: i16, kind: u16, rotation: [f32; 4]) -> Vec<u8> {
        let mut data = vec![0u8; NAME_SIZE];
        data[..name.len()].copy_from_slice(name.as_bytes());
        data.extend_from_slice(&parent.to_le_bytes());
        data.extend_from_slice(&kind.to_le_bytes());
        for v in [1.0f32, 2.0, 3.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        for v in rotation {
            data.extend_from_slice(&v.to_le_bytes());
        }
        for _ in 0..3 {
            data.extend_from_slice(&1.0f32.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_decode_two_bones() {
        let mut body = 2u32.to_le_bytes().to_vec();
        body.extend(record("root", -1, 2, [0.0, 0.0, 0.0, 1.0]));
        body.extend(record("child", 0, 0, [0.0, 0.0, FRAC_PI_2, 0.0]));
        assert_eq!(body.len(), 4 + 2 * BONE_RECORD_SIZE);

        let bones = decode_bones(&body).unwrap();
        assert_eq!(bones[0].name, "root");
        assert_eq!(bones[0].parent, None);
        assert_eq!(bones[1].parent, Some(0));
        assert_eq!(bones[1].translation, Vec3::new(1.0, 2.0, 3.0));
        let rotated = bones[1].rotation.to_quat() * Vec3::X;
        assert!((rotated - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_euler_orders_differ() {
        let angles = Vec3::new(FRAC_PI_2, 0.0, FRAC_PI_2);
        let zyx = BoneRotation::EulerZyx(angles).to_quat();
        let yxz = BoneRotation::EulerYxz(angles).to_quat();
        assert!((zyx * Vec3::Z - yxz * Vec3::Z).length() > 0.5);
    }

    #[test]
    fn test_truncated_table() {
        let mut body = 3u32.to_le_bytes().to_vec();
        body.extend(record("root", -1, 2, [0.0, 0.0, 0.0, 1.0]));
        assert!(matches!(
            decode_bones(&body),
            Err(GmoError::TruncatedData { .. })
        ));
    }

    #[test]
    fn test_unknown_rotation_kind() {
        let mut body = 1u32.to_le_bytes().to_vec();
        body.extend(record("root", -1, 7, [0.0; 4]));
        assert!(matches!(decode_bones(&body), Err(GmoError::Parse(_))));
    }
}
