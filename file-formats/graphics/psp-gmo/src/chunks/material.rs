//! MaterialTable chunk: material records with texture slots

use glam::Vec4;

use crate::cursor::ByteCursor;
use crate::error::Result;

use super::NAME_SIZE;

/// Texture index marking an unused slot
pub const EMPTY_SLOT: u16 = 0xFFFF;

/// What a texture slot is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureRole {
    /// Diffuse color map
    Base,
    /// Environment / reflection map
    Environment,
    Other(u16),
}

impl TextureRole {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Base,
            1 => Self::Environment,
            other => Self::Other(other),
        }
    }

    pub fn to_raw(self) -> u16 {
        match self {
            Self::Base => 0,
            Self::Environment => 1,
            Self::Other(raw) => raw,
        }
    }
}

/// One texture slot as stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRecord {
    pub role: TextureRole,
    /// Index into the texture table; `None` for an empty slot
    pub texture: Option<u32>,
}

/// One material as stored
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    pub name: String,
    pub flags: u32,
    pub blend_mode: u32,
    pub diffuse: Vec4,
    pub ambient: Vec4,
    pub specular: Vec4,
    pub emission: Vec4,
    pub slots: Vec<SlotRecord>,
}

impl MaterialRecord {
    /// An untextured opaque white material
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: 0,
            blend_mode: 0,
            diffuse: Vec4::ONE,
            ambient: Vec4::new(0.5, 0.5, 0.5, 1.0),
            specular: Vec4::ZERO,
            emission: Vec4::ZERO,
            slots: Vec::new(),
        }
    }
}

fn read_color(cursor: &mut ByteCursor<'_>) -> Result<Vec4> {
    Ok(Vec4::from_array(cursor.read_f32_array::<4>()?))
}

fn read_material(cursor: &mut ByteCursor<'_>) -> Result<MaterialRecord> {
    let name = cursor.read_fixed_str(NAME_SIZE)?;
    let flags = cursor.read_u32()?;
    let blend_mode = cursor.read_u32()?;
    let diffuse = read_color(cursor)?;
    let ambient = read_color(cursor)?;
    let specular = read_color(cursor)?;
    let emission = read_color(cursor)?;

    let slot_count = cursor.read_u32()? as usize;
    let mut slots = Vec::with_capacity(slot_count.min(cursor.remaining() / 4));
    for _ in 0..slot_count {
        let role = TextureRole::from_raw(cursor.read_u16()?);
        let index = cursor.read_u16()?;
        slots.push(SlotRecord {
            role,
            texture: (index != EMPTY_SLOT).then_some(u32::from(index)),
        });
    }

    Ok(MaterialRecord {
        name,
        flags,
        blend_mode,
        diffuse,
        ambient,
        specular,
        emission,
        slots,
    })
}

/// Decode a MaterialTable chunk body
pub fn decode_materials(body: &[u8]) -> Result<Vec<MaterialRecord>> {
    let mut cursor = ByteCursor::new(body);
    let count = cursor.read_u32()? as usize;

    let mut materials = Vec::with_capacity(count.min(body.len() / 4));
    for _ in 0..count {
        materials.push(read_material(&mut cursor)?);
    }

    log::debug!("MaterialTable: {} materials", materials.len());
    Ok(materials)
}
