//! Vertex format descriptor
//!
//! Geometry chunks carry a packed vertex-type word in the layout used by
//! the PSP graphics engine. It is decoded once into a [`VertexFormat`],
//! which then drives fixed-stride reads of every vertex.
//!
//! | bits  | field               | values                               |
//! |-------|---------------------|--------------------------------------|
//! | 0-1   | texture coordinates | none, u8, u16, f32                   |
//! | 2-4   | color               | none, -, -, -, 565, 5551, 4444, 8888 |
//! | 5-6   | normal              | none, s8, s16, f32                   |
//! | 7-8   | position            | none, s8, s16, f32                   |
//! | 9-10  | weights             | none, u8, u16, f32                   |
//! | 11-12 | index               | none, u8, u16                        |
//! | 14-16 | weight count - 1    |                                      |
//!
//! Inside a vertex the elements appear in the order weights, texture
//! coordinates, color, normal, position. Each element is aligned to its
//! component size and the stride is padded to the largest alignment.

use glam::{Vec2, Vec3, Vec4};

use crate::cursor::ByteCursor;
use crate::error::{GmoError, Result};

/// Numeric encoding of one vertex element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum Encoding {
    /// Signed or unsigned 8-bit fixed point, `1.0 == 128`
    Fixed8,
    /// Signed or unsigned 16-bit fixed point, `1.0 == 32768`
    Fixed16,
    Float,
}

impl Encoding {
    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Self::Fixed8),
            2 => Some(Self::Fixed16),
            3 => Some(Self::Float),
            _ => None,
        }
    }

    fn to_bits(self) -> u32 {
        match self {
            Self::Fixed8 => 1,
            Self::Fixed16 => 2,
            Self::Float => 3,
        }
    }

    /// Size of one component in bytes
    pub fn size(self) -> usize {
        match self {
            Self::Fixed8 => 1,
            Self::Fixed16 => 2,
            Self::Float => 4,
        }
    }

    fn read_unsigned(self, cursor: &mut ByteCursor<'_>) -> Result<f32> {
        Ok(match self {
            Self::Fixed8 => cursor.read_u8()? as f32 / 128.0,
            Self::Fixed16 => cursor.read_u16()? as f32 / 32768.0,
            Self::Float => cursor.read_f32()?,
        })
    }

    fn read_signed(self, cursor: &mut ByteCursor<'_>) -> Result<f32> {
        Ok(match self {
            Self::Fixed8 => cursor.read_i8()? as f32 / 128.0,
            Self::Fixed16 => cursor.read_i16()? as f32 / 32768.0,
            Self::Float => cursor.read_f32()?,
        })
    }
}

/// Packed vertex color layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorFormat {
    Rgb565,
    Rgba5551,
    Rgba4444,
    Rgba8888,
}

impl ColorFormat {
    fn from_bits(bits: u32) -> Result<Option<Self>> {
        match bits {
            0 => Ok(None),
            4 => Ok(Some(Self::Rgb565)),
            5 => Ok(Some(Self::Rgba5551)),
            6 => Ok(Some(Self::Rgba4444)),
            7 => Ok(Some(Self::Rgba8888)),
            other => Err(GmoError::MalformedVertexStream(format!(
                "reserved color format {other}"
            ))),
        }
    }

    fn to_bits(self) -> u32 {
        match self {
            Self::Rgb565 => 4,
            Self::Rgba5551 => 5,
            Self::Rgba4444 => 6,
            Self::Rgba8888 => 7,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::Rgba8888 => 4,
            _ => 2,
        }
    }

    fn read(self, cursor: &mut ByteCursor<'_>) -> Result<Vec4> {
        fn channel(value: u32, shift: u32, bits: u32) -> f32 {
            let max = (1u32 << bits) - 1;
            ((value >> shift) & max) as f32 / max as f32
        }

        Ok(match self {
            Self::Rgba8888 => {
                let v = cursor.read_u32()?;
                Vec4::new(
                    channel(v, 0, 8),
                    channel(v, 8, 8),
                    channel(v, 16, 8),
                    channel(v, 24, 8),
                )
            }
            Self::Rgb565 => {
                let v = cursor.read_u16()? as u32;
                Vec4::new(channel(v, 0, 5), channel(v, 5, 6), channel(v, 11, 5), 1.0)
            }
            Self::Rgba5551 => {
                let v = cursor.read_u16()? as u32;
                Vec4::new(
                    channel(v, 0, 5),
                    channel(v, 5, 5),
                    channel(v, 10, 5),
                    channel(v, 15, 1),
                )
            }
            Self::Rgba4444 => {
                let v = cursor.read_u16()? as u32;
                Vec4::new(
                    channel(v, 0, 4),
                    channel(v, 4, 4),
                    channel(v, 8, 4),
                    channel(v, 12, 4),
                )
            }
        })
    }
}

/// Width of the entries in an index stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum IndexFormat {
    /// No index stream; primitives consume consecutive vertices
    Implicit,
    U8,
    U16,
}

impl IndexFormat {
    pub fn size(self) -> usize {
        match self {
            Self::Implicit => 0,
            Self::U8 => 1,
            Self::U16 => 2,
        }
    }
}

/// Decoded vertex-type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexFormat {
    pub texcoord: Option<Encoding>,
    pub color: Option<ColorFormat>,
    pub normal: Option<Encoding>,
    pub position: Encoding,
    /// Weight encoding and number of weights per vertex
    pub weights: Option<(Encoding, u8)>,
    pub index: IndexFormat,
}

/// One vertex exactly as stored, before palette lookup and axis remap
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawVertex {
    pub position: Vec3,
    pub normal: Option<Vec3>,
    pub uv: Option<Vec2>,
    pub color: Option<Vec4>,
    /// One weight per palette slot
    pub weights: Vec<f32>,
}

impl VertexFormat {
    /// Float positions only
    pub const POSITION_ONLY: Self = Self {
        texcoord: None,
        color: None,
        normal: None,
        position: Encoding::Float,
        weights: None,
        index: IndexFormat::Implicit,
    };

    /// Decode a packed vertex-type word
    pub fn from_raw(raw: u32) -> Result<Self> {
        let texcoord = Encoding::from_bits(raw & 0x3);
        let color = ColorFormat::from_bits((raw >> 2) & 0x7)?;
        let normal = Encoding::from_bits((raw >> 5) & 0x3);
        let position = Encoding::from_bits((raw >> 7) & 0x3).ok_or_else(|| {
            GmoError::MalformedVertexStream("vertex format has no position element".to_string())
        })?;
        let weights = Encoding::from_bits((raw >> 9) & 0x3)
            .map(|encoding| (encoding, (((raw >> 14) & 0x7) + 1) as u8));
        let index = match (raw >> 11) & 0x3 {
            0 => IndexFormat::Implicit,
            1 => IndexFormat::U8,
            2 => IndexFormat::U16,
            _ => {
                return Err(GmoError::MalformedVertexStream(
                    "reserved index format 3".to_string(),
                ));
            }
        };

        Ok(Self {
            texcoord,
            color,
            normal,
            position,
            weights,
            index,
        })
    }

    /// Encode back into a packed vertex-type word
    pub fn to_raw(&self) -> u32 {
        let mut raw = 0u32;
        raw |= self.texcoord.map_or(0, Encoding::to_bits);
        raw |= self.color.map_or(0, ColorFormat::to_bits) << 2;
        raw |= self.normal.map_or(0, Encoding::to_bits) << 5;
        raw |= self.position.to_bits() << 7;
        if let Some((encoding, count)) = self.weights {
            raw |= encoding.to_bits() << 9;
            raw |= (u32::from(count.max(1)) - 1) << 14;
        }
        raw |= match self.index {
            IndexFormat::Implicit => 0,
            IndexFormat::U8 => 1,
            IndexFormat::U16 => 2,
        } << 11;
        raw
    }

    /// Number of weights per vertex
    pub fn weight_count(&self) -> usize {
        self.weights.map_or(0, |(_, count)| count as usize)
    }

    /// `(size, alignment)` of each present element, in storage order
    fn elements(&self) -> Vec<(usize, usize)> {
        let mut elements = Vec::with_capacity(5);
        if let Some((encoding, count)) = self.weights {
            elements.push((encoding.size() * count as usize, encoding.size()));
        }
        if let Some(encoding) = self.texcoord {
            elements.push((encoding.size() * 2, encoding.size()));
        }
        if let Some(color) = self.color {
            elements.push((color.size(), color.size()));
        }
        if let Some(encoding) = self.normal {
            elements.push((encoding.size() * 3, encoding.size()));
        }
        elements.push((self.position.size() * 3, self.position.size()));
        elements
    }

    /// Bytes per vertex including alignment padding
    pub fn stride(&self) -> usize {
        let mut offset = 0usize;
        let mut max_align = 1usize;
        for (size, align) in self.elements() {
            offset = offset.next_multiple_of(align);
            offset += size;
            max_align = max_align.max(align);
        }
        offset.next_multiple_of(max_align)
    }

    /// Decode one vertex starting at the cursor's current position
    ///
    /// The cursor is left at the start of the following vertex.
    pub fn read_vertex(&self, cursor: &mut ByteCursor<'_>) -> Result<RawVertex> {
        let start = cursor.position();
        let mut vertex = RawVertex::default();

        if let Some((encoding, count)) = self.weights {
            cursor.align_to(encoding.size())?;
            vertex.weights = (0..count)
                .map(|_| encoding.read_unsigned(cursor))
                .collect::<Result<_>>()?;
        }
        if let Some(encoding) = self.texcoord {
            cursor.align_to(encoding.size())?;
            let u = encoding.read_unsigned(cursor)?;
            let v = encoding.read_unsigned(cursor)?;
            vertex.uv = Some(Vec2::new(u, v));
        }
        if let Some(color) = self.color {
            cursor.align_to(color.size())?;
            vertex.color = Some(color.read(cursor)?);
        }
        if let Some(encoding) = self.normal {
            cursor.align_to(encoding.size())?;
            vertex.normal = Some(read_vec3(encoding, cursor)?);
        }
        cursor.align_to(self.position.size())?;
        vertex.position = read_vec3(self.position, cursor)?;

        cursor.seek(start + self.stride())?;
        Ok(vertex)
    }
}

fn read_vec3(encoding: Encoding, cursor: &mut ByteCursor<'_>) -> Result<Vec3> {
    Ok(Vec3::new(
        encoding.read_signed(cursor)?,
        encoding.read_signed(cursor)?,
        encoding.read_signed(cursor)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_float_position_only() {
        let format = VertexFormat::from_raw(3 << 7).unwrap();
        assert_eq!(format, VertexFormat::POSITION_ONLY);
        assert_eq!(format.stride(), 12);
    }

    #[test]
    fn test_missing_position_rejected() {
        assert!(matches!(
            VertexFormat::from_raw(0),
            Err(GmoError::MalformedVertexStream(_))
        ));
    }

    #[test]
    fn test_reserved_bits_rejected() {
        // color format 2 is reserved
        assert!(VertexFormat::from_raw((3 << 7) | (2 << 2)).is_err());
        // index format 3 is reserved
        assert!(VertexFormat::from_raw((3 << 7) | (3 << 11)).is_err());
    }

    #[test]
    fn test_full_format_bits() {
        let raw = 3 | (7 << 2) | (3 << 5) | (3 << 7) | (3 << 9) | (2 << 11) | (3 << 14);
        let format = VertexFormat::from_raw(raw).unwrap();
        assert_eq!(format.texcoord, Some(Encoding::Float));
        assert_eq!(format.color, Some(ColorFormat::Rgba8888));
        assert_eq!(format.normal, Some(Encoding::Float));
        assert_eq!(format.weights, Some((Encoding::Float, 4)));
        assert_eq!(format.index, IndexFormat::U16);
        assert_eq!(format.to_raw(), raw);
        // 16 weights + 8 uv + 4 color + 12 normal + 12 position
        assert_eq!(format.stride(), 52);
    }

    // u8 uv (2) -> pad to 2 -> s16 normal (6) -> s16 position (6) = 14, align 2
    #[test_case(1 | (2 << 5) | (2 << 7), 14 ; "fixed point padding")]
    // s8 position only: 3 bytes, alignment 1
    #[test_case(1 << 7, 3 ; "byte positions")]
    // u8 weight x2 (2) -> f32 position aligned to 4 -> 4 + 12 = 16
    #[test_case((1 << 9) | (1 << 14) | (3 << 7), 16 ; "weights then float position")]
    // 565 color (2) + s16 position (6) = 8
    #[test_case((4 << 2) | (2 << 7), 8 ; "packed color")]
    fn test_stride(raw: u32, expected: usize) {
        assert_eq!(VertexFormat::from_raw(raw).unwrap().stride(), expected);
    }

    #[test]
    fn test_read_fixed_point_vertex() {
        // u8 uv, s16 normal, s16 position
        let format = VertexFormat::from_raw(1 | (2 << 5) | (2 << 7)).unwrap();
        let mut data = vec![64u8, 128];
        data.extend_from_slice(&0i16.to_le_bytes());
        data.extend_from_slice(&16384i16.to_le_bytes());
        data.extend_from_slice(&(-16384i16).to_le_bytes());
        data.extend_from_slice(&(-32768i16).to_le_bytes());
        data.extend_from_slice(&0i16.to_le_bytes());
        data.extend_from_slice(&8192i16.to_le_bytes());
        assert_eq!(data.len(), format.stride());

        let mut cursor = ByteCursor::new(&data);
        let vertex = format.read_vertex(&mut cursor).unwrap();
        assert_eq!(vertex.uv, Some(Vec2::new(0.5, 1.0)));
        assert_eq!(vertex.normal, Some(Vec3::new(0.0, 0.5, -0.5)));
        assert_eq!(vertex.position, Vec3::new(-1.0, 0.0, 0.25));
        assert_eq!(cursor.position(), 14);
    }

    #[test]
    fn test_read_colors() {
        let mut cursor_data = Vec::new();
        cursor_data.extend_from_slice(&0xFF00_00FFu32.to_le_bytes());
        let mut cursor = ByteCursor::new(&cursor_data);
        let color = ColorFormat::Rgba8888.read(&mut cursor).unwrap();
        assert_eq!(color, Vec4::new(1.0, 0.0, 0.0, 1.0));

        let data = 0xF800u16.to_le_bytes();
        let mut cursor = ByteCursor::new(&data);
        let color = ColorFormat::Rgb565.read(&mut cursor).unwrap();
        assert_eq!(color, Vec4::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_weights_are_read_per_slot() {
        let format = VertexFormat {
            weights: Some((Encoding::Fixed8, 2)),
            ..VertexFormat::POSITION_ONLY
        };
        let mut data = vec![96u8, 32, 0, 0];
        for v in [1.0f32, 2.0, 3.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let mut cursor = ByteCursor::new(&data);
        let vertex = format.read_vertex(&mut cursor).unwrap();
        assert_eq!(vertex.weights, vec![0.75, 0.25]);
        assert_eq!(vertex.position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_truncated_vertex() {
        let format = VertexFormat::POSITION_ONLY;
        let data = [0u8; 8];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            format.read_vertex(&mut cursor),
            Err(GmoError::TruncatedData { .. })
        ));
    }
}
