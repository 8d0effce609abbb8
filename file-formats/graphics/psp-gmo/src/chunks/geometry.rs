//! Geometry chunk: one mesh with its vertex stream and draw commands

use bytes::Bytes;
use glam::Vec3;

use crate::cursor::ByteCursor;
use crate::error::{GmoError, Result};
use crate::vertex_format::{IndexFormat, RawVertex, VertexFormat};

use super::NAME_SIZE;

/// Size of the fixed geometry header
pub const GEOMETRY_HEADER_SIZE: usize = 0x48;

/// Primitive types of a draw command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveKind {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Sprites,
}

impl PrimitiveKind {
    pub fn from_raw(raw: u16) -> Result<Self> {
        Ok(match raw {
            0 => Self::Points,
            1 => Self::Lines,
            2 => Self::LineStrip,
            3 => Self::Triangles,
            4 => Self::TriangleStrip,
            5 => Self::TriangleFan,
            6 => Self::Sprites,
            other => {
                return Err(GmoError::MalformedVertexStream(format!(
                    "unknown primitive type {other}"
                )));
            }
        })
    }

    pub fn to_raw(self) -> u16 {
        match self {
            Self::Points => 0,
            Self::Lines => 1,
            Self::LineStrip => 2,
            Self::Triangles => 3,
            Self::TriangleStrip => 4,
            Self::TriangleFan => 5,
            Self::Sprites => 6,
        }
    }

    /// Parse a text primitive name, with or without the `PRIM_` prefix
    pub fn from_name(name: &str) -> Option<Self> {
        match name.strip_prefix("PRIM_").unwrap_or(name) {
            "POINTS" => Some(Self::Points),
            "LINES" => Some(Self::Lines),
            "LINE_STRIP" => Some(Self::LineStrip),
            "TRIANGLES" => Some(Self::Triangles),
            "TRIANGLE_STRIP" => Some(Self::TriangleStrip),
            "TRIANGLE_FAN" => Some(Self::TriangleFan),
            "SPRITES" => Some(Self::Sprites),
            _ => None,
        }
    }

    /// Whether the primitive produces triangles
    pub fn is_triangle(self) -> bool {
        matches!(
            self,
            Self::Triangles | Self::TriangleStrip | Self::TriangleFan
        )
    }
}

/// One draw call: `primitive_count` primitives of `vertices_per_primitive` indices each
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCommand {
    pub primitive: PrimitiveKind,
    pub vertices_per_primitive: u32,
    pub primitive_count: u32,
    /// Vertex indices; implicit streams are expanded to consecutive indices
    pub indices: Vec<u32>,
}

impl DrawCommand {
    /// Index slices of the individual primitives
    pub fn primitives(&self) -> impl Iterator<Item = &[u32]> {
        let per = (self.vertices_per_primitive as usize).max(1);
        self.indices.chunks(per).take(self.primitive_count as usize)
    }
}

/// Vertex data of a mesh
#[derive(Debug, Clone, PartialEq)]
pub enum VertexStream {
    /// Raw bytes to decode under a vertex format
    Packed {
        format: VertexFormat,
        count: usize,
        data: Bytes,
    },
    /// Vertices parsed from a text export
    Decoded(Vec<RawVertex>),
}

impl VertexStream {
    pub fn len(&self) -> usize {
        match self {
            Self::Packed { count, .. } => *count,
            Self::Decoded(vertices) => vertices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode every vertex
    pub fn decode(&self) -> Result<Vec<RawVertex>> {
        match self {
            Self::Packed {
                format,
                count,
                data,
            } => {
                let mut cursor = ByteCursor::new(data);
                (0..*count).map(|_| format.read_vertex(&mut cursor)).collect()
            }
            Self::Decoded(vertices) => Ok(vertices.clone()),
        }
    }
}

/// Decoded Geometry chunk
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryChunk {
    /// Position in the chunk table, for error attribution
    pub chunk_index: usize,
    pub name: String,
    pub stream: VertexStream,
    pub draws: Vec<DrawCommand>,
    /// Index into the material table
    pub material: Option<u32>,
    /// Bone the whole mesh is attached to when it carries no weights
    pub rigid_bone: Option<u32>,
    /// Weight slot to bone index; empty means slot `i` is bone `i`
    pub palette: Vec<u32>,
}

impl GeometryChunk {
    /// Vertex positions bounding box in source space, ignoring draw commands
    pub fn source_bounds(&self) -> Result<Option<(Vec3, Vec3)>> {
        let vertices = self.stream.decode()?;
        Ok(vertices.iter().fold(None, |acc, v| match acc {
            None => Some((v.position, v.position)),
            Some((min, max)) => Some((min.min(v.position), max.max(v.position))),
        }))
    }
}

fn optional_index(raw: i32) -> Option<u32> {
    u32::try_from(raw).ok()
}

/// Decode a Geometry chunk body
///
/// `body` is the chunk's bytes; vertex data is sliced from it without copying.
pub fn decode_geometry(chunk_index: usize, body: &Bytes) -> Result<GeometryChunk> {
    let mut cursor = ByteCursor::new(body);

    let name = cursor.read_fixed_str(NAME_SIZE)?;
    let raw_format = cursor.read_u32()?;
    let declared_stride = cursor.read_u32()? as usize;
    let vertex_count = cursor.read_u32()? as usize;
    let vertex_offset = cursor.read_u32()? as usize;
    let material = optional_index(cursor.read_i32()?);
    let rigid_bone = optional_index(cursor.read_i32()?);
    let palette_count = cursor.read_u32()? as usize;
    let palette_offset = cursor.read_u32()? as usize;
    let draw_count = cursor.read_u32()? as usize;
    let draw_offset = cursor.read_u32()? as usize;

    let format = VertexFormat::from_raw(raw_format)?;
    let stride = format.stride();
    if declared_stride != stride {
        return Err(GmoError::MalformedVertexStream(format!(
            "mesh '{name}': declared stride {declared_stride} does not match format stride {stride}"
        )));
    }

    let vertex_end = vertex_count
        .checked_mul(stride)
        .and_then(|len| len.checked_add(vertex_offset))
        .filter(|&end| end <= body.len())
        .ok_or_else(|| {
            GmoError::MalformedVertexStream(format!(
                "mesh '{name}': {vertex_count} vertices of {stride} bytes at {vertex_offset:#x} exceed chunk size {:#x}",
                body.len()
            ))
        })?;
    let data = body.slice(vertex_offset..vertex_end);

    let palette = if palette_count == 0 {
        Vec::new()
    } else {
        let mut palette_cursor =
            cursor.sub_cursor(palette_offset, palette_count.saturating_mul(2))?;
        (0..palette_count)
            .map(|_| palette_cursor.read_u16().map(u32::from))
            .collect::<Result<Vec<_>>>()?
    };

    cursor.seek(draw_offset)?;
    let mut draws = Vec::with_capacity(draw_count.min(body.len() / 12));
    let mut next_implicit = 0usize;
    for _ in 0..draw_count {
        let primitive = PrimitiveKind::from_raw(cursor.read_u16()?)?;
        let _reserved = cursor.read_u16()?;
        let vertices_per_primitive = cursor.read_u32()?;
        let primitive_count = cursor.read_u32()?;
        let index_count = (vertices_per_primitive as usize)
            .checked_mul(primitive_count as usize)
            .ok_or_else(|| {
                GmoError::MalformedVertexStream(format!(
                    "mesh '{name}': draw command index count overflows"
                ))
            })?;

        let indices = match format.index {
            IndexFormat::Implicit => {
                let start = next_implicit;
                next_implicit = start
                    .checked_add(index_count)
                    .filter(|&end| end <= vertex_count)
                    .ok_or_else(|| {
                        GmoError::MalformedVertexStream(format!(
                            "mesh '{name}': draw of {index_count} implicit indices from {start} exceeds {vertex_count} vertices"
                        ))
                    })?;
                (start as u32..next_implicit as u32).collect()
            }
            IndexFormat::U8 => {
                let raw = cursor.read_bytes(index_count)?;
                raw.iter().map(|&i| u32::from(i)).collect()
            }
            IndexFormat::U16 => (0..index_count)
                .map(|_| cursor.read_u16().map(u32::from))
                .collect::<Result<Vec<_>>>()?,
        };
        cursor.align_to(4)?;

        draws.push(DrawCommand {
            primitive,
            vertices_per_primitive,
            primitive_count,
            indices,
        });
    }

    log::debug!(
        "Geometry '{}': {} vertices, stride {}, {} draw commands, {} palette entries",
        name,
        vertex_count,
        stride,
        draws.len(),
        palette.len()
    );

    Ok(GeometryChunk {
        chunk_index,
        name,
        stream: VertexStream::Packed {
            format,
            count: vertex_count,
            data,
        },
        draws,
        material,
        rigid_bone,
        palette,
    })
}
