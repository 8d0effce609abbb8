//! Minimal writer for synthetic GMO containers
//!
//! Only used to build test inputs; the library itself never writes models.

use glam::{Quat, Vec3};
use psp_gmo::chunk_id::ChunkKind;
use psp_gmo::chunks::{BoneRecord, BoneRotation, MaterialRecord, PrimitiveKind};
use psp_gmo::header::{CHUNK_ENTRY_SIZE, GMO_MAGIC, HEADER_SIZE};
use psp_gmo::vertex_format::{ColorFormat, Encoding, IndexFormat, RawVertex, VertexFormat};

const NAME_SIZE: usize = 32;
const GEOMETRY_HEADER_SIZE: usize = 72;

fn put_name(out: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; NAME_SIZE];
    let len = name.len().min(NAME_SIZE - 1);
    field[..len].copy_from_slice(&name.as_bytes()[..len]);
    out.extend_from_slice(&field);
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn pad_to(out: &mut Vec<u8>, align: usize) {
    while out.len() % align != 0 {
        out.push(0);
    }
}

fn put_unsigned(out: &mut Vec<u8>, encoding: Encoding, v: f32) {
    match encoding {
        Encoding::Fixed8 => out.push((v * 128.0).round().clamp(0.0, 255.0) as u8),
        Encoding::Fixed16 => put_u16(out, (v * 32768.0).round().clamp(0.0, 65535.0) as u16),
        Encoding::Float => put_f32(out, v),
    }
}

fn put_signed(out: &mut Vec<u8>, encoding: Encoding, v: f32) {
    match encoding {
        Encoding::Fixed8 => out.push(((v * 128.0).round().clamp(-128.0, 127.0) as i8) as u8),
        Encoding::Fixed16 => put_u16(
            out,
            ((v * 32768.0).round().clamp(-32768.0, 32767.0) as i16) as u16,
        ),
        Encoding::Float => put_f32(out, v),
    }
}

fn put_vec3(out: &mut Vec<u8>, encoding: Encoding, v: Vec3) {
    for c in v.to_array() {
        put_signed(out, encoding, c);
    }
}

/// Pack vertices the way the vertex-type descriptor lays them out
pub fn encode_vertices(format: &VertexFormat, vertices: &[RawVertex]) -> Vec<u8> {
    let stride = format.stride();
    let mut out = Vec::with_capacity(stride * vertices.len());
    for vertex in vertices {
        let start = out.len();
        let align = |out: &mut Vec<u8>, n: usize| {
            while (out.len() - start) % n != 0 {
                out.push(0);
            }
        };
        if let Some((encoding, count)) = format.weights {
            align(&mut out, encoding.size());
            for slot in 0..count as usize {
                put_unsigned(&mut out, encoding, vertex.weights.get(slot).copied().unwrap_or(0.0));
            }
        }
        if let Some(encoding) = format.texcoord {
            align(&mut out, encoding.size());
            let uv = vertex.uv.unwrap_or_default();
            put_unsigned(&mut out, encoding, uv.x);
            put_unsigned(&mut out, encoding, uv.y);
        }
        if let Some(color) = format.color {
            assert_eq!(color, ColorFormat::Rgba8888, "encoder writes 8888 colors only");
            align(&mut out, 4);
            let c = vertex.color.unwrap_or_default();
            let channel = |v: f32| ((v * 255.0).round().clamp(0.0, 255.0)) as u32;
            put_u32(
                &mut out,
                channel(c.x) | channel(c.y) << 8 | channel(c.z) << 16 | channel(c.w) << 24,
            );
        }
        if let Some(encoding) = format.normal {
            align(&mut out, encoding.size());
            put_vec3(&mut out, encoding, vertex.normal.unwrap_or_default());
        }
        align(&mut out, format.position.size());
        put_vec3(&mut out, format.position, vertex.position);
        while out.len() - start < stride {
            out.push(0);
        }
    }
    out
}

/// One draw command to encode
#[derive(Debug, Clone)]
pub struct DrawSpec {
    pub primitive: PrimitiveKind,
    pub vertices_per_primitive: u32,
    pub primitive_count: u32,
    /// Ignored for implicit index formats
    pub indices: Vec<u32>,
}

impl DrawSpec {
    pub fn triangles(indices: &[u32]) -> Self {
        Self {
            primitive: PrimitiveKind::Triangles,
            vertices_per_primitive: 3,
            primitive_count: (indices.len() / 3) as u32,
            indices: indices.to_vec(),
        }
    }

    pub fn strip(indices: &[u32]) -> Self {
        Self {
            primitive: PrimitiveKind::TriangleStrip,
            vertices_per_primitive: indices.len() as u32,
            primitive_count: 1,
            indices: indices.to_vec(),
        }
    }
}

/// Contents of one Geometry chunk
#[derive(Debug, Clone)]
pub struct MeshSpec {
    pub name: String,
    pub format: VertexFormat,
    pub vertices: Vec<RawVertex>,
    pub draws: Vec<DrawSpec>,
    pub material: i32,
    pub rigid_bone: i32,
    pub palette: Vec<u16>,
    /// Written instead of the computed stride when set
    pub stride_override: Option<u32>,
}

impl MeshSpec {
    pub fn new(name: &str, format: VertexFormat, vertices: Vec<RawVertex>) -> Self {
        Self {
            name: name.to_string(),
            format,
            vertices,
            draws: Vec::new(),
            material: -1,
            rigid_bone: -1,
            palette: Vec::new(),
            stride_override: None,
        }
    }

    pub fn draw(mut self, draw: DrawSpec) -> Self {
        self.draws.push(draw);
        self
    }

    pub fn material(mut self, index: i32) -> Self {
        self.material = index;
        self
    }

    pub fn rigid_bone(mut self, index: i32) -> Self {
        self.rigid_bone = index;
        self
    }

    pub fn palette(mut self, palette: &[u16]) -> Self {
        self.palette = palette.to_vec();
        self
    }
}

pub fn encode_geometry(mesh: &MeshSpec) -> Vec<u8> {
    let vertex_data = encode_vertices(&mesh.format, &mesh.vertices);
    let vertex_offset = GEOMETRY_HEADER_SIZE;
    let palette_offset = vertex_offset + vertex_data.len().next_multiple_of(4);
    let draw_offset = palette_offset + (mesh.palette.len() * 2).next_multiple_of(4);

    let mut out = Vec::new();
    put_name(&mut out, &mesh.name);
    put_u32(&mut out, mesh.format.to_raw());
    put_u32(
        &mut out,
        mesh.stride_override
            .unwrap_or(mesh.format.stride() as u32),
    );
    put_u32(&mut out, mesh.vertices.len() as u32);
    put_u32(&mut out, vertex_offset as u32);
    put_i32(&mut out, mesh.material);
    put_i32(&mut out, mesh.rigid_bone);
    put_u32(&mut out, mesh.palette.len() as u32);
    put_u32(&mut out, palette_offset as u32);
    put_u32(&mut out, mesh.draws.len() as u32);
    put_u32(&mut out, draw_offset as u32);
    assert_eq!(out.len(), GEOMETRY_HEADER_SIZE);

    out.extend_from_slice(&vertex_data);
    pad_to(&mut out, 4);
    for &entry in &mesh.palette {
        put_u16(&mut out, entry);
    }
    pad_to(&mut out, 4);

    for draw in &mesh.draws {
        put_u16(&mut out, draw.primitive.to_raw());
        put_u16(&mut out, 0);
        put_u32(&mut out, draw.vertices_per_primitive);
        put_u32(&mut out, draw.primitive_count);
        match mesh.format.index {
            IndexFormat::Implicit => {}
            IndexFormat::U8 => out.extend(draw.indices.iter().map(|&i| i as u8)),
            IndexFormat::U16 => {
                for &i in &draw.indices {
                    put_u16(&mut out, i as u16);
                }
            }
        }
        pad_to(&mut out, 4);
    }
    out
}

pub fn encode_bones(bones: &[BoneRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, bones.len() as u32);
    for bone in bones {
        put_name(&mut out, &bone.name);
        out.extend_from_slice(&bone.parent.map_or(-1i16, |p| p as i16).to_le_bytes());
        let (kind, rotation) = match bone.rotation {
            BoneRotation::EulerZyx(v) => (0u16, v.extend(0.0).to_array()),
            BoneRotation::EulerYxz(v) => (1, v.extend(0.0).to_array()),
            BoneRotation::Quaternion(q) => (2, q.to_array()),
        };
        put_u16(&mut out, kind);
        for v in bone.translation.to_array() {
            put_f32(&mut out, v);
        }
        for v in rotation {
            put_f32(&mut out, v);
        }
        for v in bone.scale.to_array() {
            put_f32(&mut out, v);
        }
    }
    out
}

pub fn encode_materials(materials: &[MaterialRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, materials.len() as u32);
    for material in materials {
        put_name(&mut out, &material.name);
        put_u32(&mut out, material.flags);
        put_u32(&mut out, material.blend_mode);
        for color in [
            material.diffuse,
            material.ambient,
            material.specular,
            material.emission,
        ] {
            for v in color.to_array() {
                put_f32(&mut out, v);
            }
        }
        put_u32(&mut out, material.slots.len() as u32);
        for slot in &material.slots {
            put_u16(&mut out, slot.role.to_raw());
            put_u16(&mut out, slot.texture.map_or(0xFFFF, |t| t as u16));
        }
    }
    out
}

/// `(name, embedded bytes)`; `None` marks an external texture
pub fn encode_textures(textures: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, textures.len() as u32);
    let mut data_offset = 4 + textures.len() * 40;
    for (name, data) in textures {
        put_name(&mut out, name);
        match data {
            Some(bytes) => {
                put_u32(&mut out, data_offset as u32);
                put_u32(&mut out, bytes.len() as u32);
                data_offset += bytes.len();
            }
            None => {
                put_u32(&mut out, 0);
                put_u32(&mut out, 0);
            }
        }
    }
    for (_, data) in textures {
        if let Some(bytes) = data {
            out.extend_from_slice(bytes);
        }
    }
    out
}

/// One chunk table entry plus its body
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub tag: u16,
    pub body: Vec<u8>,
    /// Added to the size written in the table
    pub size_adjust: i64,
}

/// Assembles chunks into a complete container
#[derive(Debug, Clone)]
pub struct GmoBuilder {
    version: u32,
    chunks: Vec<RawChunk>,
}

impl Default for GmoBuilder {
    fn default() -> Self {
        Self::new(1)
    }
}

impl GmoBuilder {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            chunks: Vec::new(),
        }
    }

    pub fn chunk(mut self, kind: ChunkKind, body: Vec<u8>) -> Self {
        self.chunks.push(RawChunk {
            tag: kind.tag(),
            body,
            size_adjust: 0,
        });
        self
    }

    pub fn bones(self, bones: &[BoneRecord]) -> Self {
        self.chunk(ChunkKind::BoneTable, encode_bones(bones))
    }

    pub fn geometry(self, mesh: &MeshSpec) -> Self {
        self.chunk(ChunkKind::Geometry, encode_geometry(mesh))
    }

    pub fn materials(self, materials: &[MaterialRecord]) -> Self {
        self.chunk(ChunkKind::MaterialTable, encode_materials(materials))
    }

    pub fn textures(self, textures: &[(&str, Option<&[u8]>)]) -> Self {
        self.chunk(ChunkKind::TextureRef, encode_textures(textures))
    }

    /// Make the most recently added chunk claim `extra` bytes beyond its body
    pub fn overstate_last(mut self, extra: i64) -> Self {
        if let Some(last) = self.chunks.last_mut() {
            last.size_adjust = extra;
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = GMO_MAGIC.to_vec();
        put_u32(&mut out, self.version);
        put_u32(&mut out, self.chunks.len() as u32);
        put_u32(&mut out, HEADER_SIZE as u32);

        let mut offset = HEADER_SIZE + self.chunks.len() * CHUNK_ENTRY_SIZE;
        let mut bodies = Vec::new();
        for chunk in &self.chunks {
            put_u16(&mut out, chunk.tag);
            put_u16(&mut out, 0);
            put_u32(&mut out, offset as u32);
            put_u32(&mut out, (chunk.body.len() as i64 + chunk.size_adjust) as u32);
            let padded = chunk.body.len().next_multiple_of(4);
            bodies.extend_from_slice(&chunk.body);
            bodies.resize(bodies.len() + padded - chunk.body.len(), 0);
            offset += padded;
        }
        out.extend_from_slice(&bodies);
        out
    }
}

/// A bone rotated by a quaternion
pub fn bone(name: &str, parent: Option<usize>, translation: Vec3) -> BoneRecord {
    BoneRecord {
        name: name.to_string(),
        parent,
        translation,
        rotation: BoneRotation::Quaternion(Quat::IDENTITY),
        scale: Vec3::ONE,
    }
}
