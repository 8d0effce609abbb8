//! Mesh reconstruction from decoded Geometry payloads
//!
//! Draw commands are expanded into an explicit triangle list, vertices are
//! moved into the target coordinate system, and palette-relative weights
//! become normalized bone influences.

use glam::{Vec2, Vec3};

use crate::chunk_id::ChunkKind;
use crate::chunks::{DrawCommand, GeometryChunk, PrimitiveKind};
use crate::coordinate::{transform_normal, transform_position, AxisConvention};
use crate::error::{GmoError, ImportError, Result};
use crate::scene::{bounds_of, BoneBinding, BoneInfluence, Mesh, Vertex};
use crate::vertex_format::RawVertex;
use crate::warning::{ImportWarning, Warnings};

/// Weights at or below this are discarded before normalization
pub const WEIGHT_THRESHOLD: f32 = 1e-4;

/// Settings for mesh reconstruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryOptions {
    pub axis: AxisConvention,
    pub scale: f32,
    pub flip_v: bool,
    pub align_to_floor: bool,
}

impl Default for GeometryOptions {
    fn default() -> Self {
        Self {
            axis: AxisConvention::default(),
            scale: 1.0,
            flip_v: false,
            align_to_floor: true,
        }
    }
}

/// Meshes of one import, in Geometry chunk order
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedGeometry {
    pub meshes: Vec<Mesh>,
    /// Material index each mesh asked for, parallel to `meshes`
    pub material_refs: Vec<Option<u32>>,
    /// Translation applied by floor alignment
    pub floor_offset: Vec3,
    pub warnings: Warnings,
}

/// Append the triangles of one primitive to `out`
///
/// Strips alternate winding and drop degenerate triangles. Fewer than
/// three indices produce nothing.
pub fn expand_primitive(kind: PrimitiveKind, indices: &[u32], out: &mut Vec<[u32; 3]>) {
    if indices.len() < 3 {
        return;
    }
    match kind {
        PrimitiveKind::Triangles => {
            out.extend(indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]));
        }
        PrimitiveKind::TriangleStrip => {
            for (i, w) in indices.windows(3).enumerate() {
                let (a, b, c) = (w[0], w[1], w[2]);
                if a == b || b == c || a == c {
                    continue;
                }
                out.push(if i % 2 == 0 { [a, b, c] } else { [b, a, c] });
            }
        }
        PrimitiveKind::TriangleFan => {
            let center = indices[0];
            out.extend(indices[1..].windows(2).map(|w| [center, w[0], w[1]]));
        }
        PrimitiveKind::Points
        | PrimitiveKind::Lines
        | PrimitiveKind::LineStrip
        | PrimitiveKind::Sprites => {}
    }
}

/// Triangles of every primitive in a draw command
pub fn expand_draw(draw: &DrawCommand) -> Vec<[u32; 3]> {
    let mut triangles = Vec::new();
    for (i, primitive) in draw.primitives().enumerate() {
        let before = triangles.len();
        expand_primitive(draw.primitive, primitive, &mut triangles);
        log::trace!(
            "{:?} primitive {}: {} indices, {} triangles",
            draw.primitive,
            i,
            primitive.len(),
            triangles.len() - before
        );
    }
    triangles
}

/// Map palette-relative weights to normalized bone influences
pub fn resolve_influences(weights: &[f32], palette: &[u32]) -> Result<Vec<BoneInfluence>> {
    let mut influences: Vec<BoneInfluence> = Vec::with_capacity(weights.len());
    for (slot, &weight) in weights.iter().enumerate() {
        if weight <= WEIGHT_THRESHOLD {
            continue;
        }
        let bone = if palette.is_empty() {
            slot as u32
        } else {
            *palette.get(slot).ok_or_else(|| {
                GmoError::MalformedVertexStream(format!(
                    "weight slot {slot} has no palette entry ({} entries)",
                    palette.len()
                ))
            })?
        };
        match influences.iter_mut().find(|i| i.bone == bone) {
            Some(existing) => existing.weight += weight,
            None => influences.push(BoneInfluence { bone, weight }),
        }
    }

    let total: f32 = influences.iter().map(|i| i.weight).sum();
    if total > 0.0 {
        for influence in &mut influences {
            influence.weight /= total;
        }
    }
    Ok(influences)
}

fn convert_vertex(raw: &RawVertex, options: &GeometryOptions) -> Vertex {
    Vertex {
        position: transform_position(raw.position * options.scale, options.axis),
        normal: raw.normal.map(|n| transform_normal(n, options.axis)),
        uv: raw.uv.map(|uv| {
            if options.flip_v {
                Vec2::new(uv.x, 1.0 - uv.y)
            } else {
                uv
            }
        }),
        color: raw.color,
        influences: Vec::new(),
    }
}

/// Build one mesh from a Geometry payload, without floor alignment
pub fn reconstruct_mesh(
    chunk: &GeometryChunk,
    options: &GeometryOptions,
    warnings: &mut Warnings,
) -> Result<Mesh> {
    let raw_vertices = chunk.stream.decode()?;
    let vertex_count = raw_vertices.len();

    let mut triangles = Vec::new();
    let mut reported = Vec::new();
    for draw in &chunk.draws {
        if !draw.primitive.is_triangle() {
            if !reported.contains(&draw.primitive) {
                reported.push(draw.primitive);
                warnings.push(ImportWarning::UnsupportedPrimitive {
                    mesh: chunk.name.clone(),
                    primitive: draw.primitive,
                });
            }
            continue;
        }
        if let Some(&bad) = draw.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(GmoError::MalformedVertexStream(format!(
                "mesh '{}': index {bad} out of range ({vertex_count} vertices)",
                chunk.name
            )));
        }
        triangles.extend(expand_draw(draw));
    }

    let weighted = raw_vertices.iter().any(|v| !v.weights.is_empty());
    let mut vertices = Vec::with_capacity(vertex_count);
    for raw in &raw_vertices {
        let mut vertex = convert_vertex(raw, options);
        if weighted {
            vertex.influences = resolve_influences(&raw.weights, &chunk.palette)?;
        }
        vertices.push(vertex);
    }

    let binding = if weighted {
        BoneBinding::Skinned
    } else if let Some(bone) = chunk.rigid_bone {
        BoneBinding::Rigid(bone)
    } else if let [bone] = chunk.palette[..] {
        for vertex in &mut vertices {
            vertex.influences = vec![BoneInfluence { bone, weight: 1.0 }];
        }
        BoneBinding::Skinned
    } else {
        BoneBinding::Unbound
    };

    log::debug!(
        "Mesh '{}': {} vertices, {} triangles, {:?}",
        chunk.name,
        vertices.len(),
        triangles.len(),
        binding
    );

    Ok(Mesh {
        name: chunk.name.clone(),
        vertices,
        triangles,
        material: 0,
        binding,
    })
}

/// Offset that moves the lowest vertex of all meshes onto the floor
pub fn floor_offset(meshes: &[Mesh], axis: AxisConvention) -> Vec3 {
    let up = axis.up_axis();
    bounds_of(
        meshes
            .iter()
            .flat_map(|m| m.vertices.iter().map(|v| v.position)),
    )
    .map_or(Vec3::ZERO, |(min, _)| axis.up() * -min[up])
}

/// Reconstruct every mesh of an import and align them as one group
pub fn reconstruct_geometry(
    chunks: &[GeometryChunk],
    options: &GeometryOptions,
) -> std::result::Result<ReconstructedGeometry, ImportError> {
    let mut warnings = Warnings::new();
    let mut meshes = Vec::with_capacity(chunks.len());
    let mut material_refs = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let mesh = reconstruct_mesh(chunk, options, &mut warnings).map_err(|source| {
            ImportError::ChunkFailed {
                index: chunk.chunk_index,
                kind: ChunkKind::Geometry,
                source,
            }
        })?;
        meshes.push(mesh);
        material_refs.push(chunk.material);
    }

    let offset = if options.align_to_floor {
        floor_offset(&meshes, options.axis)
    } else {
        Vec3::ZERO
    };
    if offset != Vec3::ZERO {
        for vertex in meshes.iter_mut().flat_map(|m| m.vertices.iter_mut()) {
            vertex.position += offset;
        }
    }

    Ok(ReconstructedGeometry {
        meshes,
        material_refs,
        floor_offset: offset,
        warnings,
    })
}
