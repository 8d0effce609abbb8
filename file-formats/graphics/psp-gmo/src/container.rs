//! Chunk table walk and per-chunk failure policy
//!
//! Geometry and BoneTable chunks are required for a usable scene, so a
//! failure in either aborts the import. Material and texture chunks only
//! degrade the result, and unknown chunk types are skipped.

use bytes::Bytes;
use std::collections::HashSet;
use std::fmt;

use crate::chunk_id::ChunkKind;
use crate::chunks::bone::decode_bones;
use crate::chunks::geometry::decode_geometry;
use crate::chunks::material::decode_materials;
use crate::chunks::texture::decode_textures;
use crate::chunks::{BoneRecord, GeometryChunk, MaterialRecord, TextureRecord};
use crate::error::{GmoError, ImportError};
use crate::header::{read_chunk_table, read_header, ChunkTableEntry};
use crate::version::GmoVersion;
use crate::warning::{ImportWarning, Warnings};

/// What happened to one chunk table entry
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub enum ChunkStatus {
    Decoded,
    Skipped(String),
    Failed(String),
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decoded => write!(f, "decoded"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Result of decoding one chunk table entry
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct ChunkOutcome {
    pub index: usize,
    pub kind: ChunkKind,
    pub offset: u32,
    pub size: u32,
    pub status: ChunkStatus,
}

/// Typed payloads of a decoded model file
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub version: GmoVersion,
    /// One entry per chunk table entry, in table order
    pub outcomes: Vec<ChunkOutcome>,
    /// One payload per Geometry chunk, in table order
    pub geometry: Vec<GeometryChunk>,
    pub bones: Vec<BoneRecord>,
    pub materials: Vec<MaterialRecord>,
    pub textures: Vec<TextureRecord>,
    pub warnings: Warnings,
}

impl Container {
    /// An empty container of the given version
    pub fn new(version: GmoVersion) -> Self {
        Self {
            version,
            outcomes: Vec::new(),
            geometry: Vec::new(),
            bones: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
            warnings: Warnings::new(),
        }
    }

    /// Number of chunks that failed to decode
    pub fn count_failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ChunkStatus::Failed(_)))
            .count()
    }
}

enum Payload {
    Geometry(GeometryChunk),
    Bones(Vec<BoneRecord>),
    Materials(Vec<MaterialRecord>),
    Textures(Vec<TextureRecord>),
}

fn decode_payload(
    index: usize,
    kind: ChunkKind,
    body: &Bytes,
    offset: usize,
) -> Result<Payload, GmoError> {
    match kind {
        ChunkKind::Geometry => decode_geometry(index, body).map(Payload::Geometry),
        ChunkKind::BoneTable => decode_bones(body).map(Payload::Bones),
        ChunkKind::MaterialTable => decode_materials(body).map(Payload::Materials),
        ChunkKind::TextureRef => decode_textures(body, offset).map(Payload::Textures),
        ChunkKind::Motion | ChunkKind::Unknown(_) => {
            Err(GmoError::Parse(format!("{kind} has no decoder")))
        }
    }
}

/// Decode a binary container held in memory
pub fn decode_container(data: &Bytes) -> Result<Container, ImportError> {
    let header = read_header(data).map_err(ImportError::Header)?;
    let table = read_chunk_table(data, &header).map_err(ImportError::Header)?;
    log::debug!(
        "{} container with {} chunks, table at {:#x}",
        header.version,
        table.len(),
        header.chunk_table_offset
    );

    let mut container = Container::new(header.version);
    let mut seen_tables = HashSet::new();

    for (index, entry) in table.iter().enumerate() {
        let status = decode_entry(&mut container, data, index, entry, &mut seen_tables)?;
        container.outcomes.push(ChunkOutcome {
            index,
            kind: entry.kind(),
            offset: entry.offset,
            size: entry.size,
            status,
        });
    }

    Ok(container)
}

fn decode_entry(
    container: &mut Container,
    data: &Bytes,
    index: usize,
    entry: &ChunkTableEntry,
    seen_tables: &mut HashSet<ChunkKind>,
) -> Result<ChunkStatus, ImportError> {
    let kind = entry.kind();
    let single = match kind {
        ChunkKind::BoneTable | ChunkKind::MaterialTable | ChunkKind::TextureRef => true,
        ChunkKind::Geometry => false,
        ChunkKind::Motion => {
            log::debug!("Chunk #{index}: skipping motion data");
            return Ok(ChunkStatus::Skipped("motion data is not imported".to_string()));
        }
        ChunkKind::Unknown(tag) => {
            log::debug!("Chunk #{index}: skipping unknown type {tag:#06x}");
            return Ok(ChunkStatus::Skipped("unknown chunk type".to_string()));
        }
    };

    if single && !seen_tables.insert(kind) {
        let reason = format!("duplicate {kind}, first one kept");
        container.warnings.push(ImportWarning::ChunkSkipped {
            index,
            kind,
            reason: reason.clone(),
        });
        return Ok(ChunkStatus::Skipped(reason));
    }

    let result = entry.range_within(data.len()).and_then(|range| {
        let offset = range.start;
        let body = data.slice(range);
        decode_payload(index, kind, &body, offset)
    });

    match result {
        Ok(payload) => {
            log::debug!(
                "Chunk #{index}: {kind} at {:#x}, {} bytes",
                entry.offset,
                entry.size
            );
            match payload {
                Payload::Geometry(geometry) => container.geometry.push(geometry),
                Payload::Bones(bones) => container.bones = bones,
                Payload::Materials(materials) => container.materials = materials,
                Payload::Textures(textures) => container.textures = textures,
            }
            Ok(ChunkStatus::Decoded)
        }
        Err(source) if kind.is_critical() => Err(ImportError::ChunkFailed {
            index,
            kind,
            source,
        }),
        Err(source) => {
            let reason = source.to_string();
            container.warnings.push(ImportWarning::ChunkFailed {
                index,
                kind,
                reason: reason.clone(),
            });
            Ok(ChunkStatus::Failed(reason))
        }
    }
}
