//! Sub-decoders for the typed top-level chunks
//!
//! Each decoder receives the chunk body and returns an owned payload.
//! Offsets stored inside a chunk are relative to the start of its body.

pub mod bone;
pub mod geometry;
pub mod material;
pub mod texture;

pub use bone::{BoneRecord, BoneRotation};
pub use geometry::{DrawCommand, GeometryChunk, PrimitiveKind, VertexStream};
pub use material::{MaterialRecord, SlotRecord, TextureRole};
pub use texture::{TextureRecord, TextureSource};

/// Width of every fixed-size name field
pub const NAME_SIZE: usize = 32;
