//! Decoder for PSP GMO model containers and their GMS text exports
//!
//! Models from Persona 3 Portable and Persona 4 Golden are decoded into an
//! immutable, renderer-neutral [`Scene`]: triangle meshes in a configurable
//! coordinate system, a bone hierarchy with bind-pose transforms, materials
//! and resolved texture files.
//!
//! ```rust,no_run
//! use psp_gmo::{ImportOptions, import_gms_with};
//!
//! let options = ImportOptions::new().with_converter("/opt/psp/GimConv.exe");
//! let scene = import_gms_with("bc001.GMO", &options)?;
//! println!(
//!     "{} meshes, {} bones, {} warnings",
//!     scene.meshes.len(),
//!     scene.skeleton.len(),
//!     scene.warnings.len()
//! );
//! # Ok::<(), psp_gmo::ImportError>(())
//! ```
//!
//! Recoverable problems never abort an import. They are collected in
//! [`Scene::warnings`] and logged through the `log` facade.

pub mod chunk_id;
pub mod chunks;
pub mod container;
pub mod converter;
pub mod coordinate;
pub mod cursor;
pub mod error;
pub mod geometry;
pub mod header;
pub mod import;
pub mod material;
pub mod options;
pub mod parallel;
pub mod scene;
pub mod skeleton;
pub mod text;
pub mod texture_lookup;
pub mod version;
pub mod vertex_format;
pub mod warning;

pub use chunk_id::ChunkKind;
pub use container::{decode_container, ChunkOutcome, ChunkStatus, Container};
pub use converter::{ConversionError, GimConv, TextureConverter};
pub use coordinate::AxisConvention;
pub use error::{GmoError, ImportError, Result};
pub use import::{decode_source, import_bytes, import_gms, import_gms_with, Importer};
pub use material::{BlendFunc, MaterialFlags};
pub use options::{CancellationToken, ImportOptions};
pub use scene::{
    BoneBinding, BoneInfluence, Material, Mesh, Scene, TextureRef, TextureSlot, TextureStatus,
    Vertex,
};
pub use skeleton::{Bone, BoneComposition, QuaternionConvention, Skeleton};
pub use version::GmoVersion;
pub use warning::ImportWarning;

/// Math types used throughout the scene
pub use glam;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
