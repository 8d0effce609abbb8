//! Import entry points and scene assembly
//!
//! An import reads the whole model into memory, decodes the chunk table
//! (binary) or the block structure (text), then runs the geometry, skeleton
//! and material resolvers independently before joining their results into a
//! [`Scene`].
//!
//! # Example
//!
//! ```rust,no_run
//! use psp_gmo::{AxisConvention, ImportOptions, import_gms_with};
//!
//! let options = ImportOptions::new()
//!     .with_axis(AxisConvention::YUp)
//!     .with_converter("/opt/psp/GimConv.exe");
//! let scene = import_gms_with("models/bc001.GMO", &options)?;
//! for mesh in &scene.meshes {
//!     println!("{}: {} triangles", mesh.name, mesh.triangles.len());
//! }
//! # Ok::<(), psp_gmo::ImportError>(())
//! ```

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

use crate::container::{decode_container, Container};
use crate::converter::{GimConv, TextureConverter};
use crate::error::{GmoError, ImportError};
use crate::geometry::{reconstruct_geometry, GeometryOptions, ReconstructedGeometry};
use crate::material::{default_material, resolve_materials, ResolveContext, ResolvedMaterials};
use crate::options::{CancellationToken, ImportOptions};
use crate::parallel::join3;
use crate::scene::Scene;
use crate::skeleton::{Skeleton, SkeletonOptions};
use crate::text::{parse_gms, GMS_MAGIC};
use crate::warning::{ImportWarning, Warnings};

/// Leading bytes shared by every binary container
pub const BINARY_MAGIC: &[u8; 4] = b"OMG.";

/// Import a GMO or GMS file with default options
pub fn import_gms(path: impl AsRef<Path>) -> Result<Scene, ImportError> {
    Importer::new(ImportOptions::default()).import_path(path)
}

/// Import a GMO or GMS file
pub fn import_gms_with(
    path: impl AsRef<Path>,
    options: &ImportOptions,
) -> Result<Scene, ImportError> {
    Importer::new(options.clone()).import_path(path)
}

/// Import a model held in memory
///
/// External textures are not searched for since there is no model directory.
pub fn import_bytes(data: impl Into<Bytes>, options: &ImportOptions) -> Result<Scene, ImportError> {
    Importer::new(options.clone()).import_bytes(data)
}

/// Decode the container of `data` without resolving anything
///
/// The format is chosen from the leading bytes.
pub fn decode_source(data: &Bytes) -> Result<Container, ImportError> {
    if data.starts_with(BINARY_MAGIC) {
        decode_container(data)
    } else if data.starts_with(GMS_MAGIC.as_bytes()) {
        let text = String::from_utf8_lossy(data);
        parse_gms(&text).map_err(ImportError::Header)
    } else {
        let actual = String::from_utf8_lossy(&data[..data.len().min(4)]).into_owned();
        Err(ImportError::Header(GmoError::InvalidMagic {
            expected: format!("'OMG.' or '{GMS_MAGIC}'"),
            actual,
        }))
    }
}

/// Configured importer, reusable for any number of files
///
/// Each call builds its own texture cache; nothing is shared between
/// imports except the converter and the cancellation token.
#[derive(Clone)]
pub struct Importer {
    options: ImportOptions,
    cancel: CancellationToken,
    converter: Arc<dyn TextureConverter>,
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("options", &self.options)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl Importer {
    /// Importer using `GimConv` as configured in `options`
    pub fn new(options: ImportOptions) -> Self {
        let converter = GimConv::new(
            options.converter_path.clone(),
            options.texture_output_dir.clone(),
        )
        .with_timeout(options.converter_timeout);
        Self {
            options,
            cancel: CancellationToken::new(),
            converter: Arc::new(converter),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replace the texture converter
    pub fn with_converter(mut self, converter: Arc<dyn TextureConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Read and import a file; external textures are searched next to it
    pub fn import_path(&self, path: impl AsRef<Path>) -> Result<Scene, ImportError> {
        let path = path.as_ref();
        log::debug!("Importing {}", path.display());
        let data = std::fs::read(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.import(Bytes::from(data), path.parent())
    }

    pub fn import_bytes(&self, data: impl Into<Bytes>) -> Result<Scene, ImportError> {
        self.import(data.into(), None)
    }

    fn import(&self, data: Bytes, model_dir: Option<&Path>) -> Result<Scene, ImportError> {
        self.cancel.check()?;
        let container = decode_source(&data)?;
        self.cancel.check()?;
        self.assemble(container, model_dir)
    }

    fn assemble(&self, container: Container, model_dir: Option<&Path>) -> Result<Scene, ImportError> {
        let options = &self.options;
        let skeleton_options = SkeletonOptions {
            axis: options.axis,
            scale: options.scale,
            composition: options.composition,
            quaternion_convention: options.quaternion_convention,
        };
        let geometry_options = GeometryOptions {
            axis: options.axis,
            scale: options.scale,
            flip_v: options.flip_v,
            align_to_floor: options.align_to_floor,
        };
        let context = ResolveContext {
            converter: self.converter.as_ref(),
            model_dir,
            resolve_textures: options.resolve_textures,
            fatal_unresolved_textures: options.fatal_unresolved_textures,
            cancel: &self.cancel,
        };

        let (skeleton, geometry, materials) = join3(
            || {
                Skeleton::from_records(&container.bones, &skeleton_options)
                    .map_err(ImportError::Skeleton)
            },
            || reconstruct_geometry(&container.geometry, &geometry_options),
            || resolve_materials(&container.materials, &container.textures, &context),
        );
        self.cancel.check()?;

        let ReconstructedGeometry {
            mut meshes,
            material_refs,
            floor_offset,
            warnings: geometry_warnings,
        } = geometry?;
        let skeleton = skeleton?;
        let ResolvedMaterials {
            mut materials,
            textures,
            warnings: material_warnings,
        } = materials?;

        let mut warnings: Warnings = container.warnings;
        warnings.extend(geometry_warnings);
        warnings.extend(material_warnings);

        let material_count = materials.len();
        let mut fallback = None;
        for (mesh, requested) in meshes.iter_mut().zip(material_refs) {
            match requested {
                Some(index) if (index as usize) < material_count => mesh.material = index as usize,
                _ => {
                    warnings.push(ImportWarning::DanglingMaterialReference {
                        mesh: mesh.name.clone(),
                        index: requested,
                        material_count,
                    });
                    mesh.material = *fallback.get_or_insert_with(|| {
                        materials.push(default_material());
                        materials.len() - 1
                    });
                }
            }
        }

        skeleton
            .validate_bindings(&meshes)
            .map_err(ImportError::Skeleton)?;
        let skeleton = skeleton.with_root_offset(floor_offset);
        for warning in skeleton.check_bounds(&meshes, options.bone_bounds_tolerance) {
            warnings.push(warning);
        }

        let scene = Scene {
            version: container.version,
            meshes,
            skeleton,
            materials,
            textures,
            warnings: warnings.into_vec(),
            floor_offset,
        };
        log::info!(
            "Imported {} model: {} meshes, {} vertices, {} triangles, {} bones, {} materials, {} warnings",
            scene.version,
            scene.meshes.len(),
            scene.vertex_count(),
            scene.triangle_count(),
            scene.skeleton.len(),
            scene.materials.len(),
            scene.warnings.len()
        );
        Ok(scene)
    }
}
