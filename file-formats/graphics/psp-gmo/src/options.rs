//! Import configuration and cancellation

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::converter::DEFAULT_CONVERTER_TIMEOUT;
use crate::coordinate::AxisConvention;
use crate::error::ImportError;
use crate::skeleton::{BoneComposition, QuaternionConvention};

/// Name of the default directory for converted textures under the system temp dir
pub const DEFAULT_TEXTURE_DIR: &str = "psp-gmo-textures";

/// Settings for one import
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ImportOptions {
    /// Path to the texture converter executable
    pub converter_path: Option<PathBuf>,
    /// Maximum wait for one texture conversion
    pub converter_timeout: Duration,
    /// Directory receiving converted textures
    pub texture_output_dir: PathBuf,
    pub axis: AxisConvention,
    /// Fail the import when a texture cannot be resolved
    pub fatal_unresolved_textures: bool,
    /// Run texture lookup and conversion at all
    pub resolve_textures: bool,
    /// Uniform scale applied to positions and bone translations
    ///
    /// Models are stored in centimetre-like units; pass `0.01` to get
    /// metre-sized scenes for hosts that work in metres.
    pub scale: f32,
    /// Replace `v` with `1 - v`
    pub flip_v: bool,
    /// Translate the model so its lowest point sits at zero
    pub align_to_floor: bool,
    pub composition: BoneComposition,
    pub quaternion_convention: QuaternionConvention,
    /// Fraction of the mesh bounds diagonal a bone may lie outside the bounds
    pub bone_bounds_tolerance: f32,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            converter_path: None,
            converter_timeout: DEFAULT_CONVERTER_TIMEOUT,
            texture_output_dir: std::env::temp_dir().join(DEFAULT_TEXTURE_DIR),
            axis: AxisConvention::default(),
            fatal_unresolved_textures: false,
            resolve_textures: true,
            scale: 1.0,
            flip_v: false,
            align_to_floor: true,
            composition: BoneComposition::default(),
            quaternion_convention: QuaternionConvention::default(),
            bone_bounds_tolerance: 0.25,
        }
    }
}

impl ImportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_converter(mut self, path: impl Into<PathBuf>) -> Self {
        self.converter_path = Some(path.into());
        self
    }

    pub fn with_converter_timeout(mut self, timeout: Duration) -> Self {
        self.converter_timeout = timeout;
        self
    }

    pub fn with_texture_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.texture_output_dir = dir.into();
        self
    }

    pub fn with_axis(mut self, axis: AxisConvention) -> Self {
        self.axis = axis;
        self
    }

    pub fn with_fatal_unresolved_textures(mut self, fatal: bool) -> Self {
        self.fatal_unresolved_textures = fatal;
        self
    }

    pub fn with_resolve_textures(mut self, resolve: bool) -> Self {
        self.resolve_textures = resolve;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_flip_v(mut self, flip: bool) -> Self {
        self.flip_v = flip;
        self
    }

    pub fn with_align_to_floor(mut self, align: bool) -> Self {
        self.align_to_floor = align;
        self
    }

    pub fn with_composition(mut self, composition: BoneComposition) -> Self {
        self.composition = composition;
        self
    }

    pub fn with_quaternion_convention(mut self, convention: QuaternionConvention) -> Self {
        self.quaternion_convention = convention;
        self
    }

    pub fn with_bone_bounds_tolerance(mut self, tolerance: f32) -> Self {
        self.bone_bounds_tolerance = tolerance;
        self
    }
}

/// Shared flag a host sets to abandon an import in progress
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has been triggered
    pub fn check(&self) -> Result<(), ImportError> {
        if self.is_cancelled() {
            Err(ImportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ImportOptions::default();
        assert_eq!(options.axis, AxisConvention::ZUp);
        assert_eq!(options.converter_timeout, Duration::from_secs(30));
        assert!(options.texture_output_dir.ends_with(DEFAULT_TEXTURE_DIR));
        assert!(options.align_to_floor);
        assert!(options.resolve_textures);
        assert_eq!(options.scale, 1.0);
    }

    #[test]
    fn test_builder() {
        let options = ImportOptions::new()
            .with_axis(AxisConvention::YUp)
            .with_scale(0.01)
            .with_flip_v(true)
            .with_converter("/opt/GimConv");
        assert_eq!(options.axis, AxisConvention::YUp);
        assert_eq!(options.scale, 0.01);
        assert!(options.flip_v);
        assert_eq!(options.converter_path, Some(PathBuf::from("/opt/GimConv")));
    }

    #[test]
    fn test_cancellation_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(matches!(token.check(), Err(ImportError::Cancelled)));
    }

    #[cfg(feature = "serde-support")]
    #[test]
    fn test_partial_json() {
        let options: ImportOptions =
            serde_json::from_str(r#"{ "axis": "YUp", "scale": 2.0 }"#).unwrap();
        assert_eq!(options.axis, AxisConvention::YUp);
        assert_eq!(options.scale, 2.0);
        assert!(options.align_to_floor);
    }
}
