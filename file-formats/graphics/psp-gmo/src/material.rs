//! Material and texture resolution
//!
//! Material records are carried over with their flags and blend words
//! untouched. Texture slots are bound to the texture table, and every
//! referenced texture is resolved at most once per import: embedded blobs
//! and proprietary files go through the [`TextureConverter`], standard
//! image files are used directly.

use bitflags::bitflags;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::chunks::{MaterialRecord, TextureRecord, TextureSource};
use crate::converter::{ConversionError, TextureConverter};
use crate::error::ImportError;
use crate::options::CancellationToken;
use crate::scene::{Material, TextureRef, TextureSlot, TextureStatus};
use crate::texture_lookup::{find_texture_file, TextureFileKind};
use crate::warning::{ImportWarning, Warnings};

bitflags! {
    /// Render state bits of a material
    ///
    /// Unknown bits are kept so the raw word survives unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        const LIGHTING = 0x01;
        const FOG = 0x02;
        const TEXTURE = 0x04;
        const CULL_FACE = 0x08;
        const DEPTH_TEST = 0x10;
        const DEPTH_MASK = 0x20;
        const ALPHA_TEST = 0x40;
        const ALPHA_MASK = 0x80;
    }
}

/// Blend equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
    Abs,
    Other(u8),
}

impl BlendOp {
    const NAMES: [&'static str; 6] = ["ADD", "SUB", "REV", "MIN", "MAX", "ABS"];

    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Add,
            1 => Self::Subtract,
            2 => Self::ReverseSubtract,
            3 => Self::Min,
            4 => Self::Max,
            5 => Self::Abs,
            other => Self::Other(other),
        }
    }

    pub fn to_raw(self) -> u8 {
        match self {
            Self::Add => 0,
            Self::Subtract => 1,
            Self::ReverseSubtract => 2,
            Self::Min => 3,
            Self::Max => 4,
            Self::Abs => 5,
            Self::Other(raw) => raw,
        }
    }

    /// Parse a text name such as `ADD` or `REV`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|&n| n == name)
            .map(|i| Self::from_raw(i as u8))
    }
}

/// Source or destination blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstColor,
    InvDstColor,
    DstAlpha,
    InvDstAlpha,
    Other(u8),
}

impl BlendFactor {
    const NAMES: [&'static str; 10] = [
        "ZERO",
        "ONE",
        "SRC_COLOR",
        "INV_SRC_COLOR",
        "SRC_ALPHA",
        "INV_SRC_ALPHA",
        "DST_COLOR",
        "INV_DST_COLOR",
        "DST_ALPHA",
        "INV_DST_ALPHA",
    ];

    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Zero,
            1 => Self::One,
            2 => Self::SrcColor,
            3 => Self::InvSrcColor,
            4 => Self::SrcAlpha,
            5 => Self::InvSrcAlpha,
            6 => Self::DstColor,
            7 => Self::InvDstColor,
            8 => Self::DstAlpha,
            9 => Self::InvDstAlpha,
            other => Self::Other(other),
        }
    }

    pub fn to_raw(self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::SrcColor => 2,
            Self::InvSrcColor => 3,
            Self::SrcAlpha => 4,
            Self::InvSrcAlpha => 5,
            Self::DstColor => 6,
            Self::InvDstColor => 7,
            Self::DstAlpha => 8,
            Self::InvDstAlpha => 9,
            Self::Other(raw) => raw,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|&n| n == name)
            .map(|i| Self::from_raw(i as u8))
    }
}

/// Read-only interpretation of a raw blend word
///
/// | bits  | field              |
/// |-------|--------------------|
/// | 0-3   | operation          |
/// | 8-11  | source factor      |
/// | 16-19 | destination factor |
/// | 31    | blending enabled   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub enabled: bool,
    pub op: BlendOp,
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunc {
    const ENABLED: u32 = 1 << 31;

    pub fn decode(raw: u32) -> Self {
        Self {
            enabled: raw & Self::ENABLED != 0,
            op: BlendOp::from_raw((raw & 0xF) as u8),
            src: BlendFactor::from_raw(((raw >> 8) & 0xF) as u8),
            dst: BlendFactor::from_raw(((raw >> 16) & 0xF) as u8),
        }
    }

    pub fn encode(&self) -> u32 {
        let mut raw = u32::from(self.op.to_raw() & 0xF)
            | (u32::from(self.src.to_raw() & 0xF) << 8)
            | (u32::from(self.dst.to_raw() & 0xF) << 16);
        if self.enabled {
            raw |= Self::ENABLED;
        }
        raw
    }

    /// Parse the operands of a text `BlendFunc OP SRC DST` line
    pub fn from_names(op: &str, src: &str, dst: &str) -> Option<Self> {
        Some(Self {
            enabled: true,
            op: BlendOp::from_name(op)?,
            src: BlendFactor::from_name(src)?,
            dst: BlendFactor::from_name(dst)?,
        })
    }
}

impl fmt::Display for BlendFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled {
            write!(f, "{:?}({:?}, {:?})", self.op, self.src, self.dst)
        } else {
            write!(f, "disabled")
        }
    }
}

/// Cache identity of a texture source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TextureKey {
    Embedded { offset: usize, len: usize },
    External(String),
}

impl TextureKey {
    fn of(source: &TextureSource) -> Self {
        match source {
            TextureSource::Embedded { offset, data } => Self::Embedded {
                offset: *offset,
                len: data.len(),
            },
            TextureSource::External { file_name } => Self::External(file_name.clone()),
            TextureSource::File(path) => Self::External(path.to_string_lossy().into_owned()),
        }
    }
}

/// Inputs shared by every texture resolution of one import
pub struct ResolveContext<'a> {
    pub converter: &'a dyn TextureConverter,
    /// Directory searched for external textures
    pub model_dir: Option<&'a Path>,
    pub resolve_textures: bool,
    pub fatal_unresolved_textures: bool,
    pub cancel: &'a CancellationToken,
}

/// Materials and textures ready for the scene
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMaterials {
    pub materials: Vec<Material>,
    pub textures: Vec<TextureRef>,
    pub warnings: Warnings,
}

/// Texture resolution with a per-import cache
struct TextureResolver<'a> {
    ctx: &'a ResolveContext<'a>,
    cache: HashMap<TextureKey, TextureStatus>,
}

impl<'a> TextureResolver<'a> {
    fn new(ctx: &'a ResolveContext<'a>) -> Self {
        Self {
            ctx,
            cache: HashMap::new(),
        }
    }

    fn resolve(&mut self, texture: &TextureRecord) -> Result<TextureStatus, ImportError> {
        let key = TextureKey::of(&texture.source);
        if let Some(status) = self.cache.get(&key) {
            log::trace!("Texture '{}' already resolved", texture.name);
            return Ok(status.clone());
        }

        self.ctx.cancel.check()?;
        let status = match self.convert(texture) {
            Ok(path) => TextureStatus::ConvertedPath(path),
            Err(reason) => TextureStatus::ConversionFailed(reason),
        };
        self.cache.insert(key, status.clone());
        Ok(status)
    }

    fn convert(&self, texture: &TextureRecord) -> Result<PathBuf, ConversionError> {
        let file_name = match &texture.source {
            TextureSource::Embedded { .. } | TextureSource::File(_) => {
                return self.ctx.converter.convert(&texture.name, &texture.source);
            }
            TextureSource::External { file_name } => file_name,
        };

        let path = self
            .ctx
            .model_dir
            .and_then(|dir| find_texture_file(dir, file_name))
            .ok_or_else(|| ConversionError::SourceNotFound(file_name.clone()))?;

        match TextureFileKind::from_path(&path) {
            TextureFileKind::Image => Ok(path),
            TextureFileKind::Proprietary => self
                .ctx
                .converter
                .convert(&texture.name, &TextureSource::File(path)),
        }
    }
}

/// Bind material slots to textures and resolve every referenced texture
pub fn resolve_materials(
    records: &[MaterialRecord],
    texture_records: &[TextureRecord],
    ctx: &ResolveContext<'_>,
) -> Result<ResolvedMaterials, ImportError> {
    let mut warnings = Warnings::new();
    let mut textures: Vec<TextureRef> = texture_records
        .iter()
        .map(|t| TextureRef {
            name: t.name.clone(),
            source: t.source.clone(),
            status: TextureStatus::Unresolved,
        })
        .collect();
    let mut resolver = TextureResolver::new(ctx);
    let mut materials = Vec::with_capacity(records.len());

    for record in records {
        let mut slots = Vec::with_capacity(record.slots.len());
        let mut placeholder = false;

        for slot in &record.slots {
            let texture = match slot.texture {
                Some(index) if (index as usize) < textures.len() => Some(index as usize),
                Some(index) => {
                    warnings.push(ImportWarning::DanglingTextureReference {
                        material: record.name.clone(),
                        index,
                        texture_count: textures.len(),
                    });
                    None
                }
                None => None,
            };

            if let Some(index) = texture
                && ctx.resolve_textures
            {
                if textures[index].status == TextureStatus::Unresolved {
                    let status = resolver.resolve(&texture_records[index])?;
                    if let TextureStatus::ConversionFailed(reason) = &status {
                        if ctx.fatal_unresolved_textures {
                            return Err(ImportError::TextureUnresolved {
                                texture: textures[index].name.clone(),
                                reason: reason.clone(),
                            });
                        }
                        warnings.push(ImportWarning::TextureConversionFailed {
                            texture: textures[index].name.clone(),
                            reason: reason.clone(),
                        });
                    }
                    textures[index].status = status;
                }
                placeholder |= textures[index].status.is_failed();
            }

            slots.push(TextureSlot {
                role: slot.role,
                texture,
            });
        }

        materials.push(Material {
            name: record.name.clone(),
            flags: MaterialFlags::from_bits_retain(record.flags),
            blend_mode: record.blend_mode,
            diffuse: record.diffuse,
            ambient: record.ambient,
            specular: record.specular,
            emission: record.emission,
            slots,
            placeholder,
        });
    }

    log::debug!(
        "Resolved {} materials, {} of {} textures converted",
        materials.len(),
        textures
            .iter()
            .filter(|t| matches!(t.status, TextureStatus::ConvertedPath(_)))
            .count(),
        textures.len()
    );

    Ok(ResolvedMaterials {
        materials,
        textures,
        warnings,
    })
}

/// The shared material given to meshes whose material is missing
pub fn default_material() -> Material {
    let record = MaterialRecord::plain("default");
    Material {
        name: record.name,
        flags: MaterialFlags::LIGHTING | MaterialFlags::DEPTH_TEST | MaterialFlags::DEPTH_MASK,
        blend_mode: record.blend_mode,
        diffuse: record.diffuse,
        ambient: record.ambient,
        specular: record.specular,
        emission: record.emission,
        slots: Vec::new(),
        placeholder: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::{SlotRecord, TextureRole};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingConverter {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingConverter {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl TextureConverter for CountingConverter {
        fn convert(&self, name: &str, _source: &TextureSource) -> Result<PathBuf, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ConversionError::ConverterUnavailable("test".to_string()))
            } else {
                Ok(PathBuf::from(format!("/out/{name}.png")))
            }
        }
    }

    fn material(name: &str, textures: &[Option<u32>]) -> MaterialRecord {
        MaterialRecord {
            slots: textures
                .iter()
                .map(|&texture| SlotRecord {
                    role: TextureRole::Base,
                    texture,
                })
                .collect(),
            ..MaterialRecord::plain(name)
        }
    }

    fn embedded(name: &str, offset: usize) -> TextureRecord {
        TextureRecord {
            name: name.to_string(),
            source: TextureSource::Embedded {
                offset,
                data: Bytes::from_static(b"TIM2"),
            },
        }
    }

    fn context<'a>(
        converter: &'a dyn TextureConverter,
        cancel: &'a CancellationToken,
    ) -> ResolveContext<'a> {
        ResolveContext {
            converter,
            model_dir: None,
            resolve_textures: true,
            fatal_unresolved_textures: false,
            cancel,
        }
    }

    #[test]
    fn test_blend_decode() {
        let blend = BlendFunc::decode(0x8005_0400);
        assert!(blend.enabled);
        assert_eq!(blend.op, BlendOp::Add);
        assert_eq!(blend.src, BlendFactor::SrcAlpha);
        assert_eq!(blend.dst, BlendFactor::InvSrcAlpha);
        assert_eq!(blend.encode(), 0x8005_0400);
        assert_eq!(
            BlendFunc::from_names("ADD", "SRC_ALPHA", "INV_SRC_ALPHA"),
            Some(blend)
        );
    }

    #[test]
    fn test_flags_keep_unknown_bits() {
        let flags = MaterialFlags::from_bits_retain(0x8000_0011);
        assert!(flags.contains(MaterialFlags::LIGHTING | MaterialFlags::DEPTH_TEST));
        assert_eq!(flags.bits(), 0x8000_0011);
    }

    #[test]
    fn test_shared_texture_converted_once() {
        let converter = CountingConverter::new(false);
        let cancel = CancellationToken::new();
        let ctx = context(&converter, &cancel);
        let textures = [embedded("skin", 0x100), embedded("skin_copy", 0x100)];
        let records = [
            material("a", &[Some(0)]),
            material("b", &[Some(0)]),
            material("c", &[Some(1)]),
        ];

        let resolved = resolve_materials(&records, &textures, &ctx).unwrap();
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            resolved.textures[0].status,
            TextureStatus::ConvertedPath(PathBuf::from("/out/skin.png"))
        );
        assert_eq!(resolved.textures[1].status, resolved.textures[0].status);
        assert!(resolved.materials.iter().all(|m| !m.placeholder));
    }

    #[test]
    fn test_failed_texture_marks_placeholder() {
        let converter = CountingConverter::new(true);
        let cancel = CancellationToken::new();
        let ctx = context(&converter, &cancel);
        let resolved = resolve_materials(
            &[material("a", &[Some(0)]), material("plain", &[None])],
            &[embedded("skin", 0x100)],
            &ctx,
        )
        .unwrap();
        assert!(resolved.materials[0].placeholder);
        assert!(!resolved.materials[1].placeholder);
        assert!(matches!(
            resolved.textures[0].status,
            TextureStatus::ConversionFailed(ConversionError::ConverterUnavailable(_))
        ));
        assert_eq!(resolved.warnings.len(), 1);
    }

    #[test]
    fn test_fatal_unresolved() {
        let converter = CountingConverter::new(true);
        let cancel = CancellationToken::new();
        let ctx = ResolveContext {
            fatal_unresolved_textures: true,
            ..context(&converter, &cancel)
        };
        assert!(matches!(
            resolve_materials(&[material("a", &[Some(0)])], &[embedded("skin", 0)], &ctx),
            Err(ImportError::TextureUnresolved { .. })
        ));
    }

    #[test]
    fn test_dangling_texture_slot() {
        let converter = CountingConverter::new(false);
        let cancel = CancellationToken::new();
        let ctx = context(&converter, &cancel);
        let resolved =
            resolve_materials(&[material("a", &[Some(3)])], &[embedded("skin", 0)], &ctx)
                .unwrap();
        assert_eq!(resolved.materials[0].slots[0].texture, None);
        assert!(matches!(
            resolved.warnings.iter().next(),
            Some(ImportWarning::DanglingTextureReference { index: 3, .. })
        ));
    }

    #[test]
    fn test_resolution_disabled() {
        let converter = CountingConverter::new(false);
        let cancel = CancellationToken::new();
        let ctx = ResolveContext {
            resolve_textures: false,
            ..context(&converter, &cancel)
        };
        let resolved =
            resolve_materials(&[material("a", &[Some(0)])], &[embedded("skin", 0)], &ctx)
                .unwrap();
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(resolved.textures[0].status, TextureStatus::Unresolved);
        assert_eq!(resolved.materials[0].slots[0].texture, Some(0));
    }

    #[test]
    fn test_missing_external_file() {
        let converter = CountingConverter::new(false);
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();
        let ctx = ResolveContext {
            model_dir: Some(dir.path()),
            ..context(&converter, &cancel)
        };
        let external = TextureRecord {
            name: "hair".to_string(),
            source: TextureSource::External {
                file_name: "hair".to_string(),
            },
        };
        let resolved =
            resolve_materials(&[material("a", &[Some(0)])], &[external], &ctx).unwrap();
        assert_eq!(
            resolved.textures[0].status,
            TextureStatus::ConversionFailed(ConversionError::SourceNotFound("hair".to_string()))
        );
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancelled_before_conversion() {
        let converter = CountingConverter::new(false);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = context(&converter, &cancel);
        assert!(matches!(
            resolve_materials(&[material("a", &[Some(0)])], &[embedded("skin", 0)], &ctx),
            Err(ImportError::Cancelled)
        ));
    }
}
