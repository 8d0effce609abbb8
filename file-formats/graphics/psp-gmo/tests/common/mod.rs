//! Common test utilities and fixtures

#![allow(dead_code)]

pub mod encoder;

use glam::{Vec2, Vec3, Vec4};
use psp_gmo::chunks::{MaterialRecord, SlotRecord, TextureRole, TextureSource};
use psp_gmo::vertex_format::{Encoding, IndexFormat, RawVertex, VertexFormat};
use psp_gmo::{ConversionError, TextureConverter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use encoder::{bone, DrawSpec, GmoBuilder, MeshSpec};

/// Fake TIM2 blob stored inside test containers
pub const TIM2_BYTES: &[u8] = b"TIM2\x04\x00\x01\x00fake pixel data";

/// Float positions, normals and texcoords with 16-bit indices
pub const FLOAT_FORMAT: VertexFormat = VertexFormat {
    texcoord: Some(Encoding::Float),
    color: None,
    normal: Some(Encoding::Float),
    position: Encoding::Float,
    weights: None,
    index: IndexFormat::U16,
};

pub fn vertex(position: [f32; 3]) -> RawVertex {
    RawVertex {
        position: Vec3::from_array(position),
        normal: Some(Vec3::Y),
        uv: Some(Vec2::new(position[0], position[2])),
        ..RawVertex::default()
    }
}

/// A unit triangle lying on the XZ plane at height `y`
pub fn triangle_at(y: f32) -> Vec<RawVertex> {
    vec![
        vertex([0.0, y, 0.0]),
        vertex([1.0, y, 0.0]),
        vertex([0.0, y, 1.0]),
    ]
}

pub fn textured_material(name: &str, texture: u32) -> MaterialRecord {
    MaterialRecord {
        flags: 0x15,
        blend_mode: 0x8005_0400,
        slots: vec![SlotRecord {
            role: TextureRole::Base,
            texture: Some(texture),
        }],
        ..MaterialRecord::plain(name)
    }
}

/// One bone, one triangle, one material, one embedded texture
pub fn minimal_model() -> GmoBuilder {
    GmoBuilder::new(1)
        .bones(&[bone("root", None, Vec3::new(0.0, 0.5, 0.0))])
        .geometry(
            &MeshSpec::new("body", FLOAT_FORMAT, triangle_at(0.5))
                .draw(DrawSpec::triangles(&[0, 1, 2]))
                .material(0)
                .rigid_bone(0),
        )
        .materials(&[textured_material("skin", 0)])
        .textures(&[("skin.tm2", Some(TIM2_BYTES))])
}

pub fn write_model(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("Failed to write test model");
    path
}

/// Converter that records how often it runs
#[derive(Debug, Default)]
pub struct CountingConverter {
    pub calls: AtomicUsize,
}

impl CountingConverter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextureConverter for CountingConverter {
    fn convert(&self, name: &str, _source: &TextureSource) -> Result<PathBuf, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PathBuf::from(format!("/converted/{name}.png")))
    }
}

/// Write an executable shell script standing in for the converter
#[cfg(unix)]
pub fn converter_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-gimconv.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
    let mut permissions = std::fs::metadata(&path)
        .expect("Failed to stat script")
        .permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("Failed to chmod script");
    path
}

/// Route `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn assert_close(a: Vec3, b: Vec3) {
    assert!(
        a.abs_diff_eq(b, 1e-5),
        "expected {b:?}, got {a:?} (difference {:?})",
        a - b
    );
}

pub fn assert_close4(a: Vec4, b: Vec4) {
    assert!(a.abs_diff_eq(b, 1e-5), "expected {b:?}, got {a:?}");
}
