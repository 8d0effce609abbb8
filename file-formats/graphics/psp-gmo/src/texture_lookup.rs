//! Locating texture files that live next to a model

use std::path::{Path, PathBuf};

/// Subdirectories searched relative to the model's directory, in order
pub const SEARCH_DIRS: [&str; 4] = ["", "texture", "textures", "../texture"];

/// Extensions tried in order; each is tried in lower then upper case
pub const SEARCH_EXTENSIONS: [&str; 6] = ["tm2", "gim", "png", "dds", "jpg", "jpeg"];

/// How a located file becomes a loadable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFileKind {
    /// Usable as-is
    Image,
    /// Needs the external converter
    Proprietary,
}

impl TextureFileKind {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("tm2" | "gim") => Self::Proprietary,
            _ => Self::Image,
        }
    }
}

/// Every path tried for `texture_name`, in search order
///
/// Any extension on the name is replaced. The preferred extension is
/// searched in all directories before falling back to the next one.
pub fn candidate_paths(model_dir: &Path, texture_name: &str) -> Vec<PathBuf> {
    let stem = Path::new(texture_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(texture_name);

    let mut candidates = Vec::with_capacity(SEARCH_EXTENSIONS.len() * 2 * SEARCH_DIRS.len());
    for extension in SEARCH_EXTENSIONS {
        for extension in [extension.to_string(), extension.to_ascii_uppercase()] {
            for dir in SEARCH_DIRS {
                candidates.push(model_dir.join(dir).join(format!("{stem}.{extension}")));
            }
        }
    }
    candidates
}

/// First existing file for `texture_name` near `model_dir`
pub fn find_texture_file(model_dir: &Path, texture_name: &str) -> Option<PathBuf> {
    let found = candidate_paths(model_dir, texture_name)
        .into_iter()
        .find(|p| p.is_file());
    match &found {
        Some(path) => log::debug!("Found texture '{}' at {}", texture_name, path.display()),
        None => log::debug!(
            "Texture '{}' not found near {}",
            texture_name,
            model_dir.display()
        ),
    }
    found
}
