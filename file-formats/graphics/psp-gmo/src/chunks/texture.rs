//! TextureRef chunk: embedded or external texture sources

use bytes::Bytes;
use std::path::PathBuf;

use crate::cursor::ByteCursor;
use crate::error::{GmoError, Result};

use super::NAME_SIZE;

/// Size of one texture record
pub const TEXTURE_RECORD_SIZE: usize = 40;

/// Where a texture's pixels come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureSource {
    /// Raw image bytes stored inside the container
    Embedded {
        /// Absolute offset of the data within the container
        offset: usize,
        data: Bytes,
    },
    /// A file next to the model, looked up by name
    External { file_name: String },
    /// An external file that has already been located
    File(PathBuf),
}

impl TextureSource {
    /// Short human-readable description for logs and listings
    pub fn describe(&self) -> String {
        match self {
            Self::Embedded { offset, data } => {
                format!("embedded {} bytes at {offset:#x}", data.len())
            }
            Self::External { file_name } => format!("external '{file_name}'"),
            Self::File(path) => format!("file {}", path.display()),
        }
    }
}

/// One texture as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRecord {
    pub name: String,
    pub source: TextureSource,
}

/// Decode a TextureRef chunk body
///
/// `chunk_offset` is the body's position in the container and is added to
/// the stored chunk-relative data offsets.
pub fn decode_textures(body: &Bytes, chunk_offset: usize) -> Result<Vec<TextureRecord>> {
    let mut cursor = ByteCursor::new(body);
    let count = cursor.read_u32()? as usize;

    let needed = count.saturating_mul(TEXTURE_RECORD_SIZE);
    if needed > cursor.remaining() {
        return Err(GmoError::TruncatedData {
            offset: chunk_offset + cursor.position(),
            needed,
            available: cursor.remaining(),
        });
    }

    let mut textures = Vec::with_capacity(count);
    for _ in 0..count {
        let name = cursor.read_fixed_str(NAME_SIZE)?;
        let offset = cursor.read_u32()? as usize;
        let size = cursor.read_u32()? as usize;

        let source = if size == 0 {
            TextureSource::External {
                file_name: name.clone(),
            }
        } else {
            let end = offset
                .checked_add(size)
                .filter(|&end| end <= body.len())
                .ok_or(GmoError::TruncatedData {
                    offset: chunk_offset + offset,
                    needed: size,
                    available: body.len().saturating_sub(offset),
                })?;
            TextureSource::Embedded {
                offset: chunk_offset + offset,
                data: body.slice(offset..end),
            }
        };

        log::trace!("Texture '{}': {}", name, source.describe());
        textures.push(TextureRecord { name, source });
    }

    log::debug!("TextureRef: {} textures", textures.len());
    Ok(textures)
}
