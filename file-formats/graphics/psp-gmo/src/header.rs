//! Fixed-layout container header and chunk table entries

use binrw::BinRead;
use std::io::Cursor;

use crate::chunk_id::ChunkKind;
use crate::error::{GmoError, Result};
use crate::version::GmoVersion;

/// Magic at offset 0 of every binary container
pub const GMO_MAGIC: [u8; 12] = *b"OMG.00.1PSP\0";

/// Size of [`ContainerHeader`] on disk
pub const HEADER_SIZE: usize = 24;

/// Size of one [`ChunkTableEntry`] on disk
pub const CHUNK_ENTRY_SIZE: usize = 12;

/// The container header as stored
#[derive(Debug, Clone, Copy, BinRead)]
#[br(little)]
pub struct RawHeader {
    pub magic: [u8; 12],
    pub version: u32,
    pub chunk_count: u32,
    pub chunk_table_offset: u32,
}

/// Validated container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: GmoVersion,
    pub chunk_count: u32,
    pub chunk_table_offset: u32,
}

/// One entry of the top-level chunk table
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct ChunkTableEntry {
    /// Raw type tag
    pub tag: u16,
    /// Reserved, carried through unchanged
    pub flags: u16,
    /// Absolute offset of the chunk body
    pub offset: u32,
    /// Size of the chunk body in bytes
    pub size: u32,
}

impl ChunkTableEntry {
    pub fn kind(&self) -> ChunkKind {
        ChunkKind::from_tag(self.tag)
    }

    /// Absolute byte range, if it fits in a buffer of `len` bytes
    pub fn range_within(&self, len: usize) -> Result<std::ops::Range<usize>> {
        let start = self.offset as usize;
        let size = self.size as usize;
        match start.checked_add(size) {
            Some(end) if end <= len => Ok(start..end),
            _ => Err(GmoError::TruncatedData {
                offset: start,
                needed: size,
                available: len.saturating_sub(start),
            }),
        }
    }
}

fn map_binrw(err: binrw::Error, offset: usize, needed: usize, available: usize) -> GmoError {
    match err {
        binrw::Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            GmoError::TruncatedData {
                offset,
                needed,
                available,
            }
        }
        binrw::Error::Io(e) => GmoError::Io(e),
        other => GmoError::Parse(other.to_string()),
    }
}

/// Decode and validate the header at the start of `data`
pub fn read_header(data: &[u8]) -> Result<ContainerHeader> {
    let raw = RawHeader::read(&mut Cursor::new(data))
        .map_err(|e| map_binrw(e, 0, HEADER_SIZE, data.len()))?;

    if raw.magic != GMO_MAGIC {
        return Err(GmoError::InvalidMagic {
            expected: "OMG.00.1PSP".to_string(),
            actual: String::from_utf8_lossy(&raw.magic)
                .trim_end_matches('\0')
                .to_string(),
        });
    }

    let version = GmoVersion::from_raw(raw.version)?;

    Ok(ContainerHeader {
        version,
        chunk_count: raw.chunk_count,
        chunk_table_offset: raw.chunk_table_offset,
    })
}

/// Read the chunk table described by `header`
///
/// The whole table must fit in `data`; a table that runs past the end
/// cannot be partially trusted.
pub fn read_chunk_table(data: &[u8], header: &ContainerHeader) -> Result<Vec<ChunkTableEntry>> {
    let start = header.chunk_table_offset as usize;
    let count = header.chunk_count as usize;
    let table_len = count
        .checked_mul(CHUNK_ENTRY_SIZE)
        .and_then(|n| n.checked_add(start))
        .filter(|&end| end <= data.len())
        .map(|end| end - start)
        .ok_or(GmoError::TruncatedData {
            offset: start,
            needed: count.saturating_mul(CHUNK_ENTRY_SIZE),
            available: data.len().saturating_sub(start),
        })?;

    let mut cursor = Cursor::new(&data[start..start + table_len]);
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let entry = ChunkTableEntry::read(&mut cursor).map_err(|e| {
            map_binrw(
                e,
                start + i * CHUNK_ENTRY_SIZE,
                CHUNK_ENTRY_SIZE,
                table_len - i * CHUNK_ENTRY_SIZE,
            )
        })?;
        entries.push(entry);
    }
    Ok(entries)
}
