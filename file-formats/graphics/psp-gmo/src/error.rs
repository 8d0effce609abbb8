//! Error types for GMO/GMS decoding and import

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::chunk_id::ChunkKind;
use crate::converter::ConversionError;

/// Structural and parse errors raised while decoding a container
#[derive(Error, Debug)]
pub enum GmoError {
    /// I/O error while reading input
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read would run past the end of the buffer
    #[error("Truncated data at offset {offset:#x}: needed {needed} bytes, {available} available")]
    TruncatedData {
        /// Absolute offset of the failed read
        offset: usize,
        /// Bytes the read required
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// A seek target lies beyond the buffer
    #[error("Invalid offset {offset:#x} (buffer length {len:#x})")]
    InvalidOffset {
        /// Requested offset
        offset: usize,
        /// Buffer length
        len: usize,
    },

    /// Vertex or index stream inconsistent with its declared layout
    #[error("Malformed vertex stream: {0}")]
    MalformedVertexStream(String),

    /// Wrong container magic
    #[error("Invalid magic: expected '{expected}', got '{actual}'")]
    InvalidMagic {
        /// Expected magic
        expected: String,
        /// Magic found in the file
        actual: String,
    },

    /// Container version outside the supported titles
    #[error("Unsupported format version: {0}")]
    UnsupportedFormatVersion(u32),

    /// A bone's ancestor chain loops back on itself
    #[error("Cyclic skeleton: bone {bone} is its own ancestor")]
    CyclicSkeleton {
        /// A bone on the cycle
        bone: usize,
    },

    /// A bone reference points outside the bone table
    #[error("Bone index out of range in {context}: {index} (bone count {count})")]
    BoneIndexOutOfRange {
        /// Where the reference came from
        context: String,
        /// Offending index
        index: usize,
        /// Number of bones
        count: usize,
    },

    /// Fixed-layout structure could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Syntax error in a GMS text file
    #[error("GMS syntax error on line {line}: {message}")]
    Text {
        /// 1-based line number
        line: usize,
        /// Description
        message: String,
    },
}

/// Result type using [`GmoError`]
pub type Result<T> = std::result::Result<T, GmoError>;

/// The single fatal error returned from an import
#[derive(Error, Debug)]
pub enum ImportError {
    /// The input file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Input path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The container header or chunk table is unusable
    #[error("container header: {0}")]
    Header(#[source] GmoError),

    /// A chunk whose failure cannot be recovered from
    #[error("chunk #{index} ({kind}) failed: {source}")]
    ChunkFailed {
        /// Position in the chunk table
        index: usize,
        /// Chunk type
        kind: ChunkKind,
        /// Cause
        #[source]
        source: GmoError,
    },

    /// Skeleton integrity violation found while resolving or binding
    #[error("skeleton: {0}")]
    Skeleton(#[source] GmoError),

    /// A texture failed and unresolved textures are configured as fatal
    #[error("texture '{texture}' unresolved: {reason}")]
    TextureUnresolved {
        /// Texture name
        texture: String,
        /// Converter failure
        reason: ConversionError,
    },

    /// The host cancelled the import
    #[error("import cancelled")]
    Cancelled,
}

impl ImportError {
    /// Whether the failure came from a particular chunk kind
    pub fn chunk_kind(&self) -> Option<ChunkKind> {
        match self {
            ImportError::ChunkFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The underlying structural error, if any
    pub fn gmo_error(&self) -> Option<&GmoError> {
        match self {
            ImportError::Header(e) | ImportError::Skeleton(e) => Some(e),
            ImportError::ChunkFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
