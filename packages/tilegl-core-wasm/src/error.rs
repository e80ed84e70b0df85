// Error types shared by the tile decoder and the bucket builders
use thiserror::Error;

/// Failures while reading the protobuf-encoded tile or a feature's geometry.
///
/// A decode error is fatal for the tile or feature being read. Sibling
/// features decoded from the same bytes are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of buffer at byte {0}")]
    Truncated(usize),
    #[error("malformed varint at byte {0}")]
    MalformedVarint(usize),
    #[error("unknown wire type {wire_type} at byte {pos}")]
    UnknownWireType { wire_type: u64, pos: usize },
    #[error("unknown command {0}")]
    UnknownCommand(u32),
    #[error("ClosePath before any point in ring")]
    ClosePathWithoutRing,
    #[error("LineTo before MoveTo")]
    LineToWithoutRing,
    #[error("property tag key without a value at byte {0}")]
    UnpairedTag(usize),
    #[error("feature has no geometry")]
    MissingGeometry,
    #[error("invalid utf-8 in string field at byte {0}")]
    InvalidString(usize),
    #[error("failed to decompress tile: {0}")]
    Decompress(String),
}

/// Failures while constructing a bucket or writing into its buffers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BucketError {
    #[error("unsupported layer type '{0}'")]
    UnsupportedLayerType(String),
    /// A caller broke the schema contract: an element push on a shader without
    /// that element buffer, or a vertex push without room reserved for it.
    #[error("schema violation: {0}")]
    SchemaViolation(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A style filter expression that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid filter: {0}")]
pub struct FilterError(pub String);
