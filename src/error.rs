/// Error type for all region, chunk and editor operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("{what} = {value} is outside the valid range [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("chunk ({chunk_x}, {chunk_z}) has not been generated in region ({region_x}, {region_z})")]
    ChunkNotFound {
        region_x: i32,
        region_z: i32,
        chunk_x: i32,
        chunk_z: i32,
    },
    #[error("unsupported chunk compression scheme {0} (only zlib, id 2, is supported)")]
    UnsupportedCompression(u8),
    #[error("malformed region or chunk data: {0}")]
    InvalidFormat(String),
    #[error("a section at Y={0} already exists in this chunk")]
    SectionExists(i32),
    #[error("NBT error: {0}")]
    Nbt(#[from] quartz_nbt::NbtReprError),
    #[error("NBT I/O error: {0}")]
    NbtIo(#[from] quartz_nbt::io::NbtIoError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorldError>;

impl WorldError {
    pub(crate) fn invalid_format(reason: impl Into<String>) -> Self {
        WorldError::InvalidFormat(reason.into())
    }

    /// True for the "chunk was never generated" condition, which callers
    /// scanning large areas usually treat as empty space rather than a
    /// hard failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorldError::ChunkNotFound { .. })
    }
}
