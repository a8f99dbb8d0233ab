use std::io;

use crate::object_id::ObjectId;
use crate::wire::Width;

/// Error type shared by every codec in the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("data too large: {len} bytes does not fit a {width} length prefix")]
    DataTooLarge { len: u64, width: Width },
    #[error("blueprint not found: {0}")]
    BlueprintNotFound(String),
    #[error("invalid stamp {0:#010x}")]
    InvalidStamp(u32),
    #[error("empty object type")]
    EmptyType,
    #[error("invalid type code {0}")]
    InvalidTypeCode(u8),
    #[error("type {0} has no index code")]
    UnindexedType(String),
    #[error("truncated frame: {0}")]
    Truncated(String),
    #[error("{0} trailing bytes after object payload")]
    TrailingData(u64),
    #[error("duplicate object {0}")]
    DuplicateObject(ObjectId),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),
    #[error("invalid utf-8 in string: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("invalid text: {0}")]
    InvalidText(String),
}

impl Error {
    /// Returns true if the error was caused by the source running dry.
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }

    pub(crate) fn eof() -> Self {
        Error::Io(io::ErrorKind::UnexpectedEof.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
