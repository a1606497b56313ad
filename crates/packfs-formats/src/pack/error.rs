//! Pack error types

use std::path::PathBuf;
use thiserror::Error;

/// Pack-specific error type
#[derive(Debug, Error)]
pub enum PackError {
    /// Header signature is not `PACK`
    #[error("invalid pack signature: expected {expected:#010x}, got {actual:#010x}")]
    InvalidSignature {
        /// Expected signature value
        expected: u32,
        /// Signature found in the file
        actual: u32,
    },

    /// Header field is negative or out of range
    #[error("invalid header field {field}: {value}")]
    InvalidHeaderField {
        /// Header field name
        field: &'static str,
        /// Offending value
        value: i64,
    },

    /// Header offsets contradict each other or the file size
    #[error("inconsistent header offsets: {0}")]
    InconsistentOffsets(String),

    /// File ends before a region the header points at
    #[error("pack truncated: need {needed} bytes, file has {actual}")]
    Truncated {
        /// Minimum file size required
        needed: u64,
        /// Actual file size
        actual: u64,
    },

    /// Entry record fails bounds checks
    #[error("invalid entry record {index}: {reason}")]
    InvalidRecord {
        /// Record index in the entry table
        index: usize,
        /// Description of the violation
        reason: String,
    },

    /// Name table byte length is odd
    #[error("name table length {0} is not a whole number of UTF-16 code units")]
    OddNameTable(u64),

    /// Footer checksum does not match the content
    #[error("checksum mismatch: footer says {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the footer
        expected: u32,
        /// Checksum computed over the archive
        actual: u32,
    },

    /// Source file or directory name is not valid UTF-8
    #[error("non UTF-8 name under {0}")]
    InvalidName(PathBuf),

    /// Source entry does not fit the 32-bit size fields
    #[error("{path} too large for a pack entry: {size}")]
    EntryTooLarge {
        /// Offending source path
        path: PathBuf,
        /// Byte size or child count
        size: u64,
    },

    /// Source file changed size between scan and build
    #[error("{path} changed size since it was scanned: expected {expected}, read {actual}")]
    SizeChanged {
        /// Offending source path
        path: PathBuf,
        /// Size recorded by the scanner
        expected: u64,
        /// Size read while building
        actual: u64,
    },

    /// Scan root is neither a file nor a directory
    #[error("scan root {0} is not a regular file or directory")]
    InvalidRoot(PathBuf),

    /// Record index outside the entry table
    #[error("entry index {index} out of range (entry count {count})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of records
        count: usize,
    },

    /// Directory traversal error
    #[error("directory traversal error: {0}")]
    Walk(#[from] walkdir::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl PackError {
    /// Whether this error describes a malformed archive rather than a host failure
    pub fn is_format_error(&self) -> bool {
        match self {
            // A short read means the archive ends early
            Self::Io(e) | Self::BinRw(binrw::Error::Io(e)) => {
                e.kind() == std::io::ErrorKind::UnexpectedEof
            }
            Self::Walk(_) => false,
            _ => true,
        }
    }
}

/// Result type for pack operations
pub type PackResult<T> = Result<T, PackError>;
