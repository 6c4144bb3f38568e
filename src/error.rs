//! Error types for peheader.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, PeFormatError>;

/// Structural checks that can fail while reading PE headers.
///
/// Every variant names the byte offset (relative to the start of the input
/// buffer) at which the failing structure was expected.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PeFormatError {
    #[error("buffer too small for a DOS header: expected 64 bytes, got {actual}")]
    BufferTooSmall { actual: usize },

    #[error("invalid DOS signature 0x{found:04X} at offset 0x0")]
    NotAnExecutable { found: u16 },

    #[error("e_lfanew 0x{e_lfanew:X} points outside the buffer (length 0x{len:X})")]
    MalformedDosHeader { e_lfanew: u32, len: usize },

    #[error("missing PE signature at offset 0x{offset:X}")]
    MissingNtHeader { offset: usize },

    #[error("file header truncated at offset 0x{offset:X}")]
    TruncatedFileHeader { offset: usize },

    #[error("unsupported optional header magic 0x{magic:X} at offset 0x{offset:X}")]
    UnsupportedOptionalHeaderMagic { magic: u16, offset: usize },

    #[error(
        "optional header at offset 0x{offset:X} truncated: declared {declared} bytes, need {required}"
    )]
    TruncatedOptionalHeader {
        offset: usize,
        declared: u16,
        required: usize,
    },

    #[error("section table at offset 0x{offset:X} ({count} entries) runs past end of buffer (length 0x{len:X})")]
    TruncatedSectionTable {
        offset: usize,
        count: u16,
        len: usize,
    },

    #[error("raw data of section {index} (0x{offset:X}..0x{end:X}) exceeds buffer length 0x{len:X}")]
    SectionOutOfBounds {
        index: usize,
        offset: u32,
        end: u64,
        len: usize,
    },

    #[error("RVA 0x{rva:X} is not backed by any section")]
    UnmappedRva { rva: u32 },

    #[error("CLR header truncated at offset 0x{offset:X}")]
    TruncatedClrHeader { offset: usize },
}
