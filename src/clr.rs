//! CLR (COR20) header of managed images.
//!
//! The header is reached through data directory 14. Locating it is a separate
//! step from [`crate::read`]; the reader itself never follows directories.

use bitflags::bitflags;
use scroll::{ctx, Endian, Pread, LE};
use serde::Serialize;

use crate::error::{PeFormatError, Result};
use crate::image::PeImage;
use crate::pe::{DataDirectory, DirectoryEntry};

bitflags! {
    /// `COMIMAGE_FLAGS_*`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
    pub struct ClrFlags: u32 {
        const IL_ONLY = 0x0000_0001;
        const REQUIRED_32BIT = 0x0000_0002;
        const IL_LIBRARY = 0x0000_0004;
        const STRONG_NAME_SIGNED = 0x0000_0008;
        const NATIVE_ENTRYPOINT = 0x0000_0010;
        const TRACK_DEBUG_DATA = 0x0001_0000;
        const PREFERRED_32BIT = 0x0002_0000;
    }
}

/// Interpretation of the CLR header entry point field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ClrEntryPoint {
    /// Metadata token of the managed entry method.
    Token(u32),
    /// RVA of a native entry point.
    Rva(u32),
}

/// CLR runtime header (72 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ClrHeader {
    pub cb: u32,
    pub major_runtime_version: u16,
    pub minor_runtime_version: u16,
    pub metadata: DataDirectory,
    pub flags: ClrFlags,
    /// `EntryPointToken` / `EntryPointRVA`.
    pub entry_point: u32,
    pub resources: DataDirectory,
    pub strong_name_signature: DataDirectory,
    pub code_manager_table: DataDirectory,
    pub vtable_fixups: DataDirectory,
    pub export_address_table_jumps: DataDirectory,
    pub managed_native_header: DataDirectory,
}

impl ClrHeader {
    pub const SIZE: usize = 72;

    /// The entry point, viewed through the `NATIVE_ENTRYPOINT` flag.
    pub fn entry_point(&self) -> ClrEntryPoint {
        if self.flags.contains(ClrFlags::NATIVE_ENTRYPOINT) {
            ClrEntryPoint::Rva(self.entry_point)
        } else {
            ClrEntryPoint::Token(self.entry_point)
        }
    }
}

impl<'a> ctx::TryFromCtx<'a, Endian> for ClrHeader {
    type Error = scroll::Error;

    fn try_from_ctx(src: &'a [u8], le: Endian) -> std::result::Result<(Self, usize), Self::Error> {
        let offset = &mut 0;
        let header = Self {
            cb: src.gread_with(offset, le)?,
            major_runtime_version: src.gread_with(offset, le)?,
            minor_runtime_version: src.gread_with(offset, le)?,
            metadata: src.gread_with(offset, le)?,
            flags: ClrFlags::from_bits_retain(src.gread_with(offset, le)?),
            entry_point: src.gread_with(offset, le)?,
            resources: src.gread_with(offset, le)?,
            strong_name_signature: src.gread_with(offset, le)?,
            code_manager_table: src.gread_with(offset, le)?,
            vtable_fixups: src.gread_with(offset, le)?,
            export_address_table_jumps: src.gread_with(offset, le)?,
            managed_native_header: src.gread_with(offset, le)?,
        };
        Ok((header, *offset))
    }
}

impl PeImage {
    /// Locate and decode the CLR header.
    ///
    /// `buffer` must be the same bytes the image was read from. Returns
    /// `Ok(None)` for native images.
    pub fn clr_header(&self, buffer: &[u8]) -> Result<Option<ClrHeader>> {
        let Some(dir) = self.data_directory(DirectoryEntry::ClrRuntime) else {
            return Ok(None);
        };
        let rva = dir.virtual_address;
        let offset = self
            .rva_to_offset(rva)
            .ok_or(PeFormatError::UnmappedRva { rva })? as usize;

        buffer
            .pread_with::<ClrHeader>(offset, LE)
            .map(Some)
            .map_err(|_| PeFormatError::TruncatedClrHeader { offset })
    }
}
