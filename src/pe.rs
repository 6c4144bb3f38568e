//! PE format layouts and constants.
//!
//! This module defines the on-disk shapes of the DOS header, COFF file header,
//! both optional header variants and the section header, together with the
//! machine/subsystem enums and characteristics flags. Each layout implements
//! `scroll`'s `TryFromCtx` so it can be read with `pread_with(offset, LE)`;
//! validation of how the pieces fit together lives in [`crate::reader`].

use std::borrow::Cow;

use bitflags::bitflags;
use scroll::{ctx, Endian, Pread, SizeWith};
use serde::{Serialize, Serializer};

// PE format constants
pub const DOS_MAGIC: u16 = 0x5A4D; // "MZ"
pub const PE_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32_PLUS_MAGIC: u16 = 0x20B;

pub const NUMBER_OF_DIRECTORY_ENTRIES: usize = 16;
pub const SIZEOF_SHORT_NAME: usize = 8;

/// Offset of `e_lfanew` within the DOS header.
pub const E_LFANEW_OFFSET: usize = 0x3C;

fn gread_words<const N: usize>(
    src: &[u8],
    offset: &mut usize,
    le: Endian,
) -> Result<[u16; N], scroll::Error> {
    let mut words = [0u16; N];
    for w in words.iter_mut() {
        *w = src.gread_with(offset, le)?;
    }
    Ok(words)
}

/// DOS header (64 bytes).
///
/// Only `e_magic` and `e_lfanew` carry meaning for PE images; the remaining
/// fields are kept verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DosHeader {
    pub e_magic: u16,      // Magic number ("MZ")
    pub e_cblp: u16,       // Bytes on last page of file
    pub e_cp: u16,         // Pages in file
    pub e_crlc: u16,       // Relocations
    pub e_cparhdr: u16,    // Size of header in paragraphs
    pub e_minalloc: u16,   // Minimum extra paragraphs needed
    pub e_maxalloc: u16,   // Maximum extra paragraphs needed
    pub e_ss: u16,         // Initial SS value
    pub e_sp: u16,         // Initial SP value
    pub e_csum: u16,       // Checksum
    pub e_ip: u16,         // Initial IP value
    pub e_cs: u16,         // Initial CS value
    pub e_lfarlc: u16,     // File address of relocation table
    pub e_ovno: u16,       // Overlay number
    pub e_res: [u16; 4],   // Reserved words
    pub e_oemid: u16,      // OEM identifier
    pub e_oeminfo: u16,    // OEM information
    pub e_res2: [u16; 10], // Reserved words
    pub e_lfanew: u32,     // File address of new exe header (PE offset)
}

impl DosHeader {
    pub const SIZE: usize = 64;
}

impl<'a> ctx::TryFromCtx<'a, Endian> for DosHeader {
    type Error = scroll::Error;

    /// Decode the 64-byte DOS header. Does not check the signature.
    fn try_from_ctx(src: &'a [u8], le: Endian) -> Result<(Self, usize), Self::Error> {
        let offset = &mut 0;
        let header = Self {
            e_magic: src.gread_with(offset, le)?,
            e_cblp: src.gread_with(offset, le)?,
            e_cp: src.gread_with(offset, le)?,
            e_crlc: src.gread_with(offset, le)?,
            e_cparhdr: src.gread_with(offset, le)?,
            e_minalloc: src.gread_with(offset, le)?,
            e_maxalloc: src.gread_with(offset, le)?,
            e_ss: src.gread_with(offset, le)?,
            e_sp: src.gread_with(offset, le)?,
            e_csum: src.gread_with(offset, le)?,
            e_ip: src.gread_with(offset, le)?,
            e_cs: src.gread_with(offset, le)?,
            e_lfarlc: src.gread_with(offset, le)?,
            e_ovno: src.gread_with(offset, le)?,
            e_res: gread_words(src, offset, le)?,
            e_oemid: src.gread_with(offset, le)?,
            e_oeminfo: src.gread_with(offset, le)?,
            e_res2: gread_words(src, offset, le)?,
            e_lfanew: src.pread_with(E_LFANEW_OFFSET, le)?,
        };
        Ok((header, Self::SIZE))
    }
}

/// Target machine of an image (`IMAGE_FILE_MACHINE_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Machine {
    Unknown,
    I386,
    R4000,
    Alpha,
    Sh3,
    Sh4,
    Arm,
    Thumb,
    ArmNt,
    PowerPc,
    Ia64,
    Alpha64,
    Ebc,
    Amd64,
    Arm64,
    RiscV64,
    LoongArch64,
    Other(u16),
}

impl Machine {
    /// The raw on-disk value.
    pub fn raw(self) -> u16 {
        match self {
            Self::Unknown => 0x0000,
            Self::I386 => 0x014C,
            Self::R4000 => 0x0166,
            Self::Alpha => 0x0184,
            Self::Sh3 => 0x01A2,
            Self::Sh4 => 0x01A6,
            Self::Arm => 0x01C0,
            Self::Thumb => 0x01C2,
            Self::ArmNt => 0x01C4,
            Self::PowerPc => 0x01F0,
            Self::Ia64 => 0x0200,
            Self::Alpha64 => 0x0284,
            Self::Ebc => 0x0EBC,
            Self::Amd64 => 0x8664,
            Self::Arm64 => 0xAA64,
            Self::RiscV64 => 0x5064,
            Self::LoongArch64 => 0x6264,
            Self::Other(v) => v,
        }
    }
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => Self::Unknown,
            0x014C => Self::I386,
            0x0166 => Self::R4000,
            0x0184 => Self::Alpha,
            0x01A2 => Self::Sh3,
            0x01A6 => Self::Sh4,
            0x01C0 => Self::Arm,
            0x01C2 => Self::Thumb,
            0x01C4 => Self::ArmNt,
            0x01F0 => Self::PowerPc,
            0x0200 => Self::Ia64,
            0x0284 => Self::Alpha64,
            0x0EBC => Self::Ebc,
            0x8664 => Self::Amd64,
            0xAA64 => Self::Arm64,
            0x5064 => Self::RiscV64,
            0x6264 => Self::LoongArch64,
            v => Self::Other(v),
        }
    }
}

bitflags! {
    /// COFF file header characteristics (`IMAGE_FILE_*`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
    pub struct FileCharacteristics: u16 {
        const RELOCS_STRIPPED = 0x0001;
        const EXECUTABLE_IMAGE = 0x0002;
        const LINE_NUMS_STRIPPED = 0x0004;
        const LOCAL_SYMS_STRIPPED = 0x0008;
        const AGGRESSIVE_WS_TRIM = 0x0010;
        const LARGE_ADDRESS_AWARE = 0x0020;
        const BYTES_REVERSED_LO = 0x0080;
        const MACHINE_32BIT = 0x0100;
        const DEBUG_STRIPPED = 0x0200;
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        const NET_RUN_FROM_SWAP = 0x0800;
        const SYSTEM = 0x1000;
        const DLL = 0x2000;
        const UP_SYSTEM_ONLY = 0x4000;
        const BYTES_REVERSED_HI = 0x8000;
    }
}

/// COFF file header (20 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub machine: Machine,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: FileCharacteristics,
}

impl FileHeader {
    pub const SIZE: usize = 20;
}

impl<'a> ctx::TryFromCtx<'a, Endian> for FileHeader {
    type Error = scroll::Error;

    fn try_from_ctx(src: &'a [u8], le: Endian) -> Result<(Self, usize), Self::Error> {
        let offset = &mut 0;
        let header = Self {
            machine: Machine::from(src.gread_with::<u16>(offset, le)?),
            number_of_sections: src.gread_with(offset, le)?,
            time_date_stamp: src.gread_with(offset, le)?,
            pointer_to_symbol_table: src.gread_with(offset, le)?,
            number_of_symbols: src.gread_with(offset, le)?,
            size_of_optional_header: src.gread_with(offset, le)?,
            characteristics: FileCharacteristics::from_bits_retain(src.gread_with(offset, le)?),
        };
        Ok((header, *offset))
    }
}

/// Data directory entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pread, SizeWith, Serialize)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    pub const SIZE: usize = 8;

    /// Both address and size are zero.
    pub fn is_empty(&self) -> bool {
        self.virtual_address == 0 && self.size == 0
    }
}

fn gread_directories(
    src: &[u8],
    offset: &mut usize,
    le: Endian,
) -> Result<[DataDirectory; NUMBER_OF_DIRECTORY_ENTRIES], scroll::Error> {
    let mut dirs = [DataDirectory::default(); NUMBER_OF_DIRECTORY_ENTRIES];
    for d in dirs.iter_mut() {
        *d = src.gread_with(offset, le)?;
    }
    Ok(dirs)
}

/// Well-known positions in the data directory table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(usize)]
pub enum DirectoryEntry {
    Export = 0,
    Import = 1,
    Resource = 2,
    Exception = 3,
    Security = 4,
    BaseReloc = 5,
    Debug = 6,
    Architecture = 7,
    GlobalPtr = 8,
    Tls = 9,
    LoadConfig = 10,
    BoundImport = 11,
    Iat = 12,
    DelayImport = 13,
    ClrRuntime = 14,
    Reserved = 15,
}

impl DirectoryEntry {
    pub const ALL: [DirectoryEntry; NUMBER_OF_DIRECTORY_ENTRIES] = [
        Self::Export,
        Self::Import,
        Self::Resource,
        Self::Exception,
        Self::Security,
        Self::BaseReloc,
        Self::Debug,
        Self::Architecture,
        Self::GlobalPtr,
        Self::Tls,
        Self::LoadConfig,
        Self::BoundImport,
        Self::Iat,
        Self::DelayImport,
        Self::ClrRuntime,
        Self::Reserved,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Export => "Export",
            Self::Import => "Import",
            Self::Resource => "Resource",
            Self::Exception => "Exception",
            Self::Security => "Security",
            Self::BaseReloc => "Base relocation",
            Self::Debug => "Debug",
            Self::Architecture => "Architecture",
            Self::GlobalPtr => "Global pointer",
            Self::Tls => "TLS",
            Self::LoadConfig => "Load config",
            Self::BoundImport => "Bound import",
            Self::Iat => "IAT",
            Self::DelayImport => "Delay import",
            Self::ClrRuntime => "CLR runtime",
            Self::Reserved => "Reserved",
        }
    }
}

/// Windows subsystem required to run the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Subsystem {
    Unknown,
    Native,
    WindowsGui,
    WindowsCui,
    Os2Cui,
    PosixCui,
    NativeWindows,
    WindowsCeGui,
    EfiApplication,
    EfiBootServiceDriver,
    EfiRuntimeDriver,
    EfiRom,
    Xbox,
    WindowsBootApplication,
    Other(u16),
}

impl From<u16> for Subsystem {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::Native,
            2 => Self::WindowsGui,
            3 => Self::WindowsCui,
            5 => Self::Os2Cui,
            7 => Self::PosixCui,
            8 => Self::NativeWindows,
            9 => Self::WindowsCeGui,
            10 => Self::EfiApplication,
            11 => Self::EfiBootServiceDriver,
            12 => Self::EfiRuntimeDriver,
            13 => Self::EfiRom,
            14 => Self::Xbox,
            16 => Self::WindowsBootApplication,
            v => Self::Other(v),
        }
    }
}

bitflags! {
    /// Optional header DLL characteristics (`IMAGE_DLLCHARACTERISTICS_*`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
    pub struct DllCharacteristics: u16 {
        const HIGH_ENTROPY_VA = 0x0020;
        const DYNAMIC_BASE = 0x0040;
        const FORCE_INTEGRITY = 0x0080;
        const NX_COMPAT = 0x0100;
        const NO_ISOLATION = 0x0200;
        const NO_SEH = 0x0400;
        const NO_BIND = 0x0800;
        const APPCONTAINER = 0x1000;
        const WDM_DRIVER = 0x2000;
        const GUARD_CF = 0x4000;
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

/// Optional header (PE32, 32-bit).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OptionalHeader32 {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub base_of_data: u32,
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: DllCharacteristics,
    pub size_of_stack_reserve: u32,
    pub size_of_stack_commit: u32,
    pub size_of_heap_reserve: u32,
    pub size_of_heap_commit: u32,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
    pub data_directories: [DataDirectory; NUMBER_OF_DIRECTORY_ENTRIES],
}

impl OptionalHeader32 {
    /// Size of the fields preceding the data directory table.
    pub const FIXED_SIZE: usize = 96;
    /// Fixed fields plus all 16 data directories.
    pub const SIZE: usize = Self::FIXED_SIZE + NUMBER_OF_DIRECTORY_ENTRIES * DataDirectory::SIZE;
}

impl<'a> ctx::TryFromCtx<'a, Endian> for OptionalHeader32 {
    type Error = scroll::Error;

    fn try_from_ctx(src: &'a [u8], le: Endian) -> Result<(Self, usize), Self::Error> {
        let offset = &mut 0;
        let header = Self {
            magic: src.gread_with(offset, le)?,
            major_linker_version: src.gread_with(offset, le)?,
            minor_linker_version: src.gread_with(offset, le)?,
            size_of_code: src.gread_with(offset, le)?,
            size_of_initialized_data: src.gread_with(offset, le)?,
            size_of_uninitialized_data: src.gread_with(offset, le)?,
            address_of_entry_point: src.gread_with(offset, le)?,
            base_of_code: src.gread_with(offset, le)?,
            base_of_data: src.gread_with(offset, le)?,
            image_base: src.gread_with(offset, le)?,
            section_alignment: src.gread_with(offset, le)?,
            file_alignment: src.gread_with(offset, le)?,
            major_operating_system_version: src.gread_with(offset, le)?,
            minor_operating_system_version: src.gread_with(offset, le)?,
            major_image_version: src.gread_with(offset, le)?,
            minor_image_version: src.gread_with(offset, le)?,
            major_subsystem_version: src.gread_with(offset, le)?,
            minor_subsystem_version: src.gread_with(offset, le)?,
            win32_version_value: src.gread_with(offset, le)?,
            size_of_image: src.gread_with(offset, le)?,
            size_of_headers: src.gread_with(offset, le)?,
            check_sum: src.gread_with(offset, le)?,
            subsystem: src.gread_with(offset, le)?,
            dll_characteristics: DllCharacteristics::from_bits_retain(src.gread_with(offset, le)?),
            size_of_stack_reserve: src.gread_with(offset, le)?,
            size_of_stack_commit: src.gread_with(offset, le)?,
            size_of_heap_reserve: src.gread_with(offset, le)?,
            size_of_heap_commit: src.gread_with(offset, le)?,
            loader_flags: src.gread_with(offset, le)?,
            number_of_rva_and_sizes: src.gread_with(offset, le)?,
            data_directories: gread_directories(src, offset, le)?,
        };
        Ok((header, *offset))
    }
}

/// Optional header (PE32+, 64-bit).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OptionalHeader64 {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: DllCharacteristics,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
    pub data_directories: [DataDirectory; NUMBER_OF_DIRECTORY_ENTRIES],
}

impl OptionalHeader64 {
    /// Size of the fields preceding the data directory table.
    pub const FIXED_SIZE: usize = 112;
    /// Fixed fields plus all 16 data directories.
    pub const SIZE: usize = Self::FIXED_SIZE + NUMBER_OF_DIRECTORY_ENTRIES * DataDirectory::SIZE;
}

impl<'a> ctx::TryFromCtx<'a, Endian> for OptionalHeader64 {
    type Error = scroll::Error;

    fn try_from_ctx(src: &'a [u8], le: Endian) -> Result<(Self, usize), Self::Error> {
        let offset = &mut 0;
        let header = Self {
            magic: src.gread_with(offset, le)?,
            major_linker_version: src.gread_with(offset, le)?,
            minor_linker_version: src.gread_with(offset, le)?,
            size_of_code: src.gread_with(offset, le)?,
            size_of_initialized_data: src.gread_with(offset, le)?,
            size_of_uninitialized_data: src.gread_with(offset, le)?,
            address_of_entry_point: src.gread_with(offset, le)?,
            base_of_code: src.gread_with(offset, le)?,
            image_base: src.gread_with(offset, le)?,
            section_alignment: src.gread_with(offset, le)?,
            file_alignment: src.gread_with(offset, le)?,
            major_operating_system_version: src.gread_with(offset, le)?,
            minor_operating_system_version: src.gread_with(offset, le)?,
            major_image_version: src.gread_with(offset, le)?,
            minor_image_version: src.gread_with(offset, le)?,
            major_subsystem_version: src.gread_with(offset, le)?,
            minor_subsystem_version: src.gread_with(offset, le)?,
            win32_version_value: src.gread_with(offset, le)?,
            size_of_image: src.gread_with(offset, le)?,
            size_of_headers: src.gread_with(offset, le)?,
            check_sum: src.gread_with(offset, le)?,
            subsystem: src.gread_with(offset, le)?,
            dll_characteristics: DllCharacteristics::from_bits_retain(src.gread_with(offset, le)?),
            size_of_stack_reserve: src.gread_with(offset, le)?,
            size_of_stack_commit: src.gread_with(offset, le)?,
            size_of_heap_reserve: src.gread_with(offset, le)?,
            size_of_heap_commit: src.gread_with(offset, le)?,
            loader_flags: src.gread_with(offset, le)?,
            number_of_rva_and_sizes: src.gread_with(offset, le)?,
            data_directories: gread_directories(src, offset, le)?,
        };
        Ok((header, *offset))
    }
}

/// Optional header, selected by its magic value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "format")]
pub enum OptionalHeader {
    /// `0x10b`: 32-bit layout.
    Pe32(OptionalHeader32),
    /// `0x20b`: 64-bit layout.
    Pe32Plus(OptionalHeader64),
}

impl OptionalHeader {
    /// Minimum declared size for the layout selected by `magic`, or `None`
    /// for an unrecognised magic.
    pub fn required_size(magic: u16) -> Option<usize> {
        match magic {
            PE32_MAGIC => Some(OptionalHeader32::SIZE),
            PE32_PLUS_MAGIC => Some(OptionalHeader64::SIZE),
            _ => None,
        }
    }

    pub fn magic(&self) -> u16 {
        match self {
            Self::Pe32(h) => h.magic,
            Self::Pe32Plus(h) => h.magic,
        }
    }

    pub fn address_of_entry_point(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.address_of_entry_point,
            Self::Pe32Plus(h) => h.address_of_entry_point,
        }
    }

    pub fn image_base(&self) -> u64 {
        match self {
            Self::Pe32(h) => h.image_base as u64,
            Self::Pe32Plus(h) => h.image_base,
        }
    }

    pub fn section_alignment(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.section_alignment,
            Self::Pe32Plus(h) => h.section_alignment,
        }
    }

    pub fn file_alignment(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.file_alignment,
            Self::Pe32Plus(h) => h.file_alignment,
        }
    }

    pub fn size_of_image(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.size_of_image,
            Self::Pe32Plus(h) => h.size_of_image,
        }
    }

    pub fn size_of_headers(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.size_of_headers,
            Self::Pe32Plus(h) => h.size_of_headers,
        }
    }

    pub fn subsystem(&self) -> Subsystem {
        match self {
            Self::Pe32(h) => Subsystem::from(h.subsystem),
            Self::Pe32Plus(h) => Subsystem::from(h.subsystem),
        }
    }

    pub fn dll_characteristics(&self) -> DllCharacteristics {
        match self {
            Self::Pe32(h) => h.dll_characteristics,
            Self::Pe32Plus(h) => h.dll_characteristics,
        }
    }

    pub fn size_of_stack_reserve(&self) -> u64 {
        match self {
            Self::Pe32(h) => h.size_of_stack_reserve as u64,
            Self::Pe32Plus(h) => h.size_of_stack_reserve,
        }
    }

    pub fn size_of_heap_reserve(&self) -> u64 {
        match self {
            Self::Pe32(h) => h.size_of_heap_reserve as u64,
            Self::Pe32Plus(h) => h.size_of_heap_reserve,
        }
    }

    pub fn number_of_rva_and_sizes(&self) -> u32 {
        match self {
            Self::Pe32(h) => h.number_of_rva_and_sizes,
            Self::Pe32Plus(h) => h.number_of_rva_and_sizes,
        }
    }

    /// All 16 directory slots, including ones past `NumberOfRvaAndSizes`.
    pub fn data_directories(&self) -> &[DataDirectory; NUMBER_OF_DIRECTORY_ENTRIES] {
        match self {
            Self::Pe32(h) => &h.data_directories,
            Self::Pe32Plus(h) => &h.data_directories,
        }
    }
}

bitflags! {
    /// Section characteristics (`IMAGE_SCN_*`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
    pub struct SectionCharacteristics: u32 {
        const TYPE_NO_PAD = 0x0000_0008;
        const CNT_CODE = 0x0000_0020;
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        const LNK_OTHER = 0x0000_0100;
        const LNK_INFO = 0x0000_0200;
        const LNK_REMOVE = 0x0000_0800;
        const LNK_COMDAT = 0x0000_1000;
        const GPREL = 0x0000_8000;
        const LNK_NRELOC_OVFL = 0x0100_0000;
        const MEM_DISCARDABLE = 0x0200_0000;
        const MEM_NOT_CACHED = 0x0400_0000;
        const MEM_NOT_PAGED = 0x0800_0000;
        const MEM_SHARED = 0x1000_0000;
        const MEM_EXECUTE = 0x2000_0000;
        const MEM_READ = 0x4000_0000;
        const MEM_WRITE = 0x8000_0000;
    }
}

/// Interpretation of the section header `Misc` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionMisc {
    /// In images: size of the section once loaded.
    VirtualSize(u32),
    /// In object files: physical address.
    PhysicalAddress(u32),
}

/// Section header (40 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SectionHeader {
    #[serde(serialize_with = "serialize_name")]
    pub name: [u8; SIZEOF_SHORT_NAME],
    /// `Misc.VirtualSize` / `Misc.PhysicalAddress`.
    pub misc: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_linenumbers: u32,
    pub number_of_relocations: u16,
    pub number_of_linenumbers: u16,
    pub characteristics: SectionCharacteristics,
}

impl SectionHeader {
    pub const SIZE: usize = 40;
    /// Name bytes up to the first NUL (all 8 if there is none).
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(SIZEOF_SHORT_NAME);
        &self.name[..end]
    }

    /// Section name, lossily decoded.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    #[inline]
    pub fn virtual_size(&self) -> u32 {
        self.misc
    }

    #[inline]
    pub fn physical_address(&self) -> u32 {
        self.misc
    }

    /// View `Misc` according to whether the file is an executable image.
    pub fn misc_view(&self, is_image: bool) -> SectionMisc {
        if is_image {
            SectionMisc::VirtualSize(self.misc)
        } else {
            SectionMisc::PhysicalAddress(self.misc)
        }
    }

    /// Extent of the section in memory. Falls back to the raw size when the
    /// linker left `VirtualSize` at zero.
    pub fn virtual_extent(&self) -> u32 {
        if self.misc == 0 {
            self.size_of_raw_data
        } else {
            self.misc
        }
    }

    /// File range `[start, end)` of the raw data, widened so the sum cannot
    /// overflow. `None` for sections without raw data.
    pub fn raw_range(&self) -> Option<(u64, u64)> {
        if self.size_of_raw_data == 0 {
            return None;
        }
        let start = self.pointer_to_raw_data as u64;
        Some((start, start + self.size_of_raw_data as u64))
    }
}

impl<'a> ctx::TryFromCtx<'a, Endian> for SectionHeader {
    type Error = scroll::Error;

    fn try_from_ctx(src: &'a [u8], le: Endian) -> Result<(Self, usize), Self::Error> {
        let offset = &mut 0;
        let raw_name: &[u8] = src.gread_with(offset, SIZEOF_SHORT_NAME)?;
        let mut name = [0u8; SIZEOF_SHORT_NAME];
        name.copy_from_slice(raw_name);
        let header = Self {
            name,
            misc: src.gread_with(offset, le)?,
            virtual_address: src.gread_with(offset, le)?,
            size_of_raw_data: src.gread_with(offset, le)?,
            pointer_to_raw_data: src.gread_with(offset, le)?,
            pointer_to_relocations: src.gread_with(offset, le)?,
            pointer_to_linenumbers: src.gread_with(offset, le)?,
            number_of_relocations: src.gread_with(offset, le)?,
            number_of_linenumbers: src.gread_with(offset, le)?,
            characteristics: SectionCharacteristics::from_bits_retain(src.gread_with(offset, le)?),
        };
        Ok((header, *offset))
    }
}

fn serialize_name<S: Serializer>(name: &[u8; SIZEOF_SHORT_NAME], s: S) -> Result<S::Ok, S::Error> {
    let end = name.iter().position(|&b| b == 0).unwrap_or(SIZEOF_SHORT_NAME);
    s.serialize_str(&String::from_utf8_lossy(&name[..end]))
}
