//! Synthetic PE image construction for tests.
//!
//! Layouts are encoded field by field, little-endian, independently of the
//! crate's parsers.

#![allow(dead_code)]

use peheader::pe::{
    DataDirectory, DllCharacteristics, FileCharacteristics, FileHeader, Machine, OptionalHeader,
    OptionalHeader32, OptionalHeader64, SectionCharacteristics, SectionHeader,
    NUMBER_OF_DIRECTORY_ENTRIES, PE32_MAGIC, PE32_PLUS_MAGIC,
};

fn put16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// 64-byte DOS header with a recognisable legacy prefix.
pub fn encode_dos(e_lfanew: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    put16(&mut buf, 0x5A4D);
    put16(&mut buf, 0x90); // e_cblp
    put16(&mut buf, 0x03); // e_cp
    put16(&mut buf, 0);
    put16(&mut buf, 0x04); // e_cparhdr
    put16(&mut buf, 0);
    put16(&mut buf, 0xFFFF); // e_maxalloc
    put16(&mut buf, 0);
    put16(&mut buf, 0xB8); // e_sp
    buf.resize(0x18, 0);
    put16(&mut buf, 0x40); // e_lfarlc
    buf.resize(0x3C, 0);
    put32(&mut buf, e_lfanew);
    buf
}

pub fn encode_file_header(buf: &mut Vec<u8>, fh: &FileHeader) {
    put16(buf, fh.machine.raw());
    put16(buf, fh.number_of_sections);
    put32(buf, fh.time_date_stamp);
    put32(buf, fh.pointer_to_symbol_table);
    put32(buf, fh.number_of_symbols);
    put16(buf, fh.size_of_optional_header);
    put16(buf, fh.characteristics.bits());
}

fn encode_directories(buf: &mut Vec<u8>, dirs: &[DataDirectory; NUMBER_OF_DIRECTORY_ENTRIES]) {
    for d in dirs {
        put32(buf, d.virtual_address);
        put32(buf, d.size);
    }
}

pub fn encode_optional_header(buf: &mut Vec<u8>, oh: &OptionalHeader) {
    match oh {
        OptionalHeader::Pe32(h) => {
            put16(buf, h.magic);
            buf.push(h.major_linker_version);
            buf.push(h.minor_linker_version);
            put32(buf, h.size_of_code);
            put32(buf, h.size_of_initialized_data);
            put32(buf, h.size_of_uninitialized_data);
            put32(buf, h.address_of_entry_point);
            put32(buf, h.base_of_code);
            put32(buf, h.base_of_data);
            put32(buf, h.image_base);
            put32(buf, h.section_alignment);
            put32(buf, h.file_alignment);
            put16(buf, h.major_operating_system_version);
            put16(buf, h.minor_operating_system_version);
            put16(buf, h.major_image_version);
            put16(buf, h.minor_image_version);
            put16(buf, h.major_subsystem_version);
            put16(buf, h.minor_subsystem_version);
            put32(buf, h.win32_version_value);
            put32(buf, h.size_of_image);
            put32(buf, h.size_of_headers);
            put32(buf, h.check_sum);
            put16(buf, h.subsystem);
            put16(buf, h.dll_characteristics.bits());
            put32(buf, h.size_of_stack_reserve);
            put32(buf, h.size_of_stack_commit);
            put32(buf, h.size_of_heap_reserve);
            put32(buf, h.size_of_heap_commit);
            put32(buf, h.loader_flags);
            put32(buf, h.number_of_rva_and_sizes);
            encode_directories(buf, &h.data_directories);
        }
        OptionalHeader::Pe32Plus(h) => {
            put16(buf, h.magic);
            buf.push(h.major_linker_version);
            buf.push(h.minor_linker_version);
            put32(buf, h.size_of_code);
            put32(buf, h.size_of_initialized_data);
            put32(buf, h.size_of_uninitialized_data);
            put32(buf, h.address_of_entry_point);
            put32(buf, h.base_of_code);
            put64(buf, h.image_base);
            put32(buf, h.section_alignment);
            put32(buf, h.file_alignment);
            put16(buf, h.major_operating_system_version);
            put16(buf, h.minor_operating_system_version);
            put16(buf, h.major_image_version);
            put16(buf, h.minor_image_version);
            put16(buf, h.major_subsystem_version);
            put16(buf, h.minor_subsystem_version);
            put32(buf, h.win32_version_value);
            put32(buf, h.size_of_image);
            put32(buf, h.size_of_headers);
            put32(buf, h.check_sum);
            put16(buf, h.subsystem);
            put16(buf, h.dll_characteristics.bits());
            put64(buf, h.size_of_stack_reserve);
            put64(buf, h.size_of_stack_commit);
            put64(buf, h.size_of_heap_reserve);
            put64(buf, h.size_of_heap_commit);
            put32(buf, h.loader_flags);
            put32(buf, h.number_of_rva_and_sizes);
            encode_directories(buf, &h.data_directories);
        }
    }
}

pub fn encode_section(buf: &mut Vec<u8>, s: &SectionHeader) {
    buf.extend_from_slice(&s.name);
    put32(buf, s.misc);
    put32(buf, s.virtual_address);
    put32(buf, s.size_of_raw_data);
    put32(buf, s.pointer_to_raw_data);
    put32(buf, s.pointer_to_relocations);
    put32(buf, s.pointer_to_linenumbers);
    put16(buf, s.number_of_relocations);
    put16(buf, s.number_of_linenumbers);
    put32(buf, s.characteristics.bits());
}

pub fn section(
    name: &[u8],
    virtual_address: u32,
    virtual_size: u32,
    pointer_to_raw_data: u32,
    size_of_raw_data: u32,
    characteristics: SectionCharacteristics,
) -> SectionHeader {
    let mut raw_name = [0u8; 8];
    raw_name[..name.len()].copy_from_slice(name);
    SectionHeader {
        name: raw_name,
        misc: virtual_size,
        virtual_address,
        size_of_raw_data,
        pointer_to_raw_data,
        pointer_to_relocations: 0,
        pointer_to_linenumbers: 0,
        number_of_relocations: 0,
        number_of_linenumbers: 0,
        characteristics,
    }
}

pub fn code_flags() -> SectionCharacteristics {
    SectionCharacteristics::CNT_CODE
        | SectionCharacteristics::MEM_EXECUTE
        | SectionCharacteristics::MEM_READ
}

pub fn data_flags() -> SectionCharacteristics {
    SectionCharacteristics::CNT_INITIALIZED_DATA
        | SectionCharacteristics::MEM_READ
        | SectionCharacteristics::MEM_WRITE
}

fn sample_directories() -> [DataDirectory; NUMBER_OF_DIRECTORY_ENTRIES] {
    let mut dirs = [DataDirectory::default(); NUMBER_OF_DIRECTORY_ENTRIES];
    dirs[1] = DataDirectory { virtual_address: 0x2100, size: 0x28 };
    dirs[12] = DataDirectory { virtual_address: 0x2000, size: 0x40 };
    dirs
}

pub fn optional_header64() -> OptionalHeader64 {
    OptionalHeader64 {
        magic: PE32_PLUS_MAGIC,
        major_linker_version: 14,
        minor_linker_version: 36,
        size_of_code: 0x200,
        size_of_initialized_data: 0x400,
        size_of_uninitialized_data: 0,
        address_of_entry_point: 0x1010,
        base_of_code: 0x1000,
        image_base: 0x1_4000_0000,
        section_alignment: 0x1000,
        file_alignment: 0x200,
        major_operating_system_version: 6,
        minor_operating_system_version: 0,
        major_image_version: 1,
        minor_image_version: 2,
        major_subsystem_version: 6,
        minor_subsystem_version: 1,
        win32_version_value: 0,
        size_of_image: 0x4000,
        size_of_headers: 0x400,
        check_sum: 0xDEAD,
        subsystem: 3,
        dll_characteristics: DllCharacteristics::NX_COMPAT
            | DllCharacteristics::DYNAMIC_BASE
            | DllCharacteristics::HIGH_ENTROPY_VA,
        size_of_stack_reserve: 0x10_0000,
        size_of_stack_commit: 0x1000,
        size_of_heap_reserve: 0x20_0000,
        size_of_heap_commit: 0x2000,
        loader_flags: 0,
        number_of_rva_and_sizes: 16,
        data_directories: sample_directories(),
    }
}

pub fn optional_header32() -> OptionalHeader32 {
    OptionalHeader32 {
        magic: PE32_MAGIC,
        major_linker_version: 9,
        minor_linker_version: 1,
        size_of_code: 0x200,
        size_of_initialized_data: 0x400,
        size_of_uninitialized_data: 0x10,
        address_of_entry_point: 0x1020,
        base_of_code: 0x1000,
        base_of_data: 0x2000,
        image_base: 0x40_0000,
        section_alignment: 0x1000,
        file_alignment: 0x200,
        major_operating_system_version: 5,
        minor_operating_system_version: 1,
        major_image_version: 0,
        minor_image_version: 0,
        major_subsystem_version: 5,
        minor_subsystem_version: 1,
        win32_version_value: 0,
        size_of_image: 0x4000,
        size_of_headers: 0x400,
        check_sum: 0,
        subsystem: 2,
        dll_characteristics: DllCharacteristics::NX_COMPAT,
        size_of_stack_reserve: 0x10_0000,
        size_of_stack_commit: 0x1000,
        size_of_heap_reserve: 0x10_0000,
        size_of_heap_commit: 0x1000,
        loader_flags: 0,
        number_of_rva_and_sizes: 16,
        data_directories: sample_directories(),
    }
}

/// Assembles a complete image buffer.
#[derive(Clone, Debug)]
pub struct ImageBuilder {
    pub e_lfanew: u32,
    pub file_header: FileHeader,
    pub optional_header: OptionalHeader,
    pub sections: Vec<SectionHeader>,
    /// Minimum total length; the buffer is zero-padded up to it.
    pub len: usize,
}

impl ImageBuilder {
    /// PE32+ image with `.text` and `.data`, raw data at 0x400 and 0x600.
    pub fn pe64() -> Self {
        let sections = vec![
            section(b".text", 0x1000, 0x1F0, 0x400, 0x200, code_flags()),
            section(b".data", 0x2000, 0x180, 0x600, 0x200, data_flags()),
        ];
        Self {
            e_lfanew: 0x80,
            file_header: FileHeader {
                machine: Machine::Amd64,
                number_of_sections: sections.len() as u16,
                time_date_stamp: 0x6512_3456,
                pointer_to_symbol_table: 0,
                number_of_symbols: 0,
                size_of_optional_header: OptionalHeader64::SIZE as u16,
                characteristics: FileCharacteristics::EXECUTABLE_IMAGE
                    | FileCharacteristics::LARGE_ADDRESS_AWARE,
            },
            optional_header: OptionalHeader::Pe32Plus(optional_header64()),
            sections,
            len: 0x800,
        }
    }

    /// PE32 DLL with `.text` and `.rdata`.
    pub fn pe32() -> Self {
        let sections = vec![
            section(b".text", 0x1000, 0x100, 0x400, 0x200, code_flags()),
            section(b".rdata", 0x2000, 0x80, 0x600, 0x200, SectionCharacteristics::MEM_READ),
        ];
        Self {
            e_lfanew: 0x80,
            file_header: FileHeader {
                machine: Machine::I386,
                number_of_sections: sections.len() as u16,
                time_date_stamp: 0x4A00_0000,
                pointer_to_symbol_table: 0x1234,
                number_of_symbols: 7,
                size_of_optional_header: OptionalHeader32::SIZE as u16,
                characteristics: FileCharacteristics::EXECUTABLE_IMAGE
                    | FileCharacteristics::MACHINE_32BIT
                    | FileCharacteristics::DLL,
            },
            optional_header: OptionalHeader::Pe32(optional_header32()),
            sections,
            len: 0x800,
        }
    }

    /// Replace the section list and keep `NumberOfSections` in sync.
    pub fn with_sections(mut self, sections: Vec<SectionHeader>) -> Self {
        self.file_header.number_of_sections = sections.len() as u16;
        self.sections = sections;
        self
    }

    /// Offset of the first section header.
    pub fn section_table_offset(&self) -> usize {
        self.e_lfanew as usize + 4 + FileHeader::SIZE + self.file_header.size_of_optional_header as usize
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = encode_dos(self.e_lfanew);
        buf.resize(self.e_lfanew as usize, 0);
        buf.extend_from_slice(b"PE\0\0");
        encode_file_header(&mut buf, &self.file_header);

        // Pad or cut the optional header to its declared size
        let opt_start = buf.len();
        encode_optional_header(&mut buf, &self.optional_header);
        buf.resize(opt_start + self.file_header.size_of_optional_header as usize, 0);

        for s in &self.sections {
            encode_section(&mut buf, s);
        }
        if buf.len() < self.len {
            buf.resize(self.len, 0);
        }
        buf
    }
}
