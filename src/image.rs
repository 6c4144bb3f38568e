//! The validated header model produced by [`crate::read`].

use serde::Serialize;

use crate::pe::{
    DataDirectory, DirectoryEntry, DosHeader, FileCharacteristics, FileHeader, OptionalHeader,
    SectionHeader, NUMBER_OF_DIRECTORY_ENTRIES, PE32_PLUS_MAGIC,
};

/// Non-fatal finding recorded while reading an image.
///
/// Structural validity is not semantic sanity: these are surfaced to the
/// caller rather than rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Anomaly {
    /// Raw data of a section extends past the end of the buffer.
    SectionOutOfBounds {
        index: usize,
        offset: u32,
        end: u64,
        len: usize,
    },
    /// Raw data of `second` starts inside an earlier range, the one that
    /// reaches furthest into the file (`first < second` by index). Each
    /// section is reported at most once.
    OverlappingSections { first: usize, second: usize },
    /// `NumberOfRvaAndSizes` is larger than the 16-slot table.
    ExcessDirectoryCount { declared: u32 },
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SectionOutOfBounds { index, offset, end, len } => write!(
                f,
                "raw data of section {} (0x{:X}..0x{:X}) exceeds buffer length 0x{:X}",
                index, offset, end, len
            ),
            Self::OverlappingSections { first, second } => {
                write!(f, "raw data of sections {} and {} overlap", first, second)
            }
            Self::ExcessDirectoryCount { declared } => write!(
                f,
                "NumberOfRvaAndSizes is {} (only {} slots exist)",
                declared, NUMBER_OF_DIRECTORY_ENTRIES
            ),
        }
    }
}

/// Parsed PE headers.
///
/// Owns copies of every header; nothing borrows the input buffer. Queries that
/// need section contents take the buffer again as an argument.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PeImage {
    pub dos_header: DosHeader,
    /// Offset of the `PE\0\0` signature (`e_lfanew`).
    pub nt_headers_offset: u32,
    pub file_header: FileHeader,
    pub optional_header: OptionalHeader,
    /// Section headers in file order.
    pub sections: Vec<SectionHeader>,
    pub anomalies: Vec<Anomaly>,
}

impl PeImage {
    /// Is this a 64-bit (PE32+) image?
    pub fn is_pe32_plus(&self) -> bool {
        self.optional_header.magic() == PE32_PLUS_MAGIC
    }

    pub fn is_dll(&self) -> bool {
        self.file_header.characteristics.contains(FileCharacteristics::DLL)
    }

    pub fn is_executable(&self) -> bool {
        self.file_header
            .characteristics
            .contains(FileCharacteristics::EXECUTABLE_IMAGE)
    }

    pub fn entry_point(&self) -> u32 {
        self.optional_header.address_of_entry_point()
    }

    pub fn image_base(&self) -> u64 {
        self.optional_header.image_base()
    }

    /// Whether a directory slot lies below `NumberOfRvaAndSizes`.
    pub fn directory_in_use(&self, index: usize) -> bool {
        index < NUMBER_OF_DIRECTORY_ENTRIES
            && (index as u64) < self.optional_header.number_of_rva_and_sizes() as u64
    }

    /// Look up a data directory. Returns `None` for unused or empty slots.
    pub fn data_directory(&self, entry: DirectoryEntry) -> Option<DataDirectory> {
        let index = entry.index();
        if !self.directory_in_use(index) {
            return None;
        }
        let dir = self.optional_header.data_directories()[index];
        if dir.is_empty() {
            None
        } else {
            Some(dir)
        }
    }

    /// Find a section by its (NUL-trimmed) name.
    pub fn section_by_name(&self, name: &[u8]) -> Option<(usize, &SectionHeader)> {
        self.sections
            .iter()
            .enumerate()
            .find(|(_, s)| s.name_bytes() == name)
    }

    /// First section whose virtual range contains `rva`.
    pub fn section_containing_rva(&self, rva: u32) -> Option<(usize, &SectionHeader)> {
        self.sections.iter().enumerate().find(|(_, s)| {
            let start = s.virtual_address as u64;
            let end = start + s.virtual_extent() as u64;
            (rva as u64) >= start && (rva as u64) < end
        })
    }

    /// Translate an RVA to a file offset.
    ///
    /// Returns `None` if no section contains the RVA or the RVA falls in the
    /// zero-filled tail of a section (past its raw data).
    pub fn rva_to_offset(&self, rva: u32) -> Option<u32> {
        let (_, section) = self.section_containing_rva(rva)?;
        let delta = rva - section.virtual_address;
        if delta >= section.size_of_raw_data {
            return None;
        }
        section.pointer_to_raw_data.checked_add(delta)
    }

    /// Raw bytes of section `index`, clamped to what `buffer` actually holds.
    pub fn section_data<'a>(&self, buffer: &'a [u8], index: usize) -> Option<&'a [u8]> {
        let section = self.sections.get(index)?;
        let (start, end) = section.raw_range()?;
        let len = buffer.len() as u64;
        if start >= len {
            return None;
        }
        buffer.get(start as usize..end.min(len) as usize)
    }

    /// True when no anomalies were recorded.
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}
