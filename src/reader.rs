//! PE header reader.
//!
//! Validates an untrusted byte buffer step by step and assembles a [`PeImage`]:
//! 1. DOS header and `MZ` signature
//! 2. `e_lfanew` and the `PE\0\0` signature
//! 3. COFF file header
//! 4. Optional header, dispatched on its magic
//! 5. Section header table
//! 6. Raw data bounds of every section
//!
//! Steps 1-5 short-circuit on the first failure. Step 6 is soft in lenient
//! mode and hard in strict mode.

use scroll::{Pread, LE};
use tracing::{debug, trace};

use crate::error::{PeFormatError, Result};
use crate::image::{Anomaly, PeImage};
use crate::pe::{
    DosHeader, FileHeader, OptionalHeader, OptionalHeader32, OptionalHeader64, SectionHeader,
    DOS_MAGIC, NUMBER_OF_DIRECTORY_ENTRIES, PE32_MAGIC, PE32_PLUS_MAGIC, PE_SIGNATURE,
};

/// Configuration for a read.
#[derive(Clone, Debug)]
pub struct ReadConfig {
    /// Fail on the first section whose raw data exceeds the buffer instead of
    /// recording an anomaly.
    pub strict: bool,
    /// Record overlapping raw data ranges as anomalies.
    pub detect_overlaps: bool,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            strict: false,
            detect_overlaps: true,
        }
    }
}

impl ReadConfig {
    /// Strict configuration: out-of-bounds sections are errors.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }
}

/// Read PE headers from `buffer` in lenient mode.
pub fn read(buffer: &[u8]) -> Result<PeImage> {
    read_with(buffer, &ReadConfig::default())
}

/// Read PE headers from `buffer` with the given configuration.
pub fn read_with(buffer: &[u8], config: &ReadConfig) -> Result<PeImage> {
    let len = buffer.len();

    // DOS header
    if len < DosHeader::SIZE {
        return Err(PeFormatError::BufferTooSmall { actual: len });
    }
    let dos_header = buffer
        .pread_with::<DosHeader>(0, LE)
        .map_err(|_| PeFormatError::BufferTooSmall { actual: len })?;
    if dos_header.e_magic != DOS_MAGIC {
        return Err(PeFormatError::NotAnExecutable {
            found: dos_header.e_magic,
        });
    }

    // NT signature
    let e_lfanew = dos_header.e_lfanew;
    let nt_offset = e_lfanew as usize;
    if nt_offset >= len {
        return Err(PeFormatError::MalformedDosHeader { e_lfanew, len });
    }
    if buffer.pread_with::<u32>(nt_offset, LE).ok() != Some(PE_SIGNATURE) {
        return Err(PeFormatError::MissingNtHeader { offset: nt_offset });
    }

    // File header
    let file_header_offset = nt_offset + 4;
    let file_header = buffer.pread_with::<FileHeader>(file_header_offset, LE).map_err(|_| {
        PeFormatError::TruncatedFileHeader {
            offset: file_header_offset,
        }
    })?;

    // Optional header
    let opt_offset = file_header_offset + FileHeader::SIZE;
    let declared = file_header.size_of_optional_header;
    let optional_header = read_optional_header(buffer, opt_offset, declared)?;

    // Section table, located by the declared size so padding is skipped
    let table_offset = opt_offset + declared as usize;
    let count = file_header.number_of_sections;
    let table_end = table_offset + count as usize * SectionHeader::SIZE;
    if table_end > len {
        return Err(PeFormatError::TruncatedSectionTable {
            offset: table_offset,
            count,
            len,
        });
    }

    let mut cursor = table_offset;
    let mut sections = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let section = buffer.gread_with::<SectionHeader>(&mut cursor, LE).map_err(|_| {
            PeFormatError::TruncatedSectionTable {
                offset: table_offset,
                count,
                len,
            }
        })?;
        trace!(
            name = %section.name(),
            va = section.virtual_address,
            raw_offset = section.pointer_to_raw_data,
            raw_size = section.size_of_raw_data,
            "section header"
        );
        sections.push(section);
    }

    let mut anomalies = Vec::new();
    check_section_bounds(&sections, len, config, &mut anomalies)?;
    if config.detect_overlaps {
        find_overlaps(&sections, &mut anomalies);
    }

    let declared_dirs = optional_header.number_of_rva_and_sizes();
    if declared_dirs as usize > NUMBER_OF_DIRECTORY_ENTRIES {
        anomalies.push(Anomaly::ExcessDirectoryCount {
            declared: declared_dirs,
        });
    }

    debug!(
        machine = ?file_header.machine,
        magic = optional_header.magic(),
        sections = sections.len(),
        anomalies = anomalies.len(),
        "read PE headers"
    );

    Ok(PeImage {
        dos_header,
        nt_headers_offset: e_lfanew,
        file_header,
        optional_header,
        sections,
        anomalies,
    })
}

fn read_optional_header(buffer: &[u8], offset: usize, declared: u16) -> Result<OptionalHeader> {
    let truncated = |required: usize| PeFormatError::TruncatedOptionalHeader {
        offset,
        declared,
        required,
    };

    if declared < 2 {
        return Err(truncated(2));
    }
    let magic = buffer.pread_with::<u16>(offset, LE).map_err(|_| truncated(2))?;
    let required = OptionalHeader::required_size(magic)
        .ok_or(PeFormatError::UnsupportedOptionalHeaderMagic { magic, offset })?;
    if (declared as usize) < required {
        return Err(truncated(required));
    }

    let header = match magic {
        PE32_MAGIC => buffer
            .pread_with::<OptionalHeader32>(offset, LE)
            .map(OptionalHeader::Pe32),
        PE32_PLUS_MAGIC => buffer
            .pread_with::<OptionalHeader64>(offset, LE)
            .map(OptionalHeader::Pe32Plus),
        _ => return Err(PeFormatError::UnsupportedOptionalHeaderMagic { magic, offset }),
    };
    header.map_err(|_| truncated(required))
}

fn check_section_bounds(
    sections: &[SectionHeader],
    len: usize,
    config: &ReadConfig,
    anomalies: &mut Vec<Anomaly>,
) -> Result<()> {
    for (index, section) in sections.iter().enumerate() {
        let Some((start, end)) = section.raw_range() else {
            continue;
        };
        if end <= len as u64 {
            continue;
        }
        if config.strict {
            return Err(PeFormatError::SectionOutOfBounds {
                index,
                offset: start as u32,
                end,
                len,
            });
        }
        anomalies.push(Anomaly::SectionOutOfBounds {
            index,
            offset: start as u32,
            end,
            len,
        });
    }
    Ok(())
}

/// Sweep the raw ranges in file order. Each section that starts before the
/// furthest end seen so far is reported once, paired with the section that
/// owns that end.
fn find_overlaps(sections: &[SectionHeader], anomalies: &mut Vec<Anomaly>) {
    let mut ranges: Vec<(u64, u64, usize)> = sections
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.raw_range().map(|(start, end)| (start, end, i)))
        .collect();
    ranges.sort_unstable();

    let mut pairs = Vec::new();
    let mut furthest: Option<(u64, usize)> = None;
    for (start, end, index) in ranges {
        match furthest {
            Some((max_end, owner)) if start < max_end => {
                pairs.push((owner.min(index), owner.max(index)));
                if end > max_end {
                    furthest = Some((end, index));
                }
            }
            _ => furthest = Some((end, index)),
        }
    }
    pairs.sort_unstable();

    anomalies.extend(
        pairs
            .into_iter()
            .map(|(first, second)| Anomaly::OverlappingSections { first, second }),
    );
}
