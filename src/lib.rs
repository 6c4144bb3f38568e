//! # peheader
//!
//! A validating reader for the headers of Windows Portable Executable (PE)
//! files.
//!
//! ## Overview
//!
//! Given an untrusted byte buffer, [`read`] checks the DOS header, the NT
//! signature, the COFF file header, the optional header (PE32 or PE32+) and
//! the section table, and returns either a [`PeImage`] or a
//! [`PeFormatError`] naming the failed check and the byte offset involved.
//!
//! ```no_run
//! let bytes = std::fs::read("app.exe").unwrap();
//! let image = peheader::read(&bytes).unwrap();
//! for section in &image.sections {
//!     println!("{} at RVA 0x{:X}", section.name(), section.virtual_address);
//! }
//! ```
//!
//! Reading is pure: the input is never modified, no global state exists, and
//! the returned image owns all of its data. Independent buffers can be read
//! from any number of threads at once.
//!
//! Problems that do not make the headers unreadable, such as a section whose
//! raw data runs past the end of the file or two sections sharing file bytes,
//! are recorded in [`PeImage::anomalies`]. [`ReadConfig::strict`] turns
//! out-of-bounds sections into errors instead.

#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

pub mod clr;
pub mod error;
pub mod image;
pub mod pe;
pub mod reader;

pub use clr::{ClrEntryPoint, ClrFlags, ClrHeader};
pub use error::{PeFormatError, Result};
pub use image::{Anomaly, PeImage};
pub use pe::{
    DataDirectory, DirectoryEntry, DllCharacteristics, DosHeader, FileCharacteristics,
    FileHeader, Machine, OptionalHeader, OptionalHeader32, OptionalHeader64,
    SectionCharacteristics, SectionHeader, SectionMisc, Subsystem,
};
pub use reader::{read, read_with, ReadConfig};
