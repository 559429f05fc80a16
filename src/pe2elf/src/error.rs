use thiserror::Error;

/// Error type for PE parsing and ELF emission failures.
///
/// Every variant is fatal to the conversion. Malformed relocation entries
/// and unresolvable import names are logged and skipped instead of
/// surfacing here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid DOS header")]
    InvalidDosHeader,
    #[error("invalid PE signature")]
    InvalidPeSignature,
    #[error("unsupported machine type {machine:#x}, expected i386 (0x14c)")]
    UnsupportedMachine { machine: u16 },
    #[error("not a PE32 image (optional header magic {magic:#x})")]
    NotPe32 { magic: u16 },
    #[error("optional header too short ({size} bytes)")]
    TruncatedOptionalHeader { size: u16 },
    #[error("required section {name:?} is missing")]
    MissingSection { name: String },
    #[error("no section contains the import directory (rva {rva:#x})")]
    ImportDirectoryNotMapped { rva: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
