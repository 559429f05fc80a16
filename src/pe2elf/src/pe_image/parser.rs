use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};

use super::*;

// "PE\0\0"
static PE_SIGNATURE: [u8; 4] = [0x50, 0x45, 0x00, 0x00];
// "MZ"
static DOS_MAGIC: [u8; 2] = [0x4d, 0x5a];

/// Offset of `e_lfanew`, the file offset of the PE signature, within the
/// DOS header.
const LFANEW_OFFSET: u64 = 0x3c;

pub struct PeParser {
    buffer: Buffer,
}

impl PeParser {
    pub fn new(buffer: Buffer) -> PeParser {
        PeParser { buffer }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<PeParser> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        Ok(PeParser::new(Cursor::new(data)))
    }

    /// Parses the image headers and section table and hands back the
    /// resulting [`PeImage`]. Rejects images that are not PE32/i386.
    pub fn read(mut self) -> Result<PeImage> {
        self.buffer.seek(SeekFrom::Start(0))?;

        self.read_dos_header()?;
        let pe_header = self.read_pe_header()?;
        if pe_header.machine != PeHeader::MACHINE_I386 {
            return Err(Error::UnsupportedMachine { machine: pe_header.machine });
        }

        let optional_header = self.read_pe_optional_header(&pe_header)?;
        let sections = self.read_section_headers(&pe_header)?;

        Ok(PeImage::new(pe_header, optional_header, sections, self.buffer.into_inner()))
    }

    /// The DOS header only matters for two things: the `MZ` magic and the
    /// `e_lfanew` field at offset 0x3c pointing at the PE signature. The
    /// rest of the stub is ignored.
    fn read_dos_header(&mut self) -> Result<()> {
        let mut magic = [0u8; 2];
        self.buffer.read_exact(&mut magic)?;
        if magic != DOS_MAGIC {
            return Err(Error::InvalidDosHeader);
        }

        self.buffer.seek(SeekFrom::Start(LFANEW_OFFSET))?;
        let mut lfanew = [0u8; 4];
        self.buffer.read_exact(&mut lfanew)?;
        self.buffer.seek(SeekFrom::Start(u32::from_le_bytes(lfanew) as u64))?;

        let mut signature = [0u8; 4];
        self.buffer.read_exact(&mut signature)?;
        if signature != PE_SIGNATURE {
            return Err(Error::InvalidPeSignature);
        }

        Ok(())
    }

    /// See [`PeHeader`] struct for more information.
    fn read_pe_header(&mut self) -> Result<PeHeader> {
        let mut header = [0u8; 20];
        self.buffer.read_exact(&mut header)?;
        Ok(PeHeader::from(&header))
    }

    /// See [`PeOptionalHeader`] struct for more information.
    fn read_pe_optional_header(&mut self, header: &PeHeader) -> Result<PeOptionalHeader> {
        let size = header.optional_header_size;
        let mut buffer = vec![0u8; size as usize];
        self.buffer.read_exact(&mut buffer)?;

        if buffer.len() < 2 {
            return Err(Error::TruncatedOptionalHeader { size });
        }
        let magic = u16::from_le_bytes(buffer[0..2].try_into().unwrap());
        if magic != PeOptionalHeader::MAGIC_PE32 {
            return Err(Error::NotPe32 { magic });
        }
        if buffer.len() < PeOptionalHeader::SIZE {
            return Err(Error::TruncatedOptionalHeader { size });
        }

        Ok(PeOptionalHeader::from(buffer[..PeOptionalHeader::SIZE].try_into().unwrap()))
    }

    /// See [`SectionHeader`] struct for more information.
    fn read_section_headers(&mut self, header: &PeHeader) -> Result<Vec<SectionHeader>> {
        let mut sections = Vec::with_capacity(header.number_of_sections as usize);
        for _ in 0..header.number_of_sections {
            let mut buffer = [0u8; 40];
            self.buffer.read_exact(&mut buffer)?;
            sections.push(SectionHeader::from(&buffer));
        }
        Ok(sections)
    }
}
