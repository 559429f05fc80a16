use crate::error::{Error, Result};

use super::*;

/// Parsed PE/i386 image: headers, section table, and the raw file bytes
/// that section data is sliced out of.
#[derive(Debug)]
pub struct PeImage {
    pub pe_header: PeHeader,
    pub optional_header: PeOptionalHeader,
    pub sections: Vec<SectionHeader>,
    data: Vec<u8>,
}

impl PeImage {
    pub(crate) fn new(
        pe_header: PeHeader,
        optional_header: PeOptionalHeader,
        sections: Vec<SectionHeader>,
        data: Vec<u8>,
    ) -> PeImage {
        PeImage { pe_header, optional_header, sections, data }
    }

    /// Preferred load address of the image.
    pub fn image_base(&self) -> u32 {
        self.optional_header.image_base
    }

    /// Virtual address of the entry point once the image is loaded.
    pub fn entry_vaddr(&self) -> u32 {
        self.optional_header.image_base + self.optional_header.entry_point_rva
    }

    pub fn section(&self, name: &str) -> Result<&SectionHeader> {
        self.sections
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| Error::MissingSection { name: name.to_string() })
    }

    /// Section whose virtual range covers `rva`, if any.
    pub fn section_containing_rva(&self, rva: u32) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| s.contains_rva(rva))
    }

    /// Raw on-disk bytes of a section. Sections without initialized data
    /// yield an empty slice.
    pub fn section_data(&self, section: &SectionHeader) -> &[u8] {
        let start = section.pointer_to_raw_data as usize;
        let end = start + section.size_of_raw_data as usize;
        self.data.get(start..end).unwrap_or(&[])
    }
}
