use super::characteristics::SectionCharacteristics;

/// # Section header
///
/// Immediately following the optional header is the Section Table. Each
/// section header has the following format, for a total of `40` bytes per
/// entry:
///
/// | Offset | Size | Field                 | Description |
/// | ------ | ---- | --------------------- | ----------- |
/// | 0      | 8    | Name                  | An 8-byte, null-padded ASCII string. There is no terminating null if the string is exactly eight characters long. |
/// | 8      | 4    | VirtualSize           | Total size of the section in bytes once loaded. If this value is greater than SizeOfRawData, the section is zero-padded. |
/// | 12     | 4    | VirtualAddress        | Address of the first byte of the section when loaded into memory, relative to the image base. |
/// | 16     | 4    | SizeOfRawData         | Size of the initialized data on disk in bytes. When a section contains only uninitialized data, this field should be 0. |
/// | 20     | 4    | PointerToRawData      | File offset of the section's first page. When a section contains only uninitialized data, this field should be 0. |
/// | 24     | 4    | PointerToRelocations  | Should be 0 for executable images. |
/// | 28     | 4    | PointerToLinenumbers  | Should be 0. |
/// | 32     | 2    | NumberOfRelocations   | Should be 0 for executable images. |
/// | 34     | 2    | NumberOfLinenumbers   | Should be 0. |
/// | 36     | 4    | Characteristics       | Flags describing the section's characteristics, see [`SectionCharacteristics`]. |
#[derive(Debug, Clone)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
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
    pub fn from(slice: &[u8; 40]) -> SectionHeader {
        SectionHeader {
            name: slice[0..8].try_into().unwrap(),
            virtual_size: u32::from_le_bytes(slice[8..12].try_into().unwrap()),
            virtual_address: u32::from_le_bytes(slice[12..16].try_into().unwrap()),
            size_of_raw_data: u32::from_le_bytes(slice[16..20].try_into().unwrap()),
            pointer_to_raw_data: u32::from_le_bytes(slice[20..24].try_into().unwrap()),
            pointer_to_relocations: u32::from_le_bytes(slice[24..28].try_into().unwrap()),
            pointer_to_linenumbers: u32::from_le_bytes(slice[28..32].try_into().unwrap()),
            number_of_relocations: u16::from_le_bytes(slice[32..34].try_into().unwrap()),
            number_of_linenumbers: u16::from_le_bytes(slice[34..36].try_into().unwrap()),
            characteristics: SectionCharacteristics::new(u32::from_le_bytes(slice[36..40].try_into().unwrap())),
        }
    }

    /// Section name with the null padding stripped.
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// Whether `rva` falls inside this section's virtual range.
    pub fn contains_rva(&self, rva: u32) -> bool {
        self.virtual_address <= rva && rva - self.virtual_address < self.virtual_size
    }
}
