/// # PE32 optional header
///
/// Immediately after the COFF file header is the optional header. Only the
/// PE32 (32-bit) layout is supported; the fields this tool consumes are:
///
/// | Offset | Size | Field             | Description |
/// | ------ | ---- | ----------------- | ----------- |
/// | 0      | 2    | Magic             | `0x10b` for PE32. |
/// | 16     | 4    | Entry Point RVA   | RVA of the entry point relative to the image base. |
/// | 20     | 4    | Base Of Code      | RVA of the code section. |
/// | 24     | 4    | Base Of Data      | RVA of the data section. |
/// | 28     | 4    | Image Base        | Preferred load address; a multiple of 0x10000. |
/// | 32     | 4    | Section Alignment | Alignment of sections in memory. |
/// | 36     | 4    | File Alignment    | Alignment of section raw data in the file. |
/// | 56     | 4    | Image Size        | Size of the loaded image including headers. |
/// | 60     | 4    | Header Size       | Combined size of all headers, rounded to the file alignment. |
/// | 68     | 2    | Subsystem         | Required subsystem (CUI `0x3`, GUI `0x2`). |
/// | 104    | 8    | Import Table      | RVA and size of the import directory table. |
///
/// The tail of the header (offsets 96..224) is the data directory array of
/// address/size pairs locating special tables inside the image's sections.
/// The import directory is the only entry read; base relocations are found
/// through the `.reloc` section instead.
#[derive(Debug)]
pub struct PeOptionalHeader {
    pub magic: u16,
    pub entry_point_rva: u32,
    pub base_of_code: u32,
    pub base_of_data: u32,
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub image_size: u32,
    pub header_size: u32,
    pub subsystem: u16,
    pub import_table: (u32, u32),
}

impl PeOptionalHeader {
    /// Magic value of the 32-bit optional header layout.
    pub const MAGIC_PE32: u16 = 0x10b;

    /// Serialized size: 96 bytes of fixed fields plus 16 data directories.
    pub const SIZE: usize = 224;

    pub fn from(slice: &[u8; 224]) -> PeOptionalHeader {
        PeOptionalHeader {
            magic: u16::from_le_bytes(slice[0..2].try_into().unwrap()),
            entry_point_rva: u32::from_le_bytes(slice[16..20].try_into().unwrap()),
            base_of_code: u32::from_le_bytes(slice[20..24].try_into().unwrap()),
            base_of_data: u32::from_le_bytes(slice[24..28].try_into().unwrap()),
            image_base: u32::from_le_bytes(slice[28..32].try_into().unwrap()),
            section_alignment: u32::from_le_bytes(slice[32..36].try_into().unwrap()),
            file_alignment: u32::from_le_bytes(slice[36..40].try_into().unwrap()),
            image_size: u32::from_le_bytes(slice[56..60].try_into().unwrap()),
            header_size: u32::from_le_bytes(slice[60..64].try_into().unwrap()),
            subsystem: u16::from_le_bytes(slice[68..70].try_into().unwrap()),
            import_table: (
                u32::from_le_bytes(slice[104..108].try_into().unwrap()),
                u32::from_le_bytes(slice[108..112].try_into().unwrap()),
            ),
        }
    }
}
