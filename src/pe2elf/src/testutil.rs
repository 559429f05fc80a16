//! Helpers for building synthetic PE images and reading back emitted ELF
//! objects in tests.

use byteorder::{ByteOrder, LittleEndian};

pub struct TestSection {
    pub name: &'static str,
    pub rva: u32,
    pub virtual_size: u32,
    pub data: Vec<u8>,
    pub characteristics: u32,
}

/// A minimal PE32/i386 image builder. Section raw data is laid out from
/// file offset 0x400 on 0x200-byte boundaries.
pub struct TestPe {
    pub image_base: u32,
    pub entry_rva: u32,
    pub magic: u16,
    pub machine: u16,
    pub import_dir: (u32, u32),
    pub sections: Vec<TestSection>,
}

const COFF_OFFSET: usize = 0x84;
const OPT_OFFSET: usize = COFF_OFFSET + 20;
const SHDR_OFFSET: usize = OPT_OFFSET + 224;
const RAW_DATA_OFFSET: u32 = 0x400;

impl TestPe {
    pub fn new(image_base: u32) -> TestPe {
        TestPe {
            image_base,
            entry_rva: 0,
            magic: 0x10b,
            machine: 0x14c,
            import_dir: (0, 0),
            sections: Vec::new(),
        }
    }

    pub fn section(
        &mut self,
        name: &'static str,
        rva: u32,
        virtual_size: u32,
        data: Vec<u8>,
        characteristics: u32,
    ) -> &mut TestPe {
        self.sections.push(TestSection { name, rva, virtual_size, data, characteristics });
        self
    }

    pub fn set_data(&mut self, name: &str, data: Vec<u8>) {
        self.sections
            .iter_mut()
            .find(|s| s.name == name)
            .expect("no such test section")
            .data = data;
    }

    pub fn remove_section(&mut self, name: &str) {
        self.sections.retain(|s| s.name != name);
    }

    pub fn build(&self) -> Vec<u8> {
        assert!(SHDR_OFFSET + self.sections.len() * 40 <= RAW_DATA_OFFSET as usize);

        let mut buf = vec![0u8; RAW_DATA_OFFSET as usize];

        // DOS header: magic plus e_lfanew pointing at the PE signature.
        buf[0] = b'M';
        buf[1] = b'Z';
        LittleEndian::write_u32(&mut buf[0x3c..], 0x80);
        buf[0x80..0x84].copy_from_slice(b"PE\0\0");

        LittleEndian::write_u16(&mut buf[COFF_OFFSET..], self.machine);
        LittleEndian::write_u16(&mut buf[COFF_OFFSET + 2..], self.sections.len() as u16);
        LittleEndian::write_u16(&mut buf[COFF_OFFSET + 16..], 224);
        // Executable, 32-bit word machine.
        LittleEndian::write_u16(&mut buf[COFF_OFFSET + 18..], 0x0102);

        LittleEndian::write_u16(&mut buf[OPT_OFFSET..], self.magic);
        LittleEndian::write_u32(&mut buf[OPT_OFFSET + 16..], self.entry_rva);
        LittleEndian::write_u32(&mut buf[OPT_OFFSET + 28..], self.image_base);
        LittleEndian::write_u32(&mut buf[OPT_OFFSET + 32..], 0x1000); // section alignment
        LittleEndian::write_u32(&mut buf[OPT_OFFSET + 36..], 0x200); // file alignment
        LittleEndian::write_u32(&mut buf[OPT_OFFSET + 92..], 16); // directory count
        let dirs = OPT_OFFSET + 96;
        LittleEndian::write_u32(&mut buf[dirs + 8..], self.import_dir.0);
        LittleEndian::write_u32(&mut buf[dirs + 12..], self.import_dir.1);

        let mut raw_ptr = RAW_DATA_OFFSET;
        for (i, sec) in self.sections.iter().enumerate() {
            let off = SHDR_OFFSET + i * 40;
            buf[off..off + sec.name.len()].copy_from_slice(sec.name.as_bytes());
            LittleEndian::write_u32(&mut buf[off + 8..], sec.virtual_size);
            LittleEndian::write_u32(&mut buf[off + 12..], sec.rva);
            LittleEndian::write_u32(&mut buf[off + 36..], sec.characteristics);
            if !sec.data.is_empty() {
                LittleEndian::write_u32(&mut buf[off + 16..], sec.data.len() as u32);
                LittleEndian::write_u32(&mut buf[off + 20..], raw_ptr);

                let start = raw_ptr as usize;
                buf.resize(start + sec.data.len(), 0);
                buf[start..start + sec.data.len()].copy_from_slice(&sec.data);
                raw_ptr = (raw_ptr + sec.data.len() as u32 + 0x1ff) & !0x1ff;
            }
        }

        buf
    }
}

/// A PE carrying every section the converter requires, with inert default
/// contents: entry at rva 0x1000, one null import descriptor, empty
/// `.reloc`.
pub fn fixture() -> TestPe {
    use crate::pe_image::SectionCharacteristics as Scn;
    const CODE: u32 = Scn::IMAGE_SCN_CNT_CODE | Scn::IMAGE_SCN_MEM_READ | Scn::IMAGE_SCN_MEM_EXECUTE;
    const DATA: u32 = Scn::IMAGE_SCN_CNT_INITIALIZED_DATA | Scn::IMAGE_SCN_MEM_READ | Scn::IMAGE_SCN_MEM_WRITE;
    const RODATA: u32 = Scn::IMAGE_SCN_CNT_INITIALIZED_DATA | Scn::IMAGE_SCN_MEM_READ;
    const BSS: u32 = Scn::IMAGE_SCN_CNT_UNINITIALIZED_DATA | Scn::IMAGE_SCN_MEM_READ | Scn::IMAGE_SCN_MEM_WRITE;

    let mut pe = TestPe::new(0x400000);
    pe.entry_rva = 0x1000;
    pe.import_dir = (0x6000, 20);
    pe.section(".text", 0x1000, 0x1000, vec![0; 0x40], CODE)
        .section(".exc", 0x2000, 0x1000, vec![0; 0x10], RODATA)
        .section(".rdata", 0x3000, 0x1000, vec![0; 0x20], RODATA)
        .section(".data", 0x4000, 0x1000, vec![0; 0x20], DATA)
        .section(".CRT", 0x5000, 0x1000, vec![0; 0x10], DATA)
        .section(".idata", 0x6000, 0x1000, vec![0; 0x80], DATA)
        .section(".bss", 0x7000, 0x100, Vec::new(), BSS)
        .section(".reloc", 0x8000, 0x1000, Vec::new(), RODATA);
    pe
}

/// One base relocation block: `(page_rva, block_size)` header followed by
/// 16-bit entries.
pub fn reloc_block(page_rva: u32, entries: &[u16]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&page_rva.to_le_bytes());
    buf.extend_from_slice(&((8 + 2 * entries.len()) as u32).to_le_bytes());
    for entry in entries {
        buf.extend_from_slice(&entry.to_le_bytes());
    }
    buf
}

/// `.idata` contents importing `MessageBoxA` from `user32.dll`, matching
/// a section mapped at rva 0x6000: descriptor at 0x6000, hint/name thunks
/// at 0x6028, IAT at 0x6040, DLL name at 0x6050, hint/name entry at 0x6060.
pub fn import_idata() -> Vec<u8> {
    let mut data = vec![0u8; 0x80];
    LittleEndian::write_u32(&mut data[0..], 0x6028); // original first thunk
    LittleEndian::write_u32(&mut data[12..], 0x6050); // dll name rva
    LittleEndian::write_u32(&mut data[16..], 0x6040); // first thunk (IAT)
    LittleEndian::write_u32(&mut data[0x28..], 0x6060); // hint/name rva
    data[0x50..0x5b].copy_from_slice(b"user32.dll\0");
    data[0x60] = 0x2a; // ordinal hint, ignored
    data[0x62..0x6e].copy_from_slice(b"MessageBoxA\0");
    data
}

/// Chunk of an ELF object read back field by field for assertions.
pub struct ElfFile {
    bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Shdr {
    pub name: String,
    pub name_off: u32,
    pub kind: u32,
    pub flags: u32,
    pub addr: u32,
    pub off: u32,
    pub size: u32,
    pub link: u32,
    pub info: u32,
    pub addralign: u32,
    pub entsize: u32,
}

#[derive(Debug, Clone)]
pub struct Sym {
    pub name: String,
    pub value: u32,
    pub size: u32,
    pub info: u8,
    pub other: u8,
    pub shndx: u16,
}

impl ElfFile {
    pub fn parse(bytes: Vec<u8>) -> ElfFile {
        assert_eq!(&bytes[0..4], &[0x7f, b'E', b'L', b'F']);
        assert_eq!(bytes[4], 1, "not a 32-bit ELF");
        assert_eq!(bytes[5], 1, "not little-endian");
        ElfFile { bytes }
    }

    fn u16_at(&self, off: usize) -> u16 {
        LittleEndian::read_u16(&self.bytes[off..])
    }

    fn u32_at(&self, off: usize) -> u32 {
        LittleEndian::read_u32(&self.bytes[off..])
    }

    pub fn entry(&self) -> u32 {
        self.u32_at(24)
    }

    pub fn shstrndx(&self) -> usize {
        self.u16_at(50) as usize
    }

    pub fn sections(&self) -> Vec<Shdr> {
        let shoff = self.u32_at(32) as usize;
        let shnum = self.u16_at(48) as usize;
        let mut sections: Vec<Shdr> = (0..shnum)
            .map(|i| {
                let o = shoff + i * 40;
                Shdr {
                    name: String::new(),
                    name_off: self.u32_at(o),
                    kind: self.u32_at(o + 4),
                    flags: self.u32_at(o + 8),
                    addr: self.u32_at(o + 12),
                    off: self.u32_at(o + 16),
                    size: self.u32_at(o + 20),
                    link: self.u32_at(o + 24),
                    info: self.u32_at(o + 28),
                    addralign: self.u32_at(o + 32),
                    entsize: self.u32_at(o + 36),
                }
            })
            .collect();

        let tab = &sections[self.shstrndx()];
        let strs = self.bytes[tab.off as usize..(tab.off + tab.size) as usize].to_vec();
        for sec in &mut sections {
            sec.name = cstr_at(&strs, sec.name_off as usize);
        }
        sections
    }

    pub fn section(&self, name: &str) -> Option<Shdr> {
        self.sections().into_iter().find(|s| s.name == name)
    }

    pub fn section_bytes(&self, sec: &Shdr) -> &[u8] {
        &self.bytes[sec.off as usize..(sec.off + sec.size) as usize]
    }

    pub fn symbols(&self) -> Vec<Sym> {
        let symtab = self.section(".symtab").expect("no .symtab");
        let strtab = self.section(".strtab").expect("no .strtab");
        let strs = self.section_bytes(&strtab).to_vec();

        (0..(symtab.size / 16) as usize)
            .map(|i| {
                let o = symtab.off as usize + i * 16;
                Sym {
                    name: cstr_at(&strs, self.u32_at(o) as usize),
                    value: self.u32_at(o + 4),
                    size: self.u32_at(o + 8),
                    info: self.bytes[o + 12],
                    other: self.bytes[o + 13],
                    shndx: self.u16_at(o + 14),
                }
            })
            .collect()
    }

    pub fn symbol(&self, name: &str) -> Option<Sym> {
        self.symbols().into_iter().find(|s| s.name == name)
    }

    /// `(offset, symbol index, relocation type)` triples of a `.rel*`
    /// section, or empty if the section does not exist.
    pub fn rels(&self, name: &str) -> Vec<(u32, u32, u8)> {
        let sec = match self.section(name) {
            Some(sec) => sec,
            None => return Vec::new(),
        };
        (0..(sec.size / 8) as usize)
            .map(|i| {
                let o = sec.off as usize + i * 8;
                let info = self.u32_at(o + 4);
                (self.u32_at(o), info >> 8, (info & 0xff) as u8)
            })
            .collect()
    }
}

fn cstr_at(data: &[u8], off: usize) -> String {
    let slice = &data[off..];
    let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
    String::from_utf8_lossy(&slice[..end]).into_owned()
}
