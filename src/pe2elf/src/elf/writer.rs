use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Result;

use super::{Elf32Header, Elf32Rel, Elf32SectionHeader, Elf32Sym, StringTable};

/// Deduplication key for the symbol pool: symbols are unique per
/// `(section index, value)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SymKey {
    shndx: u16,
    value: u32,
}

/// Incrementally builds a relocatable ELF object in a seekable sink.
///
/// Section bytes are streamed to the sink as they are copied; the string
/// tables, symbol table, relocation tables and the final header are
/// emitted by [`ElfWriter::finish`]. The sink must also support absolute
/// reads, because relocation lifting reads back and zeroes implicit
/// addends inside already-written sections.
pub struct ElfWriter<W> {
    sink: W,
    hdr: Elf32Header,
    sections: Vec<Elf32SectionHeader>,
    symtab: Vec<Elf32Sym>,
    symmap: HashMap<SymKey, usize>,
    relocs: HashMap<usize, Vec<Elf32Rel>>,
    shstrtab: StringTable,
    strtab: StringTable,
}

impl<W: Read + Write + Seek> ElfWriter<W> {
    /// Writes a provisional ELF header and sets up the reserved null
    /// section and null symbol.
    pub fn new(mut sink: W) -> Result<ElfWriter<W>> {
        let hdr = Elf32Header::new();
        hdr.write_to(&mut sink)?;
        Ok(ElfWriter {
            sink,
            hdr,
            sections: vec![Elf32SectionHeader::default()],
            symtab: vec![Elf32Sym::default()],
            symmap: HashMap::new(),
            relocs: HashMap::new(),
            shstrtab: StringTable::new(),
            strtab: StringTable::new(),
        })
    }

    pub fn set_entry(&mut self, vaddr: u32) {
        self.hdr.entry = vaddr;
    }

    pub fn sections(&self) -> &[Elf32SectionHeader] {
        &self.sections
    }

    pub fn section_name(&self, shndx: usize) -> &str {
        self.sections
            .get(shndx)
            .and_then(|s| self.shstrtab.get(s.name))
            .unwrap_or("")
    }

    /// Index of the section whose `[addr, addr + size)` range covers
    /// `vaddr`, if any.
    pub fn section_containing_vaddr(&self, vaddr: u32) -> Option<usize> {
        self.sections.iter().position(|s| s.contains_vaddr(vaddr))
    }

    fn pos(&mut self) -> Result<u32> {
        Ok(self.sink.seek(SeekFrom::Current(0))? as u32)
    }

    fn align(&mut self, n: u32) -> Result<()> {
        let pos = self.pos()?;
        if pos % n != 0 {
            self.sink.seek(SeekFrom::Current((n - pos % n) as i64))?;
        }
        Ok(())
    }

    /// Copies `rd` into the sink at the next 256-byte boundary and records
    /// the resulting section. The template's name, offset, size and
    /// alignment fields are filled in here. Returns the section's index.
    pub fn copy_section(
        &mut self,
        mut rd: impl Read,
        name: &str,
        mut sec: Elf32SectionHeader,
    ) -> Result<usize> {
        self.align(0x100)?;

        let at_start = self.pos()?;
        let n = std::io::copy(&mut rd, &mut self.sink)?;

        sec.name = self.shstrtab.add(name);
        sec.off = at_start;
        sec.size = n as u32;
        sec.addralign = 1;
        self.sections.push(sec);

        Ok(self.sections.len() - 1)
    }

    /// Appends an uninitialized-data section; no bytes are written.
    pub fn add_bss(&mut self, size: u32, vaddr: u32) {
        let name = self.shstrtab.add(".bss");
        self.sections.push(Elf32SectionHeader {
            name,
            kind: Elf32SectionHeader::SHT_NOBITS,
            flags: Elf32SectionHeader::SHF_ALLOC | Elf32SectionHeader::SHF_WRITE,
            addr: vaddr,
            size,
            ..Default::default()
        });
    }

    /// Adds a symbol, deduplicating on `(shndx, value)`. The first symbol
    /// at a given location keeps its name; later names are dropped.
    pub fn add_symbol(&mut self, mut sym: Elf32Sym, name: &str) -> usize {
        let key = SymKey { shndx: sym.shndx, value: sym.value };
        if let Some(&ndx) = self.symmap.get(&key) {
            return ndx;
        }
        if !name.is_empty() {
            sym.name = self.strtab.add(name);
        }
        let ndx = self.symtab.len();
        self.symtab.push(sym);
        self.symmap.insert(key, ndx);
        ndx
    }

    pub fn add_relocation(&mut self, site_shndx: usize, rel: Elf32Rel) {
        self.relocs.entry(site_shndx).or_default().push(rel);
    }

    /// Reads the little-endian word at an absolute file offset without
    /// disturbing the sequential write position.
    pub fn read_u32_at(&mut self, off: u32) -> Result<u32> {
        let cur = self.sink.seek(SeekFrom::Current(0))?;
        self.sink.seek(SeekFrom::Start(off as u64))?;
        let word = self.sink.read_u32::<LittleEndian>()?;
        self.sink.seek(SeekFrom::Start(cur))?;
        Ok(word)
    }

    /// Zeroes the word at an absolute file offset, keeping the sequential
    /// write position.
    pub fn zero_u32_at(&mut self, off: u32) -> Result<()> {
        let cur = self.sink.seek(SeekFrom::Current(0))?;
        self.sink.seek(SeekFrom::Start(off as u64))?;
        self.sink.write_all(&[0, 0, 0, 0])?;
        self.sink.seek(SeekFrom::Start(cur))?;
        Ok(())
    }

    /// Emits the relocation tables, symbol table, both string tables and
    /// the section header table, then rewrites the ELF header with the
    /// final layout. Consumes the writer and returns the sink.
    pub fn finish(mut self) -> Result<W> {
        self.write_reltabs()?;
        self.write_symtab()?;
        self.write_strtab()?;
        self.write_shstrtab()?;
        self.write_shtab()?;
        self.sink.seek(SeekFrom::Start(0))?;
        self.hdr.write_to(&mut self.sink)?;
        self.sink.flush()?;
        Ok(self.sink)
    }

    fn write_reltabs(&mut self) -> Result<()> {
        let mut n_reltabs = (0..self.sections.len())
            .filter(|i| self.relocs.contains_key(i))
            .count();

        for i in 0..self.sections.len() {
            let rels = match self.relocs.remove(&i) {
                Some(rels) => rels,
                None => continue,
            };
            n_reltabs -= 1;

            let at_start = self.pos()?;
            for rel in &rels {
                rel.write_to(&mut self.sink)?;
            }
            let at_end = self.pos()?;

            let name = format!(".rel{}", self.section_name(i));
            let name = self.shstrtab.add(&name);
            self.sections.push(Elf32SectionHeader {
                name,
                kind: Elf32SectionHeader::SHT_REL,
                off: at_start,
                size: at_end - at_start,
                // The symbol table comes right after the remaining reltabs.
                link: (self.sections.len() + n_reltabs + 1) as u32,
                info: i as u32,
                entsize: Elf32Rel::SIZE,
                ..Default::default()
            });
        }

        Ok(())
    }

    fn write_symtab(&mut self) -> Result<()> {
        let at_start = self.pos()?;
        for sym in &self.symtab {
            sym.write_to(&mut self.sink)?;
        }
        let at_end = self.pos()?;

        let name = self.shstrtab.add(".symtab");
        self.sections.push(Elf32SectionHeader {
            name,
            kind: Elf32SectionHeader::SHT_SYMTAB,
            off: at_start,
            size: at_end - at_start,
            // The string table follows immediately.
            link: self.sections.len() as u32 + 1,
            // All symbols are global, so the first non-local index is 1.
            info: 1,
            entsize: Elf32Sym::SIZE,
            ..Default::default()
        });

        Ok(())
    }

    fn write_strtab(&mut self) -> Result<()> {
        let at_start = self.pos()?;
        self.sink.write_all(self.strtab.as_bytes())?;
        let at_end = self.pos()?;

        let name = self.shstrtab.add(".strtab");
        self.sections.push(Elf32SectionHeader {
            name,
            kind: Elf32SectionHeader::SHT_STRTAB,
            off: at_start,
            size: at_end - at_start,
            ..Default::default()
        });

        Ok(())
    }

    fn write_shstrtab(&mut self) -> Result<()> {
        self.hdr.shstrndx = self.sections.len() as u16;
        let name = self.shstrtab.add(".shstrtab");

        let at_start = self.pos()?;
        self.sink.write_all(self.shstrtab.as_bytes())?;
        let at_end = self.pos()?;

        self.sections.push(Elf32SectionHeader {
            name,
            kind: Elf32SectionHeader::SHT_STRTAB,
            off: at_start,
            size: at_end - at_start,
            ..Default::default()
        });

        Ok(())
    }

    fn write_shtab(&mut self) -> Result<()> {
        let at_start = self.pos()?;
        for sec in &self.sections {
            sec.write_to(&mut self.sink)?;
        }

        self.hdr.shoff = at_start;
        self.hdr.shentsize = Elf32SectionHeader::SIZE as u16;
        self.hdr.shnum = self.sections.len() as u16;

        Ok(())
    }
}
