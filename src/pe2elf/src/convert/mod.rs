mod imports;
mod relocs;

use std::io::{Read, Seek, Write};

use log::{info, warn};

use crate::elf::{Elf32SectionHeader, Elf32Sym, ElfWriter};
use crate::error::Result;
use crate::pe_image::PeImage;

/// PE sections copied verbatim, in output order: source name, ELF name and
/// section flags. `.idata` and `.bss` are handled separately.
const COPY_PLAN: &[(&str, &str, u32)] = &[
    (".text", ".text", Elf32SectionHeader::SHF_ALLOC | Elf32SectionHeader::SHF_EXECINSTR),
    (".exc", ".rodata.exc", Elf32SectionHeader::SHF_ALLOC),
    (".rdata", ".rodata", Elf32SectionHeader::SHF_ALLOC),
    (".data", ".data", Elf32SectionHeader::SHF_ALLOC | Elf32SectionHeader::SHF_WRITE),
    (".CRT", ".data.CRT", Elf32SectionHeader::SHF_ALLOC | Elf32SectionHeader::SHF_WRITE),
];

/// Converts a parsed PE image into a relocatable ELF object written to
/// `sink`, which is returned once the object is finished.
pub fn convert<W: Read + Write + Seek>(image: &PeImage, sink: W) -> Result<W> {
    let base_vaddr = image.image_base();
    info!("base vaddr:  {base_vaddr:#x}");
    info!("entry vaddr: {:#x}", image.entry_vaddr());

    if image.pe_header.characteristics.is_dll() {
        warn!("input image is a DLL; its entry point is not a program entry point");
    }

    let mut writer = ElfWriter::new(sink)?;
    writer.set_entry(image.entry_vaddr());

    for &(pe_name, elf_name, flags) in COPY_PLAN {
        let section = image.section(pe_name)?;
        info!("{elf_name:<12} vaddr {:#x}", base_vaddr + section.virtual_address);
        writer.copy_section(
            image.section_data(section),
            elf_name,
            Elf32SectionHeader {
                kind: Elf32SectionHeader::SHT_PROGBITS,
                flags,
                addr: base_vaddr + section.virtual_address,
                ..Default::default()
            },
        )?;
    }

    // .idata is emitted zero-filled instead of copied: the import
    // relocations must not see leftover thunk bytes as implicit addends.
    let idata = image.section(".idata")?;
    info!("{:<12} vaddr {:#x}", ".data.idata", base_vaddr + idata.virtual_address);
    let zeros = vec![0u8; idata.virtual_size as usize];
    let idata_ndx = writer.copy_section(
        zeros.as_slice(),
        ".data.idata",
        Elf32SectionHeader {
            kind: Elf32SectionHeader::SHT_PROGBITS,
            flags: Elf32SectionHeader::SHF_ALLOC | Elf32SectionHeader::SHF_WRITE,
            addr: base_vaddr + idata.virtual_address,
            ..Default::default()
        },
    )?;

    imports::add_imports(image, &mut writer, idata_ndx)?;
    add_implicit_symbols(&mut writer);

    let bss = image.section(".bss")?;
    info!("{:<12} vaddr {:#x}", ".bss", base_vaddr + bss.virtual_address);
    if !bss.characteristics.is_uninitialized_data() {
        warn!(".bss is not marked as uninitialized data");
    }
    writer.add_bss(bss.virtual_size, base_vaddr + bss.virtual_address);

    let reloc = image.section(".reloc")?;
    relocs::add_relocs(image.section_data(reloc), base_vaddr, &mut writer)?;

    writer.finish()
}

/// Injects a `__pe<name>_start` symbol at offset 0 of every section emitted
/// so far, so downstream code can refer to section starts by name.
fn add_implicit_symbols<W: Read + Write + Seek>(writer: &mut ElfWriter<W>) {
    for i in 0..writer.sections().len() {
        let name = format!("__pe{}_start", writer.section_name(i).replace('.', "_"));
        writer.add_symbol(
            Elf32Sym {
                info: Elf32Sym::st_info(Elf32Sym::STB_GLOBAL, Elf32Sym::STT_NOTYPE),
                other: Elf32Sym::STV_DEFAULT,
                shndx: i as u16,
                ..Default::default()
            },
            &name,
        );
    }
}
