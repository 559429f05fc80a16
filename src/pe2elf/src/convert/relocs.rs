use std::io::{Cursor, Read, Seek, Write};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};

use crate::elf::{Elf32Rel, Elf32Sym, ElfWriter};
use crate::error::Result;

/// The only supported base relocation type: patch the full 32-bit word at
/// the site with the relocated address.
const IMAGE_REL_BASED_HIGHLOW: u16 = 3;

/// Lifts the PE base relocation stream into ELF `R_386_32` entries.
///
/// PE patches work in place: each site already holds the absolute target
/// address, and the relocation table is just a list of sites. ELF instead
/// resolves `S + A`, with the addend `A` read from the site in REL form.
/// Each site's original word is therefore read back out of the sink,
/// decomposed into a target section plus offset, and zeroed; a symbol
/// synthesized at the target carries the address once the linker resolves
/// it.
///
/// The stream is a sequence of blocks, each headed by `(page_rva,
/// block_size)` and followed by 16-bit entries packing a type in the high
/// nibble and a page offset in the low 12 bits. A zero entry is trailing
/// padding and ends its block; a zero `page_rva` ends the stream.
pub(super) fn add_relocs<W: Read + Write + Seek>(
    data: &[u8],
    base_vaddr: u32,
    writer: &mut ElfWriter<W>,
) -> Result<()> {
    let mut rd = Cursor::new(data);
    loop {
        let page_rva = match rd.read_u32::<LittleEndian>() {
            Ok(page_rva) => page_rva,
            Err(_) => break, // end of section data
        };
        let block_size = match rd.read_u32::<LittleEndian>() {
            Ok(block_size) => block_size,
            Err(_) => break,
        };
        if page_rva == 0 {
            break;
        }
        let page_vaddr = base_vaddr + page_rva;

        let mut i = 0;
        while i < block_size.saturating_sub(8) {
            let entry = match rd.read_u16::<LittleEndian>() {
                Ok(entry) => entry,
                Err(_) => {
                    warn!("relocation block at rva {page_rva:#x} is truncated");
                    return Ok(());
                }
            };
            i += 2;
            if entry == 0 {
                break;
            }

            let kind = entry >> 12;
            let page_offset = entry & 0xfff;
            if kind != IMAGE_REL_BASED_HIGHLOW {
                warn!("unsupported relocation type {kind}");
                continue;
            }
            let site_vaddr = page_vaddr + u32::from(page_offset);

            let Some(site_shndx) = writer.section_containing_vaddr(site_vaddr) else {
                warn!("relocation site outside of any ELF section (vaddr {site_vaddr:#x})");
                continue;
            };
            let (site_addr, site_off) = {
                let site = &writer.sections()[site_shndx];
                (site.addr, site.off + (site_vaddr - site.addr))
            };

            // The site still holds the absolute address of its target.
            let target_vaddr = writer.read_u32_at(site_off)?;
            writer.zero_u32_at(site_off)?;

            let Some(target_shndx) = writer.section_containing_vaddr(target_vaddr) else {
                warn!("relocation target outside of any ELF section (vaddr {target_vaddr:#x})");
                continue;
            };
            let target_addr = writer.sections()[target_shndx].addr;

            let sym_ndx = writer.add_symbol(
                Elf32Sym {
                    value: target_vaddr - target_addr,
                    info: Elf32Sym::st_info(Elf32Sym::STB_GLOBAL, Elf32Sym::STT_NOTYPE),
                    other: Elf32Sym::STV_DEFAULT,
                    shndx: target_shndx as u16,
                    ..Default::default()
                },
                &format!("__pe_unk_{target_vaddr:x}"),
            );

            debug!(
                "reloc {:#x} ({}+{:#x}) -> {:#x} ({}+{:#x})",
                site_vaddr,
                writer.section_name(site_shndx),
                site_vaddr - site_addr,
                target_vaddr,
                writer.section_name(target_shndx),
                target_vaddr - target_addr,
            );

            writer.add_relocation(
                site_shndx,
                Elf32Rel {
                    off: site_vaddr - site_addr,
                    info: Elf32Rel::r_info(sym_ndx as u32, Elf32Rel::R_386_32),
                },
            );
        }
    }

    Ok(())
}
