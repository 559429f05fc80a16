use std::io::{Read, Seek, Write};

use byteorder::{ByteOrder, LittleEndian};
use log::{info, warn};

use crate::elf::{Elf32Rel, Elf32Sym, ElfWriter};
use crate::error::{Error, Result};
use crate::pe_image::PeImage;

/// One entry of the import directory table, 20 bytes on disk. The unused
/// timestamp and forwarder-chain words are skipped on read.
struct ImportDescriptor {
    original_first_thunk: u32,
    name: u32,
    first_thunk: u32,
}

/// Lifts the PE import table: every imported function becomes an undefined
/// global symbol plus an `R_386_32` relocation against its IAT slot in
/// `.data.idata`, leaving resolution to the host linker.
pub(super) fn add_imports<W: Read + Write + Seek>(
    image: &PeImage,
    writer: &mut ElfWriter<W>,
    idata_ndx: usize,
) -> Result<()> {
    let (dir_rva, _) = image.optional_header.import_table;
    let host = image
        .section_containing_rva(dir_rva)
        .ok_or(Error::ImportDirectoryNotMapped { rva: dir_rva })?;
    let host_rva = host.virtual_address;
    let data = image.section_data(host);
    let base_vaddr = image.image_base();
    let idata_addr = writer.sections()[idata_ndx].addr;

    // Descriptor array, terminated by a zero OriginalFirstThunk.
    let mut descriptors = Vec::new();
    let mut d = data
        .get((dir_rva - host_rva) as usize..)
        .ok_or(Error::ImportDirectoryNotMapped { rva: dir_rva })?;
    while d.len() >= 20 {
        let descriptor = ImportDescriptor {
            original_first_thunk: LittleEndian::read_u32(&d[0..4]),
            name: LittleEndian::read_u32(&d[12..16]),
            first_thunk: LittleEndian::read_u32(&d[16..20]),
        };
        d = &d[20..];
        if descriptor.original_first_thunk == 0 {
            break;
        }
        descriptors.push(descriptor);
    }

    for descriptor in &descriptors {
        let dll = read_cstr(data, descriptor.name.wrapping_sub(host_rva) as usize)
            .unwrap_or_default();

        let mut thunks = match descriptor
            .original_first_thunk
            .checked_sub(host_rva)
            .and_then(|off| data.get(off as usize..))
        {
            Some(thunks) => thunks,
            None => {
                warn!("import thunk array of {dll:?} lies outside its section");
                continue;
            }
        };

        // The live IAT slot the program reads the resolved address from.
        let mut target_vaddr = base_vaddr + descriptor.first_thunk;
        while thunks.len() >= 4 {
            let hint_rva = LittleEndian::read_u32(&thunks[0..4]);
            thunks = &thunks[4..];
            if hint_rva == 0 {
                break;
            }
            if hint_rva & 0x8000_0000 != 0 {
                warn!("ordinal-only import in {dll:?}, the fallback name will not resolve");
            }

            // Hint/name entry: a 2-byte ordinal hint, then the name.
            let name = read_cstr(data, (hint_rva.wrapping_sub(host_rva) as usize).wrapping_add(2))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("{target_vaddr:x}"));

            let sym_name = format!("{}_{}", dll.strip_suffix(".dll").unwrap_or(&dll), name);
            let sym_ndx = writer.add_symbol(
                Elf32Sym {
                    value: hint_rva,
                    info: Elf32Sym::st_info(Elf32Sym::STB_GLOBAL, Elf32Sym::STT_FUNC),
                    other: Elf32Sym::STV_DEFAULT,
                    shndx: Elf32Sym::SHN_UNDEF,
                    ..Default::default()
                },
                &sym_name,
            );

            writer.add_relocation(
                idata_ndx,
                Elf32Rel {
                    off: target_vaddr.wrapping_sub(idata_addr),
                    info: Elf32Rel::r_info(sym_ndx as u32, Elf32Rel::R_386_32),
                },
            );

            info!("import at {target_vaddr:#x}: {dll}!{name} as {sym_name}");
            target_vaddr += 4;
        }
    }

    Ok(())
}

/// Reads a null-terminated string out of `data` starting at `start`.
/// Returns `None` when `start` is out of range or no terminator follows.
fn read_cstr(data: &[u8], start: usize) -> Option<String> {
    let slice = data.get(start..)?;
    let end = slice.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&slice[..end]).ok().map(str::to_string)
}
