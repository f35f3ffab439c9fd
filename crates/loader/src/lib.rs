// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, bail, Context, Result};
use goblin::elf::header::{ELFCLASS32, EM_RISCV};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use orkarv_core::memory::ProgramImage;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

pub fn load_elf(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    load_elf_bytes(&buffer)
}

pub fn load_elf_bytes(buffer: &[u8]) -> Result<ProgramImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    if elf.header.e_machine != EM_RISCV || elf.header.e_ident[4] != ELFCLASS32 {
        bail!(
            "Not an RV32 ELF (machine {}, class {})",
            elf.header.e_machine,
            elf.header.e_ident[4]
        );
    }

    let entry = u32::try_from(elf.entry).context("ELF entry point is outside 32 bits")?;
    info!("ELF Entry Point: {:#x}", entry);
    let mut program_image = ProgramImage::new(entry);

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD {
            continue;
        }
        // Physical address (LMA) is where the bytes live before startup code runs
        let start_addr = u32::try_from(ph.p_paddr).context("Segment address is outside 32 bits")?;
        let size = ph.p_filesz as usize;
        let offset = ph.p_offset as usize;

        if size == 0 {
            continue;
        }

        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes, Offset={:#x}",
            start_addr, size, offset
        );

        let data = offset
            .checked_add(size)
            .and_then(|end| buffer.get(offset..end))
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;
        program_image.add_segment(start_addr, data.to_vec());
    }

    if program_image.segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    Ok(program_image)
}

/// A raw image placed at `base`; execution starts at its first byte.
pub fn load_binary_bytes(buffer: &[u8], base: u32) -> ProgramImage {
    let mut image = ProgramImage::new(base);
    image.add_segment(base, buffer.to_vec());
    info!("Flat binary: {} bytes at {:#x}", buffer.len(), base);
    image
}

/// Loads an ELF, or a flat binary at `base` when the file has no ELF magic.
pub fn load_firmware(path: &Path, base: u32) -> Result<ProgramImage> {
    let buffer =
        fs::read(path).with_context(|| format!("Failed to read firmware file: {:?}", path))?;
    if buffer.starts_with(ELF_MAGIC) {
        load_elf_bytes(&buffer)
    } else {
        Ok(load_binary_bytes(&buffer, base))
    }
}
