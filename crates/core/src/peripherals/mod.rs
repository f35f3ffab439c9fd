// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod debug;
pub mod gpio;
pub mod uart;

use crate::bus::AccessWidth;

/// Extracts the byte lane(s) an access at `offset` sees in a 32-bit register.
pub(crate) fn lane_read(reg: u32, offset: u32, width: AccessWidth) -> u32 {
    (reg >> ((offset & 3) * 8)) & width.mask()
}

/// Merges a narrow write into a 32-bit register, leaving other lanes intact.
pub(crate) fn lane_write(reg: u32, offset: u32, width: AccessWidth, value: u32) -> u32 {
    let shift = (offset & 3) * 8;
    let mask = width.mask() << shift;
    (reg & !mask) | ((value << shift) & mask)
}
