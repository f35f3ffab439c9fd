// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::Clocked;

pub const NUM_REGISTERS: usize = 32;

/// The write port sampled on a clock edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterWrite {
    pub enable: bool,
    pub index: u8,
    pub data: u32,
}

impl RegisterWrite {
    pub const NONE: Self = Self {
        enable: false,
        index: 0,
        data: 0,
    };

    pub fn new(index: u8, data: u32) -> Self {
        Self {
            enable: true,
            index,
            data,
        }
    }
}

/// General purpose registers x0..x31. x0 is hardwired to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFile {
    x: [u32; NUM_REGISTERS],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::reset()
    }
}

impl RegisterFile {
    pub fn reset() -> Self {
        Self {
            x: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, index: u8) -> u32 {
        self.x[(index & 0x1F) as usize]
    }

    pub fn read_pair(&self, rs1: u8, rs2: u8) -> (u32, u32) {
        (self.read(rs1), self.read(rs2))
    }

    /// Debugger-side write outside the clocked path.
    pub(crate) fn poke(&mut self, index: u8, data: u32) {
        *self = self.tick(RegisterWrite::new(index, data));
    }
}

impl Clocked for RegisterFile {
    type Input = RegisterWrite;

    fn tick(&self, input: RegisterWrite) -> Self {
        let mut next = *self;
        let index = (input.index & 0x1F) as usize;
        if input.enable && index != 0 {
            next.x[index] = input.data;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_reads_zero() {
        let regs = RegisterFile::reset();
        for i in 0..4 {
            assert_eq!(regs.read(i), 0);
        }
    }

    #[test]
    fn test_write_holds_after_enable_drops() {
        let mut regs = RegisterFile::reset();
        regs = regs.tick(RegisterWrite::new(1, 0x1234_5678));
        assert_eq!(regs.read(1), 0x1234_5678);

        for _ in 0..3 {
            regs = regs.tick(RegisterWrite {
                enable: false,
                index: 1,
                data: 0xDEAD_BEEF,
            });
            assert_eq!(regs.read(1), 0x1234_5678);
        }
        assert_eq!(regs.read(0), 0);
    }

    #[test]
    fn test_x0_ignores_writes() {
        let regs = RegisterFile::reset().tick(RegisterWrite::new(0, 0xFFFF_FFFF));
        assert_eq!(regs.read(0), 0);
    }

    #[test]
    fn test_single_write_per_tick() {
        let regs = RegisterFile::reset().tick(RegisterWrite::new(5, 7));
        for i in 0..32u8 {
            let expected = if i == 5 { 7 } else { 0 };
            assert_eq!(regs.read(i), expected, "x{}", i);
        }
    }

    #[test]
    fn test_index_is_five_bits() {
        let regs = RegisterFile::reset().tick(RegisterWrite::new(33, 9));
        assert_eq!(regs.read(1), 9);
        assert_eq!(regs.read_pair(33, 0), (9, 0));
    }
}
