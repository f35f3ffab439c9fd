// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::AccessWidth;
use crate::peripherals::{lane_read, lane_write};
use crate::{Peripheral, SimResult};

pub const DIRECTION: u32 = 0x0;
pub const OUTPUT: u32 = 0x4;
pub const INPUT: u32 = 0x8;

/// 32-pin GPIO bank. A set DIRECTION bit makes the pin an input.
#[derive(Debug, Default)]
pub struct GpioPort {
    direction: u32,
    output: u32,
    // Levels driven from outside the SoC
    external: u32,
}

impl GpioPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_external(&mut self, levels: u32) {
        self.external = levels;
    }

    /// Levels the SoC drives on its output pins; input pins read as 0.
    pub fn pins(&self) -> u32 {
        self.output & !self.direction
    }

    fn read_reg(&self, reg: u32) -> u32 {
        match reg {
            DIRECTION => self.direction,
            OUTPUT => self.output,
            INPUT => self.external & self.direction,
            _ => 0,
        }
    }
}

impl Peripheral for GpioPort {
    fn read(&mut self, offset: u32, width: AccessWidth) -> SimResult<u32> {
        Ok(lane_read(self.read_reg(offset & !3), offset, width))
    }

    fn write(&mut self, offset: u32, width: AccessWidth, value: u32) -> SimResult<()> {
        match offset & !3 {
            DIRECTION => self.direction = lane_write(self.direction, offset, width, value),
            OUTPUT => {
                self.output = lane_write(self.output, offset, width, value);
                tracing::trace!("GPIO pins -> {:#010x}", self.pins());
            }
            // INPUT is read-only
            _ => {}
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }
}
