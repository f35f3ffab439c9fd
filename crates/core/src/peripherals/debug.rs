// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Test-status port: firmware writes here to end a run with pass or fail.

use crate::bus::AccessWidth;
use crate::{Peripheral, SimResult, SimulationError};

pub const PASS: u32 = 0x0;
pub const FAIL: u32 = 0x4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugStatus {
    Pass,
    Fail,
}

#[derive(Debug, Default)]
pub struct DebugPort {
    status: Option<DebugStatus>,
    code: u32,
}

impl DebugPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first verdict written; later writes do not overturn it.
    pub fn status(&self) -> Option<DebugStatus> {
        self.status
    }

    /// Value stored alongside the verdict (e.g. a failing test number).
    pub fn code(&self) -> u32 {
        self.code
    }
}

impl Peripheral for DebugPort {
    fn read(&mut self, offset: u32, _width: AccessWidth) -> SimResult<u32> {
        // Write-only
        Err(SimulationError::AccessFault(offset))
    }

    fn write(&mut self, offset: u32, _width: AccessWidth, value: u32) -> SimResult<()> {
        let status = match offset {
            PASS => DebugStatus::Pass,
            FAIL => DebugStatus::Fail,
            _ => return Err(SimulationError::AccessFault(offset)),
        };
        if self.status.is_none() {
            tracing::info!("Debug port: {:?} (code {:#x})", status, value);
            self.status = Some(status);
            self.code = value;
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
