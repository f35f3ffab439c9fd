// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Machine-mode control and status registers.
//!
//! The bank lives in its own 12-bit address space and follows the same
//! discipline as the register file: reads are combinational, and all state
//! changes happen in one [`Clocked::tick`] per cycle driven by a single
//! [`CsrOp`].

use crate::Clocked;

pub const MSTATUS: u16 = 0x300;
pub const MISA: u16 = 0x301;
pub const MIE: u16 = 0x304;
pub const MTVEC: u16 = 0x305;
pub const MSCRATCH: u16 = 0x340;
pub const MEPC: u16 = 0x341;
pub const MCAUSE: u16 = 0x342;
pub const MTVAL: u16 = 0x343;
pub const MIP: u16 = 0x344;
pub const MCYCLE: u16 = 0xB00;
pub const MINSTRET: u16 = 0xB02;
pub const MVENDORID: u16 = 0xF11;
pub const MARCHID: u16 = 0xF12;
pub const MIMPID: u16 = 0xF13;
pub const MHARTID: u16 = 0xF14;

pub const MSTATUS_MIE: u32 = 1 << 3;
pub const MSTATUS_MPIE: u32 = 1 << 7;
pub const MSTATUS_MPP: u32 = 0b11 << 11;

pub const MIP_MSIP: u32 = 1 << 3;
pub const MIP_MTIP: u32 = 1 << 7;
pub const MIP_MEIP: u32 = 1 << 11;
const MIP_LINES: u32 = MIP_MSIP | MIP_MTIP | MIP_MEIP;

// MXL=1 (32-bit), extension I
const MISA_RV32I: u32 = 0x4000_0100;

#[derive(Debug, Clone, Copy)]
pub struct CsrSpec {
    pub name: &'static str,
    pub addr: u16,
    pub reset: u32,
    /// Bits software may change. Zero means writes are accepted and ignored.
    pub writable: u32,
}

#[rustfmt::skip]
pub const CSR_TABLE: [CsrSpec; 15] = [
    CsrSpec { name: "mstatus", addr: MSTATUS, reset: MSTATUS_MPP, writable: MSTATUS_MIE | MSTATUS_MPIE },
    CsrSpec { name: "misa", addr: MISA, reset: MISA_RV32I, writable: 0 },
    CsrSpec { name: "mie", addr: MIE, reset: 0, writable: MIP_LINES },
    CsrSpec { name: "mtvec", addr: MTVEC, reset: 0, writable: 0xFFFF_FFFD },
    CsrSpec { name: "mscratch", addr: MSCRATCH, reset: 0, writable: 0xFFFF_FFFF },
    CsrSpec { name: "mepc", addr: MEPC, reset: 0, writable: 0xFFFF_FFFC },
    CsrSpec { name: "mcause", addr: MCAUSE, reset: 0, writable: 0xFFFF_FFFF },
    CsrSpec { name: "mtval", addr: MTVAL, reset: 0, writable: 0xFFFF_FFFF },
    CsrSpec { name: "mip", addr: MIP, reset: 0, writable: 0 },
    CsrSpec { name: "mcycle", addr: MCYCLE, reset: 0, writable: 0xFFFF_FFFF },
    CsrSpec { name: "minstret", addr: MINSTRET, reset: 0, writable: 0xFFFF_FFFF },
    CsrSpec { name: "mvendorid", addr: MVENDORID, reset: 0, writable: 0 },
    CsrSpec { name: "marchid", addr: MARCHID, reset: 0, writable: 0 },
    CsrSpec { name: "mimpid", addr: MIMPID, reset: 0, writable: 0 },
    CsrSpec { name: "mhartid", addr: MHARTID, reset: 0, writable: 0 },
];

fn slot(addr: u16) -> Option<usize> {
    CSR_TABLE.iter().position(|spec| spec.addr == addr)
}

/// Addresses with bits [11:10] set are read-only by encoding.
pub fn is_read_only(addr: u16) -> bool {
    (addr >> 10) & 0b11 == 0b11
}

/// The single transaction the bank accepts per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsrOp {
    #[default]
    None,
    Write {
        addr: u16,
        data: u32,
    },
    Trap {
        cause: u32,
        epc: u32,
        tval: u32,
    },
    Return,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsrInput {
    pub op: CsrOp,
    /// Interrupt lines sampled this cycle, in `mip` bit positions.
    pub interrupts: u32,
    pub retired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrBank {
    values: [u32; CSR_TABLE.len()],
}

impl Default for CsrBank {
    fn default() -> Self {
        Self::reset()
    }
}

impl CsrBank {
    pub fn reset() -> Self {
        let mut values = [0; CSR_TABLE.len()];
        for (value, spec) in values.iter_mut().zip(CSR_TABLE.iter()) {
            *value = spec.reset;
        }
        Self { values }
    }

    /// `None` for addresses this hart does not implement.
    pub fn read(&self, addr: u16) -> Option<u32> {
        slot(addr).map(|i| self.values[i])
    }

    pub fn is_implemented(addr: u16) -> bool {
        slot(addr).is_some()
    }

    fn get(&self, addr: u16) -> u32 {
        self.read(addr).unwrap_or(0)
    }

    fn set(&mut self, addr: u16, value: u32) {
        if let Some(i) = slot(addr) {
            self.values[i] = value;
        }
    }

    pub fn mstatus(&self) -> u32 {
        self.get(MSTATUS)
    }

    pub fn mtvec(&self) -> u32 {
        self.get(MTVEC)
    }

    pub fn mepc(&self) -> u32 {
        self.get(MEPC)
    }

    /// Highest-priority enabled interrupt among `lines`, as its cause number.
    ///
    /// Priority is MEI > MSI > MTI, as in the privileged architecture.
    pub fn pending_interrupt(&self, lines: u32) -> Option<u32> {
        if self.mstatus() & MSTATUS_MIE == 0 {
            return None;
        }
        let pending = lines & self.get(MIE) & MIP_LINES;
        [11u32, 3, 7]
            .into_iter()
            .find(|&bit| pending & (1u32 << bit) != 0)
    }

    /// Debugger-side write that bypasses the writable mask.
    pub(crate) fn poke(&mut self, addr: u16, value: u32) {
        self.set(addr, value);
    }
}

impl Clocked for CsrBank {
    type Input = CsrInput;

    fn tick(&self, input: CsrInput) -> Self {
        let mut next = *self;

        next.set(MCYCLE, self.get(MCYCLE).wrapping_add(1));
        if input.retired {
            next.set(MINSTRET, self.get(MINSTRET).wrapping_add(1));
        }
        next.set(MIP, input.interrupts & MIP_LINES);

        match input.op {
            CsrOp::None => {}
            CsrOp::Write { addr, data } => {
                if let Some(i) = slot(addr) {
                    if !is_read_only(addr) {
                        let mask = CSR_TABLE[i].writable;
                        next.values[i] = (next.values[i] & !mask) | (data & mask);
                    }
                }
            }
            CsrOp::Trap { cause, epc, tval } => {
                next.set(MEPC, epc & !0b11);
                next.set(MCAUSE, cause);
                next.set(MTVAL, tval);
                let mstatus = self.mstatus();
                let mut status = mstatus & !(MSTATUS_MIE | MSTATUS_MPIE);
                if mstatus & MSTATUS_MIE != 0 {
                    status |= MSTATUS_MPIE;
                }
                next.set(MSTATUS, status | MSTATUS_MPP);
            }
            CsrOp::Return => {
                let mstatus = self.mstatus();
                let mut status = (mstatus & !MSTATUS_MIE) | MSTATUS_MPIE;
                if mstatus & MSTATUS_MPIE != 0 {
                    status |= MSTATUS_MIE;
                }
                next.set(MSTATUS, status);
            }
        }
        next
    }
}
