// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::{AccessWidth, Transaction, RAM_BASE};
use crate::cpu::csr::{self, CsrBank, CsrInput, CsrOp};
use crate::cpu::registers::{RegisterFile, RegisterWrite};
use crate::decoder::riscv::{decode_rv32, DecodedInstruction, InstructionKind};
use crate::{Bus, Clocked, Cpu, SimResult};

/// Synchronous exception or interrupt that redirected control to `mtvec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    InstructionAddressMisaligned,
    InstructionAccessFault,
    IllegalInstruction,
    Breakpoint,
    LoadAddressMisaligned,
    LoadAccessFault,
    StoreAddressMisaligned,
    StoreAccessFault,
    EnvironmentCall,
    /// Asynchronous interrupt, carrying its `mip` bit number.
    Interrupt(u32),
}

impl TrapCause {
    pub fn mcause(self) -> u32 {
        match self {
            Self::InstructionAddressMisaligned => 0,
            Self::InstructionAccessFault => 1,
            Self::IllegalInstruction => 2,
            Self::Breakpoint => 3,
            Self::LoadAddressMisaligned => 4,
            Self::LoadAccessFault => 5,
            Self::StoreAddressMisaligned => 6,
            Self::StoreAccessFault => 7,
            Self::EnvironmentCall => 11,
            Self::Interrupt(n) => 0x8000_0000 | n,
        }
    }

    pub fn is_interrupt(self) -> bool {
        matches!(self, Self::Interrupt(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Retired,
    Trapped(TrapCause),
}

#[derive(Debug, Clone, Copy)]
struct Trap {
    cause: TrapCause,
    tval: u32,
}

impl Trap {
    fn new(cause: TrapCause, tval: u32) -> Self {
        Self { cause, tval }
    }
}

/// Everything an instruction changes, applied in one commit.
#[derive(Debug, Clone, Copy)]
struct Effect {
    write: RegisterWrite,
    csr: CsrOp,
    next_pc: u32,
}

#[derive(Debug, Clone)]
pub struct RiscV {
    pub regs: RegisterFile,
    pub csrs: CsrBank,
    pub pc: u32,
    pub reset_vector: u32,
}

impl Default for RiscV {
    fn default() -> Self {
        Self::new()
    }
}

impl RiscV {
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::reset(),
            csrs: CsrBank::reset(),
            pc: RAM_BASE,
            reset_vector: RAM_BASE,
        }
    }

    pub fn read_reg(&self, n: u8) -> u32 {
        self.regs.read(n)
    }

    pub fn read_csr(&self, addr: u16) -> Option<u32> {
        self.csrs.read(addr)
    }

    /// Debugger-side CSR write; bypasses the writable masks.
    pub fn poke_csr(&mut self, addr: u16, value: u32) {
        self.csrs.poke(addr, value);
    }

    fn take_trap(&mut self, cause: TrapCause, epc: u32, tval: u32, interrupts: u32) {
        tracing::debug!(
            "Trap {:?} (mcause={:#x}) at {:#010x}, tval={:#x}",
            cause,
            cause.mcause(),
            epc,
            tval
        );
        self.csrs = self.csrs.tick(CsrInput {
            op: CsrOp::Trap {
                cause: cause.mcause(),
                epc,
                tval,
            },
            interrupts,
            retired: false,
        });

        let mtvec = self.csrs.mtvec();
        let base = mtvec & !0b11;
        self.pc = match (mtvec & 0b11, cause) {
            (1, TrapCause::Interrupt(n)) => base.wrapping_add(4 * n),
            _ => base,
        };
    }

    fn jump(&self, target: u32, write: RegisterWrite) -> Result<Effect, Trap> {
        if target & 0b11 != 0 {
            return Err(Trap::new(TrapCause::InstructionAddressMisaligned, target));
        }
        Ok(Effect {
            write,
            csr: CsrOp::None,
            next_pc: target,
        })
    }

    fn load(&self, bus: &mut dyn Bus, addr: u32, width: AccessWidth) -> Result<u32, Trap> {
        if addr % width.bytes() != 0 {
            return Err(Trap::new(TrapCause::LoadAddressMisaligned, addr));
        }
        bus.transact(Transaction::read(addr, width))
            .map_err(|_| Trap::new(TrapCause::LoadAccessFault, addr))
    }

    fn store(
        &self,
        bus: &mut dyn Bus,
        addr: u32,
        width: AccessWidth,
        value: u32,
    ) -> Result<(), Trap> {
        if addr % width.bytes() != 0 {
            return Err(Trap::new(TrapCause::StoreAddressMisaligned, addr));
        }
        bus.transact(Transaction::write(addr, width, value))
            .map(|_| ())
            .map_err(|_| Trap::new(TrapCause::StoreAccessFault, addr))
    }

    fn execute(
        &self,
        inst: &DecodedInstruction,
        word: u32,
        bus: &mut dyn Bus,
    ) -> Result<Effect, Trap> {
        use InstructionKind::*;

        let pc = self.pc;
        let next_pc = pc.wrapping_add(4);
        let (a, b) = self.regs.read_pair(inst.rs1, inst.rs2);
        let imm = inst.imm;
        let illegal = Trap::new(TrapCause::IllegalInstruction, word);

        let writeback = |value: u32| Effect {
            write: RegisterWrite::new(inst.rd, value),
            csr: CsrOp::None,
            next_pc,
        };
        let nothing = Effect {
            write: RegisterWrite::NONE,
            csr: CsrOp::None,
            next_pc,
        };
        let branch = |taken: bool| {
            if taken {
                self.jump(pc.wrapping_add(imm), RegisterWrite::NONE)
            } else {
                Ok(nothing)
            }
        };

        let effect = match inst.kind {
            Lui => writeback(imm),
            Auipc => writeback(pc.wrapping_add(imm)),
            Jal => self.jump(pc.wrapping_add(imm), RegisterWrite::new(inst.rd, next_pc))?,
            Jalr => self.jump(
                a.wrapping_add(imm) & !1,
                RegisterWrite::new(inst.rd, next_pc),
            )?,

            Beq => branch(a == b)?,
            Bne => branch(a != b)?,
            Blt => branch((a as i32) < (b as i32))?,
            Bge => branch((a as i32) >= (b as i32))?,
            Bltu => branch(a < b)?,
            Bgeu => branch(a >= b)?,

            Lb => {
                let v = self.load(bus, a.wrapping_add(imm), AccessWidth::Byte)?;
                writeback(v as u8 as i8 as i32 as u32)
            }
            Lh => {
                let v = self.load(bus, a.wrapping_add(imm), AccessWidth::Half)?;
                writeback(v as u16 as i16 as i32 as u32)
            }
            Lw => writeback(self.load(bus, a.wrapping_add(imm), AccessWidth::Word)?),
            Lbu => writeback(self.load(bus, a.wrapping_add(imm), AccessWidth::Byte)? & 0xFF),
            Lhu => writeback(self.load(bus, a.wrapping_add(imm), AccessWidth::Half)? & 0xFFFF),

            Sb => {
                self.store(bus, a.wrapping_add(imm), AccessWidth::Byte, b & 0xFF)?;
                nothing
            }
            Sh => {
                self.store(bus, a.wrapping_add(imm), AccessWidth::Half, b & 0xFFFF)?;
                nothing
            }
            Sw => {
                self.store(bus, a.wrapping_add(imm), AccessWidth::Word, b)?;
                nothing
            }

            Addi => writeback(a.wrapping_add(imm)),
            Slti => writeback(((a as i32) < (imm as i32)) as u32),
            Sltiu => writeback((a < imm) as u32),
            Xori => writeback(a ^ imm),
            Ori => writeback(a | imm),
            Andi => writeback(a & imm),
            Slli => writeback(a << inst.shamt()),
            Srli => writeback(a >> inst.shamt()),
            Srai => writeback(((a as i32) >> inst.shamt()) as u32),

            Add => writeback(a.wrapping_add(b)),
            Sub => writeback(a.wrapping_sub(b)),
            Sll => writeback(a << (b & 0x1F)),
            Slt => writeback(((a as i32) < (b as i32)) as u32),
            Sltu => writeback((a < b) as u32),
            Xor => writeback(a ^ b),
            Srl => writeback(a >> (b & 0x1F)),
            Sra => writeback(((a as i32) >> (b & 0x1F)) as u32),
            Or => writeback(a | b),
            And => writeback(a & b),

            // Single hart, in-order memory: ordering and hints are no-ops.
            Fence | FenceTso | Pause | Wfi => nothing,

            Ecall => return Err(Trap::new(TrapCause::EnvironmentCall, 0)),
            Ebreak => return Err(Trap::new(TrapCause::Breakpoint, pc)),
            Mret => Effect {
                write: RegisterWrite::NONE,
                csr: CsrOp::Return,
                next_pc: self.csrs.mepc(),
            },

            Csrrw | Csrrs | Csrrc | Csrrwi | Csrrsi | Csrrci => {
                let addr = inst.csr();
                let old = self.csrs.read(addr).ok_or(illegal)?;
                let src = match inst.kind {
                    Csrrwi | Csrrsi | Csrrci => inst.uimm(),
                    _ => a,
                };
                // Set/clear forms with a zero source field must not write.
                let new = match inst.kind {
                    Csrrw | Csrrwi => Some(src),
                    Csrrs | Csrrsi => (inst.rs1 != 0).then_some(old | src),
                    _ => (inst.rs1 != 0).then_some(old & !src),
                };
                if new.is_some() && csr::is_read_only(addr) {
                    return Err(illegal);
                }
                Effect {
                    write: RegisterWrite::new(inst.rd, old),
                    csr: new.map_or(CsrOp::None, |data| CsrOp::Write { addr, data }),
                    next_pc,
                }
            }

            Unknown => {
                tracing::warn!("Illegal instruction {:#010x} at {:#010x}", word, pc);
                return Err(illegal);
            }
        };
        Ok(effect)
    }
}

impl Cpu for RiscV {
    fn reset(&mut self) {
        self.regs = RegisterFile::reset();
        self.csrs = CsrBank::reset();
        self.pc = self.reset_vector;
    }

    fn step(&mut self, bus: &mut dyn Bus) -> SimResult<StepOutcome> {
        let interrupts = bus.tick_peripherals();
        if let Some(irq) = self.csrs.pending_interrupt(interrupts) {
            let cause = TrapCause::Interrupt(irq);
            self.take_trap(cause, self.pc, 0, interrupts);
            return Ok(StepOutcome::Trapped(cause));
        }

        let pc = self.pc;
        if pc & 0b11 != 0 {
            let cause = TrapCause::InstructionAddressMisaligned;
            self.take_trap(cause, pc, pc, interrupts);
            return Ok(StepOutcome::Trapped(cause));
        }

        let word = match bus.read_u32(pc) {
            Ok(word) => word,
            Err(e) => {
                tracing::warn!("Instruction fetch failed: {}", e);
                let cause = TrapCause::InstructionAccessFault;
                self.take_trap(cause, pc, pc, interrupts);
                return Ok(StepOutcome::Trapped(cause));
            }
        };

        let inst = decode_rv32(word);
        tracing::debug!("PC={:#010x}, Op={:#010x}, {}", pc, word, inst);

        match self.execute(&inst, word, bus) {
            Ok(effect) => {
                self.regs = self.regs.tick(effect.write);
                self.csrs = self.csrs.tick(CsrInput {
                    op: effect.csr,
                    interrupts,
                    retired: true,
                });
                self.pc = effect.next_pc;
                Ok(StepOutcome::Retired)
            }
            Err(trap) => {
                self.take_trap(trap.cause, pc, trap.tval, interrupts);
                Ok(StepOutcome::Trapped(trap.cause))
            }
        }
    }

    fn set_pc(&mut self, val: u32) {
        self.pc = val;
    }

    fn get_pc(&self) -> u32 {
        self.pc
    }

    fn get_register(&self, id: u8) -> u32 {
        match id {
            0..=31 => self.regs.read(id),
            32 => self.pc,
            _ => 0,
        }
    }

    fn set_register(&mut self, id: u8, val: u32) {
        match id {
            0..=31 => self.regs.poke(id, val),
            32 => self.pc = val,
            _ => {}
        }
    }

    fn get_register_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..32).map(|i| format!("x{}", i)).collect();
        names.push("pc".to_string());
        names
    }
}
