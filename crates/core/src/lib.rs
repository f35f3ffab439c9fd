// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod cpu;
pub mod decoder;
pub mod memory;
pub mod peripherals;

use std::any::Any;
use std::collections::HashSet;

pub use bus::{AccessWidth, BusOp, SystemBus, Transaction};
pub use cpu::{StepOutcome, TrapCause};


#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Unmapped bus address {0:#010x}")]
    Unmapped(u32),
    #[error("Access fault at {0:#010x}")]
    AccessFault(u32),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Storage that only changes on a clock edge.
///
/// `tick` is the next-state function: it takes the current state and the
/// inputs sampled this cycle and returns the state after the edge. Callers
/// own the single write path by assigning the result back exactly once per
/// simulated cycle.
pub trait Clocked: Sized {
    type Input;

    #[must_use]
    fn tick(&self, input: Self::Input) -> Self;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeripheralTickResult {
    pub irq: bool,
}

/// Trait representing a CPU architecture
pub trait Cpu: Send {
    fn reset(&mut self);
    fn step(&mut self, bus: &mut dyn Bus) -> SimResult<StepOutcome>;
    fn set_pc(&mut self, val: u32);
    fn get_pc(&self) -> u32;

    // Debug Access
    fn get_register(&self, id: u8) -> u32;
    fn set_register(&mut self, id: u8, val: u32);
    fn get_register_names(&self) -> Vec<String>;
}

/// Trait representing a memory-mapped peripheral.
///
/// Offsets are relative to the base of the window the peripheral is mapped at.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&mut self, offset: u32, width: AccessWidth) -> SimResult<u32>;
    fn write(&mut self, offset: u32, width: AccessWidth, value: u32) -> SimResult<()>;
    fn tick(&mut self) -> PeripheralTickResult {
        PeripheralTickResult::default()
    }
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing a system bus: one transaction per call, never split.
pub trait Bus {
    fn transact(&mut self, txn: Transaction) -> SimResult<u32>;

    /// Advances every target by one cycle and returns the pending `mip` lines.
    fn tick_peripherals(&mut self) -> u32;

    fn read_u8(&mut self, addr: u32) -> SimResult<u8> {
        Ok(self.transact(Transaction::read(addr, AccessWidth::Byte))? as u8)
    }

    fn read_u16(&mut self, addr: u32) -> SimResult<u16> {
        Ok(self.transact(Transaction::read(addr, AccessWidth::Half))? as u16)
    }

    fn read_u32(&mut self, addr: u32) -> SimResult<u32> {
        self.transact(Transaction::read(addr, AccessWidth::Word))
    }

    fn write_u8(&mut self, addr: u32, value: u8) -> SimResult<()> {
        self.transact(Transaction::write(addr, AccessWidth::Byte, value as u32))
            .map(|_| ())
    }

    fn write_u16(&mut self, addr: u32, value: u16) -> SimResult<()> {
        self.transact(Transaction::write(addr, AccessWidth::Half, value as u32))
            .map(|_| ())
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> SimResult<()> {
        self.transact(Transaction::write(addr, AccessWidth::Word, value))
            .map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint(u32),
    DebugPass,
    DebugFail,
    Trap(TrapCause),
    MaxStepsReached,
}

pub struct Machine<C: Cpu> {
    pub cpu: C,
    pub bus: SystemBus,

    // Debug state
    pub breakpoints: HashSet<u32>,
    pub total_cycles: u64,
    /// Stop `run` on any synchronous trap instead of entering the handler.
    pub stop_on_trap: bool,
}

impl<C: Cpu> Machine<C> {
    pub fn new(cpu: C, bus: SystemBus) -> Self {
        Self {
            cpu,
            bus,
            breakpoints: HashSet::new(),
            total_cycles: 0,
            stop_on_trap: false,
        }
    }

    pub fn load_firmware(&mut self, image: &memory::ProgramImage) -> SimResult<()> {
        self.bus.load_image(image)?;
        self.reset();
        self.cpu.set_pc(image.entry_point);
        tracing::info!("Firmware loaded, entry point {:#010x}", image.entry_point);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.cpu.reset();
        self.total_cycles = 0;
    }

    pub fn step(&mut self) -> SimResult<StepOutcome> {
        self.total_cycles += 1;
        self.cpu.step(&mut self.bus)
    }

    /// Steps until a stop condition holds; conditions are checked once per tick.
    pub fn run(&mut self, max_steps: Option<u64>) -> SimResult<StopReason> {
        let mut steps = 0u64;
        loop {
            if max_steps.is_some_and(|max| steps >= max) {
                return Ok(StopReason::MaxStepsReached);
            }

            let outcome = self.step()?;
            steps += 1;

            match self.bus.debug_status() {
                Some(peripherals::debug::DebugStatus::Pass) => return Ok(StopReason::DebugPass),
                Some(peripherals::debug::DebugStatus::Fail) => return Ok(StopReason::DebugFail),
                None => {}
            }

            if let StepOutcome::Trapped(cause) = outcome {
                if self.stop_on_trap && !cause.is_interrupt() {
                    return Ok(StopReason::Trap(cause));
                }
            }

            let pc = self.cpu.get_pc();
            if self.breakpoints.contains(&pc) {
                return Ok(StopReason::Breakpoint(pc));
            }
        }
    }
}
