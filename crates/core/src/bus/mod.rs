// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod router;

pub use router::{BusRouter, MapError, Region, Route, TargetId};

use crate::cpu::csr::MIP_MEIP;
use crate::memory::{LinearMemory, ProgramImage};
use crate::peripherals::debug::{DebugPort, DebugStatus};
use crate::peripherals::gpio::GpioPort;
use crate::peripherals::uart::Uart;
use crate::{Bus, Peripheral, PeripheralTickResult, SimResult, SimulationError};
use anyhow::Context;
use orkarv_config::{DeviceKind, MemorySpec};
use std::sync::{Arc, Mutex};

pub const RAM_BASE: u32 = 0x0100_0000;
pub const RAM_SIZE: u64 = 64 * 1024;
pub const GPIO_BASE: u32 = 0x0200_0000;
pub const UART_BASE: u32 = 0x0201_0000;
pub const PERIPHERAL_WINDOW: u64 = 0x100;
pub const DEBUG_BASE: u32 = 0x0300_0000;
pub const DEBUG_WINDOW: u64 = 0x8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
    Byte,
    Half,
    Word,
}

impl AccessWidth {
    pub fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
        }
    }

    pub fn mask(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Half => 0xFFFF,
            Self::Word => 0xFFFF_FFFF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Read(AccessWidth),
    Write(AccessWidth, u32),
}

/// One routed access. The router forwards it whole: never split, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub addr: u32,
    pub op: BusOp,
}

impl Transaction {
    pub fn read(addr: u32, width: AccessWidth) -> Self {
        Self {
            addr,
            op: BusOp::Read(width),
        }
    }

    pub fn write(addr: u32, width: AccessWidth, data: u32) -> Self {
        Self {
            addr,
            op: BusOp::Write(width, data),
        }
    }
}

/// A slave behind the crossbar.
#[derive(Debug)]
pub enum Target {
    Ram(LinearMemory),
    Uart(Uart),
    Gpio(GpioPort),
    Debug(DebugPort),
    Device(Box<dyn Peripheral>),
}

impl Target {
    fn peripheral(&mut self) -> Option<&mut dyn Peripheral> {
        match self {
            Self::Ram(_) => None,
            Self::Uart(p) => Some(p),
            Self::Gpio(p) => Some(p),
            Self::Debug(p) => Some(p),
            Self::Device(p) => Some(p.as_mut()),
        }
    }

    /// Performs `op` at a region-relative offset.
    fn transact(&mut self, offset: u32, op: BusOp) -> SimResult<u32> {
        if let Self::Ram(mem) = self {
            return match op {
                BusOp::Read(width) => mem
                    .read(offset, width)
                    .ok_or(SimulationError::AccessFault(offset)),
                BusOp::Write(width, data) => {
                    if mem.write(offset, width, data) {
                        Ok(0)
                    } else {
                        Err(SimulationError::AccessFault(offset))
                    }
                }
            };
        }

        let Some(dev) = self.peripheral() else {
            return Err(SimulationError::AccessFault(offset));
        };
        match op {
            BusOp::Read(width) => dev.read(offset, width),
            BusOp::Write(width, data) => dev.write(offset, width, data).map(|_| 0),
        }
    }

    fn tick(&mut self) -> PeripheralTickResult {
        self.peripheral().map(|p| p.tick()).unwrap_or_default()
    }
}

pub struct BusEntry {
    pub name: String,
    pub base: u32,
    pub size: u64,
    pub target: Target,
}

impl BusEntry {
    pub fn new(name: impl Into<String>, base: u32, size: u64, target: Target) -> Self {
        Self {
            name: name.into(),
            base,
            size,
            target,
        }
    }
}

/// The crossbar: a router plus the targets it resolves to.
#[derive(Debug)]
pub struct SystemBus {
    router: BusRouter,
    // Indexed by TargetId; only ever replaced together with the router.
    targets: Vec<Target>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    /// The reference SoC layout: RAM, GPIO, UART and the debug port.
    pub fn new() -> Self {
        // Already sorted and disjoint
        let regions = vec![
            Region::new("ram", RAM_BASE, RAM_SIZE, TargetId(0)),
            Region::new("gpio", GPIO_BASE, PERIPHERAL_WINDOW, TargetId(1)),
            Region::new("uart", UART_BASE, PERIPHERAL_WINDOW, TargetId(2)),
            Region::new("debug", DEBUG_BASE, DEBUG_WINDOW, TargetId(3)),
        ];
        let targets = vec![
            Target::Ram(LinearMemory::new(RAM_SIZE as usize)),
            Target::Gpio(GpioPort::new()),
            Target::Uart(Uart::new()),
            Target::Debug(DebugPort::new()),
        ];
        Self {
            router: BusRouter::presorted(regions),
            targets,
        }
    }

    pub fn from_entries(entries: Vec<BusEntry>) -> Result<Self, MapError> {
        let mut regions = Vec::with_capacity(entries.len());
        let mut targets = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            regions.push(Region::new(entry.name, entry.base, entry.size, TargetId(i)));
            targets.push(entry.target);
        }
        Ok(Self {
            router: BusRouter::build(regions)?,
            targets,
        })
    }

    pub fn from_spec(spec: &MemorySpec) -> anyhow::Result<Self> {
        let slaves = spec.resolved_slaves()?;

        let mut entries = Vec::with_capacity(slaves.len());
        for slave in slaves {
            let target = match slave.device {
                Some(DeviceKind::Ram) => Target::Ram(LinearMemory::new(slave.size as usize)),
                Some(DeviceKind::Uart) => Target::Uart(Uart::new()),
                Some(DeviceKind::Gpio) => Target::Gpio(GpioPort::new()),
                Some(DeviceKind::Debug) => Target::Debug(DebugPort::new()),
                None => {
                    tracing::warn!(
                        "Slave '{}' has no supported device kind, leaving it unmapped",
                        slave.name
                    );
                    continue;
                }
            };
            let base = u32::try_from(slave.base)
                .with_context(|| format!("Slave '{}' base is outside 32 bits", slave.name))?;
            entries.push(BusEntry::new(slave.name, base, slave.size, target));
        }

        let bus = Self::from_entries(entries).context("Failed to build bus router")?;
        tracing::info!(
            "SoC '{}' bus: {} targets",
            spec.soc.name,
            bus.targets.len()
        );
        Ok(bus)
    }

    pub fn router(&self) -> &BusRouter {
        &self.router
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Targets can be reached and mutated but not added or removed.
    pub fn targets_mut(&mut self) -> &mut [Target] {
        &mut self.targets
    }

    /// The first RAM window, which is where images are loaded.
    pub fn ram_region(&self) -> Option<&Region> {
        self.router
            .regions()
            .iter()
            .find(|r| matches!(self.targets[r.target.0], Target::Ram(_)))
    }

    pub fn load_image(&mut self, image: &ProgramImage) -> SimResult<()> {
        for segment in &image.segments {
            let route = self.router.route(segment.start_addr)?;
            if let Target::Ram(mem) = &mut self.targets[route.target.0] {
                if !mem.load(route.offset, &segment.data) {
                    return Err(SimulationError::AccessFault(segment.start_addr));
                }
            } else {
                for (i, byte) in segment.data.iter().enumerate() {
                    self.write_u8(segment.start_addr.wrapping_add(i as u32), *byte)?;
                }
            }
            tracing::debug!(
                "Loaded {} bytes at {:#010x}",
                segment.data.len(),
                segment.start_addr
            );
        }
        Ok(())
    }

    /// Copies `bytes` into the RAM window holding `addr`. Nothing is written
    /// unless the whole span lies inside that one window.
    pub fn load_ram(&mut self, addr: u32, bytes: &[u8]) -> SimResult<()> {
        let route = self.router.route(addr)?;
        if let Target::Ram(mem) = &mut self.targets[route.target.0] {
            if mem.load(route.offset, bytes) {
                return Ok(());
            }
        }
        Err(SimulationError::AccessFault(addr))
    }

    pub fn debug_status(&self) -> Option<DebugStatus> {
        self.targets.iter().find_map(|t| match t {
            Target::Debug(port) => port.status(),
            _ => None,
        })
    }

    /// Attach a UART TX capture sink to any UARTs on this bus.
    ///
    /// When `echo_stdout` is false, UART writes will no longer be printed to stdout.
    pub fn attach_uart_tx_sink(&mut self, sink: Arc<Mutex<Vec<u8>>>, echo_stdout: bool) {
        for target in &mut self.targets {
            if let Some(uart) = Self::as_uart(target) {
                uart.set_sink(Some(sink.clone()), echo_stdout);
            }
        }
    }

    /// Queues bytes on the first UART's receiver.
    pub fn push_uart_rx(&mut self, bytes: &[u8]) -> bool {
        match self.targets.iter_mut().find_map(Self::as_uart) {
            Some(uart) => {
                uart.push_rx(bytes);
                true
            }
            None => false,
        }
    }

    fn as_uart(target: &mut Target) -> Option<&mut Uart> {
        match target {
            Target::Uart(uart) => Some(uart),
            Target::Device(dev) => dev.as_any_mut()?.downcast_mut::<Uart>(),
            _ => None,
        }
    }
}

impl Bus for SystemBus {
    fn transact(&mut self, txn: Transaction) -> SimResult<u32> {
        let route = match self.router.route(txn.addr) {
            Ok(route) => route,
            Err(e) => {
                tracing::warn!("{:?} to unmapped address {:#010x}", txn.op, txn.addr);
                return Err(e);
            }
        };
        tracing::trace!("{:?} @ {:#010x} -> {:?}", txn.op, txn.addr, route);
        self.targets[route.target.0]
            .transact(route.offset, txn.op)
            .map_err(|_| SimulationError::AccessFault(txn.addr))
    }

    fn tick_peripherals(&mut self) -> u32 {
        let mut irq = false;
        for target in &mut self.targets {
            irq |= target.tick().irq;
        }
        if irq {
            MIP_MEIP
        } else {
            0
        }
    }
}
