// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::AccessWidth;
use crate::{Peripheral, PeripheralTickResult, SimResult};
use bitflags::bitflags;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub const RX: u32 = 0x0;
pub const TX: u32 = 0x4;
pub const CTRL: u32 = 0x8;
pub const STATUS: u32 = 0xC;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct Ctrl: u32 {
        const RXIE = 1 << 0;
        const TXIE = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct Status: u32 {
        const RXR = 1 << 0;
        const TXE = 1 << 1;
    }
}

/// Byte UART. The transmitter is always empty; received bytes queue until
/// firmware reads RX.
#[derive(Debug)]
pub struct Uart {
    ctrl: Ctrl,
    rx: VecDeque<u8>,
    sink: Option<Arc<Mutex<Vec<u8>>>>,
    echo_stdout: bool,
}

impl Default for Uart {
    fn default() -> Self {
        Self::new()
    }
}

impl Uart {
    pub fn new() -> Self {
        Self {
            ctrl: Ctrl::empty(),
            rx: VecDeque::new(),
            sink: None,
            echo_stdout: true,
        }
    }

    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>, echo_stdout: bool) {
        self.sink = sink;
        self.echo_stdout = echo_stdout;
    }

    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    pub fn status(&self) -> Status {
        let mut status = Status::TXE;
        if !self.rx.is_empty() {
            status |= Status::RXR;
        }
        status
    }

    fn push_tx(&mut self, value: u8) {
        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(value);
            }
        }

        if self.echo_stdout {
            let mut stdout = io::stdout();
            let _ = stdout.write_all(&[value]);
            let _ = stdout.flush();
        }
    }
}

impl Peripheral for Uart {
    fn read(&mut self, offset: u32, _width: AccessWidth) -> SimResult<u32> {
        Ok(match offset {
            RX => self.rx.pop_front().unwrap_or(0) as u32,
            CTRL => self.ctrl.bits(),
            STATUS => self.status().bits(),
            _ => 0,
        })
    }

    fn write(&mut self, offset: u32, _width: AccessWidth, value: u32) -> SimResult<()> {
        match offset {
            TX => self.push_tx(value as u8),
            CTRL => self.ctrl = Ctrl::from_bits_truncate(value),
            _ => {}
        }
        Ok(())
    }

    fn tick(&mut self) -> PeripheralTickResult {
        let rx_ready = self.ctrl.contains(Ctrl::RXIE) && !self.rx.is_empty();
        PeripheralTickResult {
            irq: rx_ready || self.ctrl.contains(Ctrl::TXIE),
        }
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uart_transmit_to_sink() {
        let mut uart = Uart::new();
        let sink = Arc::new(Mutex::new(Vec::new()));
        uart.set_sink(Some(sink.clone()), false);

        uart.write(TX, AccessWidth::Byte, b'O' as u32).unwrap();
        uart.write(TX, AccessWidth::Word, 0x100 | b'K' as u32).unwrap();
        // RX is not a transmit alias
        uart.write(RX, AccessWidth::Byte, b'X' as u32).unwrap();

        assert_eq!(sink.lock().unwrap().as_slice(), b"OK");
    }

    #[test]
    fn test_uart_receive_queue() {
        let mut uart = Uart::new();
        assert_eq!(uart.read(STATUS, AccessWidth::Word).unwrap(), Status::TXE.bits());

        uart.push_rx(b"hi");
        assert!(uart.status().contains(Status::RXR));
        assert_eq!(uart.read(RX, AccessWidth::Byte).unwrap(), b'h' as u32);
        assert_eq!(uart.read(RX, AccessWidth::Byte).unwrap(), b'i' as u32);
        assert!(!uart.status().contains(Status::RXR));
        assert_eq!(uart.read(RX, AccessWidth::Byte).unwrap(), 0);
    }

    #[test]
    fn test_uart_interrupt_enables() {
        let mut uart = Uart::new();
        uart.push_rx(b"x");
        assert!(!uart.tick().irq);

        uart.write(CTRL, AccessWidth::Word, Ctrl::RXIE.bits()).unwrap();
        assert!(uart.tick().irq);
        uart.read(RX, AccessWidth::Byte).unwrap();
        assert!(!uart.tick().irq);

        uart.write(CTRL, AccessWidth::Word, Ctrl::TXIE.bits()).unwrap();
        assert!(uart.tick().irq);
        assert_eq!(uart.read(CTRL, AccessWidth::Word).unwrap(), Ctrl::TXIE.bits());
    }
}
