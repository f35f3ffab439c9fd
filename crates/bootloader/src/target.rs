// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::frame::{UploadHeader, HEADER_LEN, READY_BANNER, UPLOAD_FAILED, UPLOAD_OK};
use crate::transport::{read_line, Transport};
use crate::{read_error, BootloaderError, Result};
use orkarv_core::bus::SystemBus;
use orkarv_core::memory::ProgramImage;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Announce,
    AwaitCommand,
    ReadHeader,
    ReceivePayload,
    Verify,
    Committed,
    Rejected,
}

impl TargetState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Rejected)
    }
}

/// Target half of the upload protocol.
///
/// The payload is held aside until its checksum has been verified; RAM is
/// written only on the transition into `Committed`.
pub struct TargetSession<T: Transport> {
    transport: T,
    state: TargetState,
    load_addr: u32,
    capacity: u32,
    header: Option<UploadHeader>,
    payload: Vec<u8>,
}

impl<T: Transport> TargetSession<T> {
    pub fn new(transport: T, load_addr: u32, capacity: u32) -> Self {
        Self {
            transport,
            state: TargetState::Announce,
            load_addr,
            capacity,
            header: None,
            payload: Vec::new(),
        }
    }

    /// A session loading into the bus's RAM window.
    pub fn for_bus(transport: T, bus: &SystemBus) -> Result<Self> {
        let ram = bus.ram_region().ok_or(BootloaderError::NoRam)?;
        let capacity = u32::try_from(ram.size).unwrap_or(u32::MAX);
        Ok(Self::new(transport, ram.base, capacity))
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// The verified image, once committed.
    pub fn image(&self) -> Option<ProgramImage> {
        (self.state == TargetState::Committed).then(|| {
            let mut image = ProgramImage::new(self.load_addr);
            image.add_segment(self.load_addr, self.payload.clone());
            image
        })
    }

    fn reply(&mut self, line: &str) -> Result<()> {
        self.transport.write_all(line.as_bytes())?;
        self.transport.write_all(b"\n")?;
        self.transport.flush()?;
        Ok(())
    }

    fn reject(&mut self, err: BootloaderError) -> BootloaderError {
        warn!("Upload rejected: {}", err);
        let reason = match &err {
            BootloaderError::ChecksumMismatch { .. } => "checksum mismatch".to_string(),
            BootloaderError::ImageTooLarge { .. } => "image too large".to_string(),
            other => other.to_string(),
        };
        self.state = TargetState::Rejected;
        self.payload.clear();
        // The session has already failed; a lost reply does not change that.
        let _ = self.reply(&format!("{}: {}", UPLOAD_FAILED, reason));
        err
    }

    /// Performs one transition. Any error ends the session in `Rejected`.
    pub fn step(&mut self, bus: &mut SystemBus) -> Result<TargetState> {
        match self.advance(bus) {
            Ok(next) => {
                debug!("Target {:?} -> {:?}", self.state, next);
                self.state = next;
                Ok(next)
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    fn advance(&mut self, bus: &mut SystemBus) -> Result<TargetState> {
        let next = match self.state {
            TargetState::Announce => {
                self.reply(READY_BANNER)?;
                TargetState::AwaitCommand
            }
            TargetState::AwaitCommand => {
                let line =
                    read_line(&mut self.transport).map_err(|e| read_error(e, "upload command"))?;
                if line.starts_with("upload") {
                    TargetState::ReadHeader
                } else {
                    debug!("Ignoring line {:?}", line);
                    TargetState::AwaitCommand
                }
            }
            TargetState::ReadHeader => {
                let mut bytes = [0u8; HEADER_LEN];
                self.transport
                    .read_exact(&mut bytes)
                    .map_err(|e| read_error(e, "upload header"))?;
                let header = UploadHeader::from_bytes(bytes);
                if header.length > self.capacity {
                    return Err(BootloaderError::ImageTooLarge {
                        length: header.length,
                        capacity: self.capacity,
                    });
                }
                debug!("Header: {} bytes, crc32 {:#010x}", header.length, header.checksum);
                self.header = Some(header);
                TargetState::ReceivePayload
            }
            TargetState::ReceivePayload => {
                let length = self.header.map_or(0, |h| h.length) as usize;
                self.payload = vec![0; length];
                self.transport
                    .read_exact(&mut self.payload)
                    .map_err(|e| read_error(e, "payload"))?;
                TargetState::Verify
            }
            TargetState::Verify => {
                let expected = self.header.map_or(0, |h| h.checksum);
                let actual = crate::crc32(&self.payload);
                if actual != expected {
                    return Err(BootloaderError::ChecksumMismatch { expected, actual });
                }
                // All or nothing: a span leaving the RAM window writes no byte.
                bus.load_ram(self.load_addr, &self.payload)?;
                info!(
                    "Committed {} bytes at {:#010x}",
                    self.payload.len(),
                    self.load_addr
                );
                self.reply(UPLOAD_OK)?;
                TargetState::Committed
            }
            terminal @ (TargetState::Committed | TargetState::Rejected) => terminal,
        };
        Ok(next)
    }

    /// Steps until the image is committed. Returns the committed length.
    pub fn run(&mut self, bus: &mut SystemBus) -> Result<u32> {
        while !self.state.is_terminal() {
            self.step(bus)?;
        }
        match self.state {
            TargetState::Committed => Ok(self.payload.len() as u32),
            _ => Err(BootloaderError::Rejected("session already rejected".into())),
        }
    }
}
