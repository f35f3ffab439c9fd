// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Serial firmware upload.
//!
//! The host sends `"upload\n"`, an 8-byte header (little-endian length, then
//! CRC-32 of the payload) and the payload itself. The target only writes the
//! image into RAM once the recomputed checksum matches the header.

pub mod checksum;
pub mod frame;
pub mod host;
pub mod target;
pub mod transport;

pub use checksum::crc32;
pub use frame::{frame, UploadHeader, READY_BANNER, UPLOAD_COMMAND};
pub use host::{HostState, UploadOptions, UploadReport, Uploader};
pub use target::{TargetSession, TargetState};
pub use transport::{MemoryTransport, SerialTransport, Transport};

use orkarv_core::SimulationError;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum BootloaderError {
    #[error("bootloader banner not received (got {received:?})")]
    MissingBanner { received: String },
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    #[error("checksum mismatch: header says {expected:#010x}, payload is {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("image of {length} bytes does not fit in {capacity} bytes of RAM")]
    ImageTooLarge { length: u32, capacity: u32 },
    #[error("target rejected the upload: {0}")]
    Rejected(String),
    #[error("unexpected reply from target: {0:?}")]
    UnexpectedReply(String),
    #[error("bus error while committing image: {0}")]
    Bus(#[from] SimulationError),
    #[error("bus has no RAM region to load into")]
    NoRam,
}

pub type Result<T> = std::result::Result<T, BootloaderError>;

/// Turns a read timeout into the protocol-level error naming what was awaited.
pub(crate) fn read_error(err: io::Error, awaiting: &'static str) -> BootloaderError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => BootloaderError::Timeout(awaiting),
        _ => BootloaderError::Io(err),
    }
}
