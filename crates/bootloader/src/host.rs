// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::frame::{UploadHeader, READY_BANNER, UPLOAD_COMMAND, UPLOAD_FAILED, UPLOAD_OK};
use crate::transport::{read_line, Transport};
use crate::{read_error, BootloaderError, Result};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
pub const RESET_HOLD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    OptionalReset,
    SendCommand,
    SendHeader,
    SendPayload,
    AwaitVerdict,
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Pulse the run line and wait for the banner before sending anything.
    pub reset: bool,
    pub reset_hold: Duration,
    /// Wait for the target's `upload ok` / `upload failed` line.
    pub await_verdict: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            reset: false,
            reset_hold: RESET_HOLD,
            await_verdict: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub header: UploadHeader,
    /// `Some(true)` when the target confirmed, `None` when no verdict was awaited.
    pub confirmed: Option<bool>,
}

/// Host half of the upload protocol. One `step` performs one transition.
pub struct Uploader<T: Transport> {
    transport: T,
    image: Vec<u8>,
    header: UploadHeader,
    options: UploadOptions,
    state: HostState,
    confirmed: Option<bool>,
}

impl<T: Transport> Uploader<T> {
    pub fn new(transport: T, image: Vec<u8>, options: UploadOptions) -> Self {
        let header = UploadHeader::for_payload(&image);
        let state = if options.reset {
            HostState::OptionalReset
        } else {
            HostState::SendCommand
        };
        Self {
            transport,
            image,
            header,
            options,
            state,
            confirmed: None,
        }
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn header(&self) -> UploadHeader {
        self.header
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn step(&mut self) -> Result<HostState> {
        let next = match self.state {
            HostState::OptionalReset => {
                self.transport.set_run(false)?;
                std::thread::sleep(self.options.reset_hold);
                self.transport.set_run(true)?;

                let line =
                    read_line(&mut self.transport).map_err(|e| read_error(e, "bootloader banner"))?;
                if !line.contains(READY_BANNER) {
                    return Err(BootloaderError::MissingBanner { received: line });
                }
                debug!("Target ready: {:?}", line);
                HostState::SendCommand
            }
            HostState::SendCommand => {
                self.transport.write_all(UPLOAD_COMMAND)?;
                HostState::SendHeader
            }
            HostState::SendHeader => {
                info!(
                    "Uploading {} bytes, crc32 {:#010x}",
                    self.header.length, self.header.checksum
                );
                self.transport.write_all(&self.header.to_bytes())?;
                HostState::SendPayload
            }
            HostState::SendPayload => {
                self.transport.write_all(&self.image)?;
                self.transport.flush()?;
                if self.options.await_verdict {
                    HostState::AwaitVerdict
                } else {
                    HostState::Done
                }
            }
            HostState::AwaitVerdict => {
                let line =
                    read_line(&mut self.transport).map_err(|e| read_error(e, "upload verdict"))?;
                if line.contains(READY_BANNER) {
                    // Boot banner not consumed by a reset handshake
                    debug!("Skipping banner while awaiting verdict");
                    return Ok(self.state);
                }
                if line.starts_with(UPLOAD_OK) {
                    self.confirmed = Some(true);
                } else if let Some(reason) = line.strip_prefix(UPLOAD_FAILED) {
                    self.confirmed = Some(false);
                    let reason = reason.trim_start_matches(':').trim().to_string();
                    return Err(BootloaderError::Rejected(reason));
                } else {
                    return Err(BootloaderError::UnexpectedReply(line));
                }
                HostState::Done
            }
            HostState::Done => HostState::Done,
        };
        debug!("Uploader {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(next)
    }

    /// Steps until the upload is finished. Any failure ends the session.
    pub fn run(&mut self) -> Result<UploadReport> {
        while self.state != HostState::Done {
            self.step()?;
        }
        Ok(UploadReport {
            header: self.header,
            confirmed: self.confirmed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::frame;
    use crate::transport::MemoryTransport;
    use std::io::{Read, Write};

    fn fast_reset() -> UploadOptions {
        UploadOptions {
            reset: true,
            reset_hold: Duration::from_millis(1),
            await_verdict: false,
        }
    }

    #[test]
    fn test_upload_without_reset_sends_frame_then_payload() {
        let (host, mut target) = MemoryTransport::pair();
        let payload = vec![1u8, 2, 3, 4];
        let mut uploader = Uploader::new(host, payload.clone(), UploadOptions::default());
        let report = uploader.run().unwrap();
        assert_eq!(report.header.length, 4);
        assert_eq!(report.confirmed, None);

        let mut wire = Vec::new();
        let mut buf = [0u8; 64];
        while let Ok(n) = target.read(&mut buf) {
            wire.extend_from_slice(&buf[..n]);
        }
        let mut expected = frame(&payload);
        expected.extend_from_slice(&payload);
        assert_eq!(wire, expected);
    }

    #[test]
    fn test_missing_banner_sends_nothing() {
        let (host, target) = MemoryTransport::pair();
        let mut uploader = Uploader::new(host, vec![0; 16], fast_reset());
        let err = uploader.run().unwrap_err();
        assert!(matches!(err, BootloaderError::Timeout("bootloader banner")));
        assert_eq!(uploader.state(), HostState::OptionalReset);
        assert_eq!(target.pending_outbound(), 0);

        let host = uploader.into_transport();
        assert_eq!(host.run_history(), &[false, true]);
        assert_eq!(host.pending_outbound(), 0);
    }

    #[test]
    fn test_wrong_banner_is_fatal() {
        let (host, mut target) = MemoryTransport::pair();
        target.write_all(b"hello world\n").unwrap();
        let mut uploader = Uploader::new(host, vec![0; 16], fast_reset());
        let err = uploader.run().unwrap_err();
        assert!(matches!(err, BootloaderError::MissingBanner { .. }));
        assert_eq!(uploader.into_transport().pending_outbound(), 0);
    }

    #[test]
    fn test_rejected_verdict() {
        let (host, mut target) = MemoryTransport::pair();
        target
            .write_all(b"upload failed: checksum mismatch\n")
            .unwrap();
        let options = UploadOptions {
            await_verdict: true,
            ..UploadOptions::default()
        };
        let mut uploader = Uploader::new(host, vec![9; 4], options);
        match uploader.run() {
            Err(BootloaderError::Rejected(reason)) => assert_eq!(reason, "checksum mismatch"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_boot_banner_before_verdict_is_skipped() {
        let (host, mut target) = MemoryTransport::pair();
        target
            .write_all(b"bootloader running\nupload ok\n")
            .unwrap();
        let options = UploadOptions {
            await_verdict: true,
            ..UploadOptions::default()
        };
        let mut uploader = Uploader::new(host, vec![7; 8], options);
        let report = uploader.run().unwrap();
        assert_eq!(report.confirmed, Some(true));
        assert_eq!(uploader.state(), HostState::Done);
    }
}
