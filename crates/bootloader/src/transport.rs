// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Longest line either side will buffer while waiting for `\n`.
pub const MAX_LINE: usize = 256;

/// A byte stream to the other side plus its run (reset) line.
pub trait Transport: Read + Write {
    /// Drives the run line. `false` holds the target in reset.
    fn set_run(&mut self, asserted: bool) -> io::Result<()>;
}

/// Reads one `\n`-terminated line, without the terminator or a trailing `\r`.
pub fn read_line<R: Read + ?Sized>(reader: &mut R) -> io::Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if reader.read(&mut byte)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        if byte[0] == b'\n' {
            break;
        }
        if line.len() == MAX_LINE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
        }
        line.push(byte[0]);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Host side of a real serial link; DTR is wired to the target's run line.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> io::Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(io::Error::from)?;
        tracing::info!("Opened {} at {} baud", path, baud_rate);
        Ok(Self { port })
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn set_run(&mut self, asserted: bool) -> io::Result<()> {
        self.port
            .write_data_terminal_ready(asserted)
            .map_err(io::Error::from)
    }
}

type Pipe = Arc<Mutex<VecDeque<u8>>>;

fn lock(pipe: &Pipe) -> io::Result<std::sync::MutexGuard<'_, VecDeque<u8>>> {
    pipe.lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "transport pipe poisoned"))
}

/// In-process duplex link. A read with nothing buffered reports a timeout,
/// which is what a serial port does once its deadline passes.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inbound: Pipe,
    outbound: Pipe,
    run_history: Vec<bool>,
}

impl MemoryTransport {
    /// Two ends of one link: bytes written to either arrive at the other.
    pub fn pair() -> (Self, Self) {
        let a = Pipe::default();
        let b = Pipe::default();
        (
            Self {
                inbound: a.clone(),
                outbound: b.clone(),
                run_history: Vec::new(),
            },
            Self {
                inbound: b,
                outbound: a,
                run_history: Vec::new(),
            },
        )
    }

    /// Every level this end drove onto the run line, in order.
    pub fn run_history(&self) -> &[bool] {
        &self.run_history
    }

    /// Bytes written by this end that the peer has not read yet.
    pub fn pending_outbound(&self) -> usize {
        lock(&self.outbound).map(|q| q.len()).unwrap_or(0)
    }
}

impl Read for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut queue = lock(&self.inbound)?;
        if queue.is_empty() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        let n = buf.len().min(queue.len());
        for (slot, byte) in buf.iter_mut().zip(queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.outbound)?.extend(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn set_run(&mut self, asserted: bool) -> io::Result<()> {
        self.run_history.push(asserted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_duplex() {
        let (mut host, mut target) = MemoryTransport::pair();
        host.write_all(b"ping\n").unwrap();
        target.write_all(b"pong\r\n").unwrap();
        assert_eq!(read_line(&mut target).unwrap(), "ping");
        assert_eq!(read_line(&mut host).unwrap(), "pong");
    }

    #[test]
    fn test_empty_read_times_out() {
        let (mut host, _target) = MemoryTransport::pair();
        let err = read_line(&mut host).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_overlong_line_rejected() {
        let (mut host, mut target) = MemoryTransport::pair();
        host.write_all(&[b'x'; MAX_LINE + 1]).unwrap();
        let err = read_line(&mut target).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
