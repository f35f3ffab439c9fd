// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::AccessWidth;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    pub entry_point: u32,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new(entry_point: u32) -> Self {
        Self {
            entry_point,
            segments: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, start_addr: u32, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    pub fn total_len(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }

    /// One contiguous blob starting at the lowest segment address, gaps
    /// zero-filled. `None` for an image without segments.
    pub fn flatten(&self) -> Option<(u32, Vec<u8>)> {
        let origin = self.segments.iter().map(|s| s.start_addr).min()?;
        let mut blob = Vec::new();
        for segment in &self.segments {
            let start = (segment.start_addr - origin) as usize;
            let end = start + segment.data.len();
            if blob.len() < end {
                blob.resize(end, 0);
            }
            blob[start..end].copy_from_slice(&segment.data);
        }
        Some((origin, blob))
    }
}

/// A simple flat memory storage, addressed by offset from the window base.
#[derive(Debug, Clone)]
pub struct LinearMemory {
    pub data: Vec<u8>,
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn span(&self, offset: u32, len: usize) -> Option<std::ops::Range<usize>> {
        let start = offset as usize;
        let end = start.checked_add(len)?;
        (end <= self.data.len()).then_some(start..end)
    }

    /// Little-endian read of `width` bytes at `offset`.
    pub fn read(&self, offset: u32, width: AccessWidth) -> Option<u32> {
        let range = self.span(offset, width.bytes() as usize)?;
        Some(
            self.data[range]
                .iter()
                .rev()
                .fold(0u32, |acc, &b| (acc << 8) | b as u32),
        )
    }

    pub fn write(&mut self, offset: u32, width: AccessWidth, value: u32) -> bool {
        let Some(range) = self.span(offset, width.bytes() as usize) else {
            return false;
        };
        let bytes = value.to_le_bytes();
        let len = range.len();
        self.data[range].copy_from_slice(&bytes[..len]);
        true
    }

    /// Copies `bytes` in at `offset`; nothing is written unless all of it fits.
    pub fn load(&mut self, offset: u32, bytes: &[u8]) -> bool {
        match self.span(offset, bytes.len()) {
            Some(range) => {
                self.data[range].copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }
}
