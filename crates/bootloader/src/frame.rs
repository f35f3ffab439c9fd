// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::checksum::crc32;

pub const UPLOAD_COMMAND: &[u8] = b"upload\n";
pub const READY_BANNER: &str = "bootloader running";
pub const UPLOAD_OK: &str = "upload ok";
pub const UPLOAD_FAILED: &str = "upload failed";
pub const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadHeader {
    pub length: u32,
    pub checksum: u32,
}

impl UploadHeader {
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            length: payload.len() as u32,
            checksum: crc32(payload),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0; HEADER_LEN];
        out[..4].copy_from_slice(&self.length.to_le_bytes());
        out[4..].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        let [l0, l1, l2, l3, c0, c1, c2, c3] = bytes;
        Self {
            length: u32::from_le_bytes([l0, l1, l2, l3]),
            checksum: u32::from_le_bytes([c0, c1, c2, c3]),
        }
    }

    pub fn matches(&self, payload: &[u8]) -> bool {
        payload.len() as u32 == self.length && crc32(payload) == self.checksum
    }
}

/// Everything the host sends ahead of the payload: command token, then header.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(UPLOAD_COMMAND.len() + HEADER_LEN);
    out.extend_from_slice(UPLOAD_COMMAND);
    out.extend_from_slice(&UploadHeader::for_payload(payload).to_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let payload = [1u8, 2, 3, 4];
        let c = crc32(&payload);
        let mut expected = b"upload\n".to_vec();
        expected.extend_from_slice(&4u32.to_le_bytes());
        expected.extend_from_slice(&c.to_le_bytes());
        assert_eq!(frame(&payload), expected);
        assert_eq!(frame(&payload).len(), 15);
    }

    #[test]
    fn test_header_bytes_are_little_endian() {
        let header = UploadHeader {
            length: 0x0102_0304,
            checksum: 0xAABB_CCDD,
        };
        assert_eq!(
            header.to_bytes(),
            [0x04, 0x03, 0x02, 0x01, 0xDD, 0xCC, 0xBB, 0xAA]
        );
        assert_eq!(UploadHeader::from_bytes(header.to_bytes()), header);
    }

    #[test]
    fn test_empty_payload_header() {
        let header = UploadHeader::for_payload(&[]);
        assert_eq!(header.to_bytes(), [0; 8]);
        assert!(header.matches(&[]));
    }

    #[test]
    fn test_matches_rejects_corruption() {
        let header = UploadHeader::for_payload(b"firmware");
        assert!(header.matches(b"firmware"));
        assert!(!header.matches(b"firmwarE"));
        assert!(!header.matches(b"firmwar"));
    }
}
