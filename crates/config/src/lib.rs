// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Highest exclusive address reachable by the 32-bit bus.
pub const ADDRESS_SPACE_END: u64 = 1 << 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Axi4,
    #[serde(alias = "axi4-lite")]
    Axi4Lite,
}

/// Kind of target a slave window is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Ram,
    Uart,
    Gpio,
    Debug,
}

impl DeviceKind {
    /// Infers the device from a slave name such as `ram`, `uart0` or `debug`.
    pub fn infer(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        [
            ("ram", Self::Ram),
            ("uart", Self::Uart),
            ("gpio", Self::Gpio),
            ("debug", Self::Debug),
        ]
        .into_iter()
        .find(|(prefix, _)| lower.starts_with(prefix))
        .map(|(_, kind)| kind)
    }
}

/// A region size given either as a byte count or a human string ("64 KiB").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Bytes(u64),
    Human(String),
}

impl SizeSpec {
    pub fn bytes(&self) -> Result<u64> {
        match self {
            Self::Bytes(n) => Ok(*n),
            Self::Human(s) => parse_size(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Soc {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Master {
    pub name: String,
    #[serde(default)]
    pub protocol: Option<Protocol>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slave {
    pub name: String,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    pub base: u64,
    pub size: SizeSpec,
    #[serde(default)]
    pub device: Option<DeviceKind>,
}

/// Declarative description of the SoC interconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySpec {
    pub soc: Soc,
    pub defaults: Defaults,
    #[serde(default)]
    pub masters: Vec<Master>,
    pub slaves: Vec<Slave>,
}

/// A slave window with its size resolved and defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSlave {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub protocol: Protocol,
    pub device: Option<DeviceKind>,
}

impl ResolvedSlave {
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    pub fn overlaps(&self, other: &ResolvedSlave) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("address ranges for {first} and {second} overlap")]
    Overlap { first: String, second: String },
    #[error("slave {name} has a zero-sized address range")]
    EmptyRegion { name: String },
    #[error("slave {name} extends past the end of the 32-bit address space")]
    AddressSpaceOverflow { name: String },
    #[error("slave {name} has an invalid size: {reason}")]
    InvalidSize { name: String, reason: String },
}

impl MemorySpec {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read memory map {:?}", path))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse memory map YAML")
    }

    pub fn master_protocol(&self, master: &Master) -> Protocol {
        master.protocol.unwrap_or(self.defaults.protocol)
    }

    /// Resolves sizes and protocols, and rejects malformed or overlapping windows.
    ///
    /// This is the only way to obtain slave windows, so a map that reaches the
    /// bus builder has already been checked.
    pub fn resolved_slaves(&self) -> Result<Vec<ResolvedSlave>, ConfigError> {
        let mut resolved = Vec::with_capacity(self.slaves.len());
        for slave in &self.slaves {
            let size = slave
                .size
                .bytes()
                .map_err(|e| ConfigError::InvalidSize {
                    name: slave.name.clone(),
                    reason: format!("{:#}", e),
                })?;
            if size == 0 {
                return Err(ConfigError::EmptyRegion {
                    name: slave.name.clone(),
                });
            }
            if slave.base.checked_add(size).map_or(true, |end| end > ADDRESS_SPACE_END) {
                return Err(ConfigError::AddressSpaceOverflow {
                    name: slave.name.clone(),
                });
            }
            resolved.push(ResolvedSlave {
                name: slave.name.clone(),
                base: slave.base,
                size,
                protocol: slave.protocol.unwrap_or(self.defaults.protocol),
                device: slave.device.or_else(|| DeviceKind::infer(&slave.name)),
            });
        }
        validate_overlap(&resolved)?;
        tracing::debug!(
            "Memory map '{}' validated: {} slaves",
            self.soc.name,
            resolved.len()
        );
        Ok(resolved)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolved_slaves().map(|_| ())
    }

    /// Renders the slave windows in ascending address order, marking gaps.
    pub fn ascii_memory_map(&self) -> Result<String, ConfigError> {
        let mut slaves = self.resolved_slaves()?;
        slaves.sort_by_key(|s| s.base);

        let rule = format!("+{}+", "-".repeat(40));
        let mut out = String::new();
        let _ = writeln!(out, "Memory Map for {}", self.soc.name);
        let _ = writeln!(out, "{}", "=".repeat(60));

        let mut prev_end = 0;
        for slave in &slaves {
            if slave.base > prev_end {
                let _ = writeln!(out, "0x{:08X} {}", prev_end, rule);
                let _ = writeln!(out, "           |{:^40}|", "");
            }
            let _ = writeln!(out, "0x{:08X} {}", slave.base, rule);
            let label = format!("{} ({})", slave.name, format_size(slave.size));
            let _ = writeln!(out, "           |{:^40}|", label);
            prev_end = slave.end();
        }
        let _ = write!(out, "0x{:08X} {}", prev_end, rule);
        Ok(out)
    }
}

pub fn validate_overlap(slaves: &[ResolvedSlave]) -> Result<(), ConfigError> {
    for (i, slave) in slaves.iter().enumerate() {
        for other in &slaves[i + 1..] {
            if slave.overlaps(other) {
                return Err(ConfigError::Overlap {
                    first: slave.name.clone(),
                    second: other.name.clone(),
                });
            }
        }
    }
    Ok(())
}

pub fn format_size(size: u64) -> String {
    if size >= 1024 * 1024 {
        format!("{}MB", size / (1024 * 1024))
    } else if size >= 1024 {
        format!("{}KB", size / 1024)
    } else {
        format!("{}B", size)
    }
}

/// Parses "4096", "64 KiB" or "64KiB" into a byte count.
pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};

    let trimmed = size_str.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (value, unit) = trimmed.split_at(split);
    let unit = unit.trim();
    if unit.is_empty() {
        return value
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid size format '{}': {}", size_str, e));
    }

    let s: Size = format!("{} {}", value, unit)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format '{}': {}", size_str, e))?;
    let bytes: SpecificSize<Byte> = s.into();
    let value = bytes.value();
    if value.fract() != 0.0 || !(0.0..=u64::MAX as f64).contains(&value) {
        anyhow::bail!("Size '{}' is not a whole number of bytes", size_str);
    }
    Ok(value as u64)
}
