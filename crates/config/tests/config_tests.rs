// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use orkarv_config::{ConfigError, DeviceKind, MemorySpec, Protocol};
use std::path::PathBuf;

const SOC_YAML: &str = r#"
soc:
  name: "orkasoc"
defaults:
  protocol: axi4lite
masters:
  - name: cpu
  - name: debug
    protocol: axi4
slaves:
  - name: ram
    protocol: axi4
    base: 0x01000000
    size: 0x10000
  - name: gpio
    base: 0x02000000
    size: "4 KiB"
  - name: uart
    base: 0x02010000
    size: 16
  - name: status
    device: debug
    base: 0x03000000
    size: 8
"#;

#[test]
fn test_memory_spec_parses() {
    let spec = MemorySpec::from_yaml(SOC_YAML).unwrap();
    assert_eq!(spec.soc.name, "orkasoc");
    assert_eq!(spec.masters.len(), 2);
    assert_eq!(spec.master_protocol(&spec.masters[0]), Protocol::Axi4Lite);
    assert_eq!(spec.master_protocol(&spec.masters[1]), Protocol::Axi4);

    let slaves = spec.resolved_slaves().unwrap();
    assert_eq!(slaves.len(), 4);
    assert_eq!(slaves[0].protocol, Protocol::Axi4);
    assert_eq!(slaves[1].protocol, Protocol::Axi4Lite);
    assert_eq!(slaves[1].size, 4096);
    assert_eq!(slaves[2].device, Some(DeviceKind::Uart));
    assert_eq!(slaves[3].device, Some(DeviceKind::Debug));
}

#[test]
fn test_overlapping_slaves_rejected() {
    let yaml = r#"
soc: { name: "bad" }
defaults: { protocol: axi4 }
masters: []
slaves:
  - { name: ram, base: 0x1000, size: 0x1000 }
  - { name: uart, base: 0x1800, size: 0x10 }
"#;
    let spec = MemorySpec::from_yaml(yaml).unwrap();
    assert_eq!(
        spec.validate(),
        Err(ConfigError::Overlap {
            first: "ram".into(),
            second: "uart".into()
        })
    );
}

#[test]
fn test_zero_sized_slave_rejected() {
    let yaml = r#"
soc: { name: "bad" }
defaults: { protocol: axi4 }
slaves:
  - { name: ram, base: 0x1000, size: 0 }
"#;
    let spec = MemorySpec::from_yaml(yaml).unwrap();
    assert!(matches!(
        spec.validate(),
        Err(ConfigError::EmptyRegion { .. })
    ));
}

#[test]
fn test_slave_past_address_space_rejected() {
    let yaml = r#"
soc: { name: "bad" }
defaults: { protocol: axi4 }
slaves:
  - { name: ram, base: 0xFFFFF000, size: 0x2000 }
"#;
    let spec = MemorySpec::from_yaml(yaml).unwrap();
    assert!(matches!(
        spec.validate(),
        Err(ConfigError::AddressSpaceOverflow { .. })
    ));
}

#[test]
fn test_unknown_protocol_fails_to_parse() {
    let yaml = r#"
soc: { name: "bad" }
defaults: { protocol: wishbone }
slaves: []
"#;
    assert!(MemorySpec::from_yaml(yaml).is_err());
}

#[test]
fn test_ascii_memory_map_shows_gaps() {
    let spec = MemorySpec::from_yaml(SOC_YAML).unwrap();
    let map = spec.ascii_memory_map().unwrap();
    let lines: Vec<&str> = map.lines().collect();

    assert_eq!(lines[0], "Memory Map for orkasoc");
    // Leading gap from 0 up to RAM.
    assert!(lines[2].starts_with("0x00000000 +"));
    assert!(map.contains("0x01000000 +"));
    assert!(map.contains("ram (64KB)"));
    assert!(map.contains("gpio (4KB)"));
    assert!(map.contains("status (8B)"));
    assert!(lines.last().unwrap().starts_with("0x03000008 +"));
}

#[test]
fn test_bundled_soc_config_is_valid() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs/orkasoc.yaml");
    let spec = MemorySpec::from_file(&path).unwrap();
    let slaves = spec.resolved_slaves().unwrap();
    assert!(slaves.iter().any(|s| s.device == Some(DeviceKind::Ram)));
    assert!(slaves.iter().any(|s| s.device == Some(DeviceKind::Debug)));
}
