// orkarv - RV32I SoC Core and Firmware Bootloader
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Address decode for the crossbar.
//!
//! The region table is sorted and checked once when the router is built, so
//! a lookup is a binary search over disjoint intervals and never touches the
//! layout again.

use crate::{SimResult, SimulationError};
use orkarv_config::ADDRESS_SPACE_END;

/// Index of a target in the owning bus's target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub base: u32,
    pub size: u64,
    pub target: TargetId,
}

impl Region {
    pub fn new(name: impl Into<String>, base: u32, size: u64, target: TargetId) -> Self {
        Self {
            name: name.into(),
            base,
            size,
            target,
        }
    }

    /// Exclusive end; may be exactly 2^32.
    pub fn end(&self) -> u64 {
        self.base as u64 + self.size
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && (addr as u64) < self.end()
    }
}

/// Where an address landed: the target plus the region-relative offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub target: TargetId,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("regions {first} and {second} overlap")]
    Overlap { first: String, second: String },
    #[error("region {name} is empty")]
    EmptyRegion { name: String },
    #[error("region {name} extends past the 32-bit address space")]
    OutOfRange { name: String },
}

#[derive(Debug, Clone, Default)]
pub struct BusRouter {
    regions: Vec<Region>,
}

impl BusRouter {
    pub fn build(mut regions: Vec<Region>) -> Result<Self, MapError> {
        for region in &regions {
            if region.size == 0 {
                return Err(MapError::EmptyRegion {
                    name: region.name.clone(),
                });
            }
            if region.end() > ADDRESS_SPACE_END {
                return Err(MapError::OutOfRange {
                    name: region.name.clone(),
                });
            }
        }

        regions.sort_by_key(|r| r.base);
        for pair in regions.windows(2) {
            if (pair[1].base as u64) < pair[0].end() {
                return Err(MapError::Overlap {
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                });
            }
        }

        tracing::debug!("Bus router built with {} regions", regions.len());
        Ok(Self { regions })
    }

    /// Wraps a table already sorted and disjoint, such as a built-in layout.
    pub(crate) fn presorted(regions: Vec<Region>) -> Self {
        debug_assert!(
            Self::build(regions.clone()).is_ok_and(|r| r.regions == regions),
            "layout is not sorted and disjoint"
        );
        Self { regions }
    }

    pub fn route(&self, addr: u32) -> SimResult<Route> {
        let idx = self.regions.partition_point(|r| r.base <= addr);
        let region = idx
            .checked_sub(1)
            .map(|i| &self.regions[i])
            .filter(|r| r.contains(addr))
            .ok_or(SimulationError::Unmapped(addr))?;
        Ok(Route {
            target: region.target,
            offset: addr - region.base,
        })
    }

    /// Regions in ascending base order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn layout() -> BusRouter {
        BusRouter::build(vec![
            Region::new("uart", 0x0201_0000, 0x100, TargetId(2)),
            Region::new("ram", 0x0100_0000, 0x1_0000, TargetId(0)),
            Region::new("gpio", 0x0200_0000, 0x100, TargetId(1)),
        ])
        .unwrap()
    }

    #[test]
    fn test_route_hits_and_offsets() {
        let router = layout();
        assert_eq!(
            router.route(0x0100_0000).unwrap(),
            Route {
                target: TargetId(0),
                offset: 0
            }
        );
        assert_eq!(router.route(0x0100_FFFF).unwrap().offset, 0xFFFF);
        assert_eq!(router.route(0x0201_000C).unwrap().target, TargetId(2));
    }

    #[test]
    fn test_route_misses_are_unmapped() {
        let router = layout();
        for addr in [0x0, 0x00FF_FFFF, 0x0101_0000, 0x0200_0100, 0xFFFF_FFFF] {
            assert_eq!(router.route(addr), Err(SimulationError::Unmapped(addr)));
        }
    }

    #[test]
    fn test_regions_sorted() {
        let router = layout();
        let bases: Vec<u32> = router.regions().iter().map(|r| r.base).collect();
        assert_eq!(bases, vec![0x0100_0000, 0x0200_0000, 0x0201_0000]);
    }

    #[test]
    fn test_overlap_rejected() {
        let err = BusRouter::build(vec![
            Region::new("ram", 0x1000, 0x1000, TargetId(0)),
            Region::new("rom", 0x1FFC, 0x8, TargetId(1)),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            MapError::Overlap {
                first: "ram".into(),
                second: "rom".into()
            }
        );
    }

    #[test]
    fn test_empty_and_out_of_range_rejected() {
        assert!(matches!(
            BusRouter::build(vec![Region::new("z", 0x10, 0, TargetId(0))]),
            Err(MapError::EmptyRegion { .. })
        ));
        assert!(matches!(
            BusRouter::build(vec![Region::new("hi", 0xFFFF_FF00, 0x200, TargetId(0))]),
            Err(MapError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_region_reaching_top_of_address_space() {
        let router =
            BusRouter::build(vec![Region::new("top", 0xFFFF_FF00, 0x100, TargetId(0))]).unwrap();
        assert_eq!(router.route(0xFFFF_FFFF).unwrap().offset, 0xFF);
    }

    proptest! {
        #[test]
        fn prop_route_matches_linear_scan(addr in any::<u32>()) {
            let router = layout();
            let expected = router.regions().iter().find(|r| r.contains(addr));
            match (router.route(addr), expected) {
                (Ok(route), Some(region)) => {
                    prop_assert_eq!(route.target, region.target);
                    prop_assert_eq!(route.offset, addr - region.base);
                }
                (Err(SimulationError::Unmapped(a)), None) => prop_assert_eq!(a, addr),
                (got, want) => prop_assert!(false, "route {:?} vs {:?}", got, want),
            }
        }
    }
}
