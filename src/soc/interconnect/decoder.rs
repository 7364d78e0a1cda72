//! Address Decoder.
//!
//! Maps 32-bit bus addresses onto target slots. Decoding works on the 12-bit
//! segment address (`address >> 20`): the range table is keyed by each BAR's
//! masked base, and a lookup takes the greatest key not above the segment and
//! checks it against that entry's mask.
//!
//! A single-entry cache holds the last matched region. Keys are masked bases
//! and masks are contiguous prefixes, so given a non-overlapping map a cache
//! hit names the same region the full table search would. With the overlap
//! check disabled a nested region can make the two disagree.

use std::collections::BTreeMap;

/// One decoded region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    /// Target slot in binding order.
    pub slot: usize,
    /// 12-bit segment mask.
    pub mask: u32,
    /// BAR number within the owning device.
    pub bar: usize,
}

/// Ordered range table with a one-entry lookup cache.
#[derive(Default)]
pub struct AddressDecoder {
    table: BTreeMap<u32, Region>,
    cache: Option<(u32, Region)>,
    lookups: u64,
    hits: u64,
    successful: u64,
}

impl AddressDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a region keyed by its masked 12-bit base.
    ///
    /// Returns the region previously stored under the same key, if any. Such
    /// a collision is an overlap and is reported by the fabric's map check.
    pub fn insert(&mut self, key: u32, region: Region) -> Option<Region> {
        self.cache = None;
        self.table.insert(key & 0xFFF, region)
    }

    /// Removes every region and invalidates the cache.
    pub fn clear(&mut self) {
        self.table.clear();
        self.cache = None;
    }

    /// Resolves `address` to a target slot.
    #[inline]
    pub fn decode(&mut self, address: u32) -> Option<usize> {
        self.lookups += 1;
        let seg = address >> 20;

        if let Some((key, region)) = self.cache {
            if (seg ^ key) & region.mask == 0 {
                self.hits += 1;
                self.successful += 1;
                return Some(region.slot);
            }
        }

        let (&key, &region) = self.table.range(..=seg).next_back()?;
        if (seg ^ key) & region.mask == 0 {
            self.cache = Some((key, region));
            self.successful += 1;
            return Some(region.slot);
        }
        None
    }

    /// Full table search without touching the cache or counters.
    pub fn lookup(&self, address: u32) -> Option<usize> {
        let seg = address >> 20;
        let (&key, region) = self.table.range(..=seg).next_back()?;
        ((seg ^ key) & region.mask == 0).then_some(region.slot)
    }

    /// Regions in ascending key order.
    pub fn regions(&self) -> impl Iterator<Item = (u32, &Region)> {
        self.table.iter().map(|(k, r)| (*k, r))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Total number of `decode` calls.
    pub fn lookups(&self) -> u64 {
        self.lookups
    }

    /// Lookups answered from the cache.
    pub fn cache_hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that resolved to a target.
    pub fn successful(&self) -> u64 {
        self.successful
    }
}
