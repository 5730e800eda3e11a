pub mod flash;
#[cfg(feature = "log")]
pub mod logger;
pub mod platform;

use std::collections::BTreeMap;

use crate::{Address, layout::Region};

/// Erase count per page.
#[derive(Debug)]
pub struct WearTracker(BTreeMap<Address, usize>);

impl WearTracker {
    pub const fn new() -> Self {
        WearTracker(BTreeMap::new())
    }

    pub fn increase(&mut self, page: Address) {
        if let Some(wear) = self.0.get_mut(&page) {
            *wear += 1;
        } else {
            self.0.insert(page, 1);
        }
    }

    pub fn get(&self, page: Address) -> usize {
        self.0.get(&page).copied().unwrap_or(0)
    }

    /// Number of distinct pages that have been erased at least once.
    pub fn erased_pages(&self) -> usize {
        self.0.len()
    }

    /// Check wear on all pages of region for worst wear.
    pub fn check_region(&self, region: Region, wear_level: usize) -> bool {
        self.0
            .iter()
            .filter(|(page, _)| region.contains(**page))
            .all(|(_, v)| *v <= wear_level)
    }
}
