//! Result shapes returned by the paging operations.

use serde::Serialize;

/// One page of results plus the total row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paging<T> {
    pub total: u64,
    pub page_size: usize,
    pub offset: usize,
    pub results: Vec<T>,
}

impl<T> Paging<T> {
    /// Returns the 1-based page the offset falls on.
    #[must_use]
    pub const fn current_page(&self) -> usize {
        if self.page_size == 0 {
            1
        } else {
            self.offset / self.page_size + 1
        }
    }

    /// Returns the number of pages needed for `total` rows.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size as u64)
    }
}

/// A window of results plus whether more rows follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forwarding<T> {
    pub results: Vec<T>,
    pub has_next: bool,
}
