use thiserror::Error;

use crate::models::Paginated;

/// Page sizes offered by the metrics view.
pub const PAGE_SIZES: [u32; 3] = [10, 20, 50];
pub const DEFAULT_PER_PAGE: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("page {requested} is outside 1..={pages}")]
pub struct PageOutOfRange {
    pub requested: u32,
    pub pages: u32,
}

/// Page cursor for the metrics table, bounded by the page count the backend
/// last reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsPager {
    page: u32,
    per_page: u32,
    pages: u32,
}

impl Default for MetricsPager {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE)
    }
}

impl MetricsPager {
    pub fn new(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
            pages: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Records the page count from a fetched page, pulling the cursor back
    /// when the data shrank below it.
    pub fn observe<T>(&mut self, data: &Paginated<T>) {
        self.pages = data.total_pages();
        self.page = self.page.min(self.pages.max(1));
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    /// Moves forward one page; returns false when already on the last page.
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.page += 1;
        true
    }

    pub fn previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.page -= 1;
        true
    }

    pub fn go_to(&mut self, page: u32) -> Result<(), PageOutOfRange> {
        if page == 0 || page > self.pages.max(1) {
            return Err(PageOutOfRange {
                requested: page,
                pages: self.pages,
            });
        }
        self.page = page;
        Ok(())
    }

    /// Changing the page size always returns to the first page.
    pub fn set_per_page(&mut self, per_page: u32) {
        self.per_page = per_page.max(1);
        self.page = 1;
    }
}
