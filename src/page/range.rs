//! Page ranges
//!
//! A bounded group of base pages sharing one growable list of tail pages.

use super::{BasePage, TailPage};

#[derive(Debug, Clone)]
pub struct PageRange {
    pub(super) base_pages: Vec<BasePage>,
    pub(super) tail_pages: Vec<TailPage>,
}

impl PageRange {
    /// A fresh range starts with one empty base page and one empty tail page
    pub fn new(num_columns: usize, page_capacity: usize) -> Self {
        Self {
            base_pages: vec![BasePage::new(num_columns, page_capacity)],
            tail_pages: vec![TailPage::new(num_columns, page_capacity)],
        }
    }

    pub fn base_pages(&self) -> &[BasePage] {
        &self.base_pages
    }

    pub fn tail_pages(&self) -> &[TailPage] {
        &self.tail_pages
    }

    pub fn base_page_count(&self) -> usize {
        self.base_pages.len()
    }

    pub fn tail_page_count(&self) -> usize {
        self.tail_pages.len()
    }

    pub fn tail_record_count(&self) -> usize {
        self.tail_pages.iter().map(TailPage::len).sum()
    }
}
