//! Paging request validation and paged result envelope.
//!
//! # Invariants
//! - `page_number >= 1` and `1 <= page_size <= MAX_PAGE_SIZE`.
//! - `items.len() <= page_size`.

use crate::error::{PersistError, PersistResult};
use serde::Serialize;

/// Upper bound on rows per page.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Validated paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page_number: u32,
    page_size: u32,
}

impl PageRequest {
    /// Validates raw caller input against the default size ceiling.
    pub fn new(page_number: i64, page_size: i64) -> PersistResult<Self> {
        Self::with_limit(page_number, page_size, MAX_PAGE_SIZE)
    }

    /// Validates raw caller input against `max_page_size` (capped at `MAX_PAGE_SIZE`).
    pub fn with_limit(page_number: i64, page_size: i64, max_page_size: u32) -> PersistResult<Self> {
        let max_page_size = max_page_size.clamp(1, MAX_PAGE_SIZE);
        if page_number < 1 || page_number > i64::from(u32::MAX) {
            return Err(PersistError::validation(format!(
                "page number must be >= 1, got {page_number}"
            )));
        }
        if page_size < 1 || page_size > i64::from(max_page_size) {
            return Err(PersistError::validation(format!(
                "page size must be between 1 and {max_page_size}, got {page_size}"
            )));
        }
        Ok(Self {
            page_number: page_number as u32,
            page_size: page_size as u32,
        })
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Rows skipped before this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page_number - 1) * u64::from(self.page_size)
    }

    pub fn take(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// One page of results plus totals across all pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult<T> {
    items: Vec<T>,
    total_count: u64,
    page_number: u32,
    page_size: u32,
}

impl<T> PagedResult<T> {
    pub fn new(mut items: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        items.truncate(request.page_size as usize);
        Self {
            items,
            total_count,
            page_number: request.page_number,
            page_size: request.page_size,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_pages(&self) -> u64 {
        self.total_count.div_ceil(u64::from(self.page_size))
    }

    pub fn has_previous_page(&self) -> bool {
        self.page_number > 1
    }

    pub fn has_next_page(&self) -> bool {
        u64::from(self.page_number) < self.total_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::{PageRequest, PagedResult, MAX_PAGE_SIZE};
    use crate::error::PersistError;

    #[test]
    fn twenty_five_rows_in_pages_of_ten() {
        let first = PagedResult::new(vec![0; 10], 25, PageRequest::new(1, 10).unwrap());
        assert_eq!(first.total_pages(), 3);
        assert!(!first.has_previous_page());
        assert!(first.has_next_page());

        let last = PagedResult::new(vec![0; 5], 25, PageRequest::new(3, 10).unwrap());
        assert!(last.has_previous_page());
        assert!(!last.has_next_page());
    }

    #[test]
    fn empty_result_has_no_pages() {
        let page = PagedResult::<u8>::new(Vec::new(), 0, PageRequest::new(1, 10).unwrap());
        assert_eq!(page.total_pages(), 0);
        assert!(!page.has_next_page());
    }

    #[test]
    fn invalid_page_parameters_are_rejected() {
        for (number, size) in [(0, 10), (-1, 10), (1, 0), (1, i64::from(MAX_PAGE_SIZE) + 1)] {
            assert!(matches!(
                PageRequest::new(number, size),
                Err(PersistError::Validation(_))
            ));
        }
        assert!(PageRequest::new(1, i64::from(MAX_PAGE_SIZE)).is_ok());
    }

    #[test]
    fn configured_limit_lowers_the_ceiling() {
        assert!(PageRequest::with_limit(1, 60, 50).is_err());
        assert!(PageRequest::with_limit(1, 50, 50).is_ok());
    }

    #[test]
    fn skip_is_derived_from_page_number() {
        let request = PageRequest::new(3, 20).unwrap();
        assert_eq!(request.skip(), 40);
        assert_eq!(request.take(), 20);
    }
}
